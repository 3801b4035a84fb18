pub mod gradient_check;

pub use gradient_check::{check_input_gradient, check_parameter_gradients};

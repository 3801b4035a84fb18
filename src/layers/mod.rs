pub mod traits;
pub mod moments;
pub mod initialization;
pub mod batch_norm;

pub use traits::{Gradients, Layer as LayerTrait};
pub use initialization::WeightInit;
pub use batch_norm::{
    BatchNormConfig, BatchNormalization, NormMode, NormState, RunningStats, DEFAULT_EPSILON,
    DEFAULT_MOMENTUM, LAYER_NAME,
};

use ndarray::{Array1, ArrayD, ArrayViewD};
use crate::error::Result;

/// Gradients produced by a backward pass
#[derive(Debug, Clone)]
pub struct Gradients {
    /// Gradient of the loss with respect to the layer input
    pub input: ArrayD<f32>,

    /// Gradients for each trainable parameter, in [`Layer::parameters`] order
    pub parameters: Vec<Array1<f32>>,
}

/// Trait defining the interface a layer exposes to its model container
pub trait Layer: Send + Sync {
    /// Perform forward propagation for a batch of inputs
    fn forward(&mut self, input: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>>;

    /// Perform backward propagation for the batch that produced `output_error`.
    ///
    /// `input` and `training` must be the same values given to the matching
    /// forward call.
    fn backward(
        &self,
        input: ArrayViewD<f32>,
        output_error: ArrayViewD<f32>,
        training: bool,
    ) -> Result<Gradients>;

    /// Get references to the trainable parameters
    fn parameters(&self) -> Vec<&Array1<f32>>;

    /// Get mutable references to the trainable parameters
    fn parameters_mut(&mut self) -> Vec<&mut Array1<f32>>;

    /// Get the configured input shape (without the batch axis)
    fn input_shape(&self) -> &[usize];

    /// Name of the layer type
    fn name(&self) -> &'static str;

    /// Clone the layer into a boxed trait object
    fn clone_box(&self) -> Box<dyn Layer>;
}

impl Clone for Box<dyn Layer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

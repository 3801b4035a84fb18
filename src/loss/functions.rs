use ndarray::{ArrayD, ArrayViewD};
use crate::error::{NormError, Result};

/// Trait defining the interface for loss functions
pub trait Loss: Send + Sync {
    /// Compute the loss for a batch of predictions and targets
    fn compute(&self, predictions: ArrayViewD<f32>, targets: ArrayViewD<f32>) -> Result<f32>;

    /// Compute the gradient of the loss with respect to the predictions
    fn gradient(&self, predictions: ArrayViewD<f32>, targets: ArrayViewD<f32>) -> Result<ArrayD<f32>>;
}

fn check_shapes(predictions: &ArrayViewD<f32>, targets: &ArrayViewD<f32>) -> Result<()> {
    if predictions.shape() != targets.shape() {
        return Err(NormError::shape_mismatch(
            format!("targets of shape {:?}", predictions.shape()),
            format!("{:?}", targets.shape()),
        ));
    }
    if predictions.is_empty() {
        return Err(NormError::shape_mismatch(
            "non-empty predictions".to_string(),
            format!("{:?}", predictions.shape()),
        ));
    }
    Ok(())
}

/// Mean Squared Error loss, averaged over every element
pub struct MSE;

impl Loss for MSE {
    fn compute(&self, predictions: ArrayViewD<f32>, targets: ArrayViewD<f32>) -> Result<f32> {
        check_shapes(&predictions, &targets)?;
        let diff = &predictions - &targets;
        Ok((&diff * &diff).sum() / predictions.len() as f32)
    }

    fn gradient(&self, predictions: ArrayViewD<f32>, targets: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        check_shapes(&predictions, &targets)?;
        Ok((&predictions - &targets) * (2.0 / predictions.len() as f32))
    }
}

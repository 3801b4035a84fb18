use ndarray::{ArrayD, ArrayViewD};
use crate::error::{NormError, Result};
use crate::layers::LayerTrait;

/// Distance between an analytical and a numerical derivative, scaled so that
/// small gradients are compared absolutely and large ones relatively
fn derivative_error(analytical: f32, numerical: f32) -> f32 {
    (analytical - numerical).abs() / 1.0f32.max(analytical.abs() + numerical.abs())
}

/// `sum(layer(input) * output_weights)` on a throwaway copy of the layer
fn projected_output(
    layer: &dyn LayerTrait,
    input: ArrayViewD<f32>,
    output_weights: &ArrayViewD<f32>,
    training: bool,
) -> Result<f32> {
    let mut probe = layer.clone_box();
    let output = probe.forward(input, training)?;
    if output.shape() != output_weights.shape() {
        return Err(NormError::shape_mismatch(
            format!("output weights of shape {:?}", output.shape()),
            format!("{:?}", output_weights.shape()),
        ));
    }
    Ok((&output * output_weights).sum())
}

/// Compare a layer's parameter gradients against central finite differences.
///
/// The scalar being differentiated is `sum(output * output_weights)`, so
/// `output_weights` doubles as the upstream gradient. Returns the largest
/// error per parameter, in [`LayerTrait::parameters`] order. The layer itself
/// is never mutated.
pub fn check_parameter_gradients(
    layer: &dyn LayerTrait,
    input: ArrayViewD<f32>,
    output_weights: ArrayViewD<f32>,
    training: bool,
    step: f32,
) -> Result<Vec<f32>> {
    let analytical = layer.backward(input.view(), output_weights.view(), training)?;
    let mut errors = Vec::with_capacity(analytical.parameters.len());

    for (index, grad) in analytical.parameters.iter().enumerate() {
        let mut max_error = 0.0f32;
        for j in 0..grad.len() {
            let mut plus = layer.clone_box();
            plus.parameters_mut()[index][j] += step;
            let loss_plus = projected_output(plus.as_ref(), input.view(), &output_weights, training)?;

            let mut minus = layer.clone_box();
            minus.parameters_mut()[index][j] -= step;
            let loss_minus = projected_output(minus.as_ref(), input.view(), &output_weights, training)?;

            let numerical = (loss_plus - loss_minus) / (2.0 * step);
            max_error = max_error.max(derivative_error(grad[j], numerical));
        }
        errors.push(max_error);
    }

    Ok(errors)
}

/// Compare a layer's input gradient against central finite differences.
///
/// Returns the largest error over all input elements.
pub fn check_input_gradient(
    layer: &dyn LayerTrait,
    input: ArrayViewD<f32>,
    output_weights: ArrayViewD<f32>,
    training: bool,
    step: f32,
) -> Result<f32> {
    let analytical = layer.backward(input.view(), output_weights.view(), training)?;
    let mut max_error = 0.0f32;
    let mut perturbed: ArrayD<f32> = input.to_owned();

    for (index, &grad) in analytical.input.indexed_iter() {
        let original = perturbed[&index];

        perturbed[&index] = original + step;
        let loss_plus = projected_output(layer, perturbed.view(), &output_weights, training)?;

        perturbed[&index] = original - step;
        let loss_minus = projected_output(layer, perturbed.view(), &output_weights, training)?;

        perturbed[&index] = original;

        let numerical = (loss_plus - loss_minus) / (2.0 * step);
        max_error = max_error.max(derivative_error(grad, numerical));
    }

    Ok(max_error)
}

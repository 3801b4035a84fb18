use ndarray::{ArrayD, ArrayViewD, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::error::{NormError, Result};
use crate::layers::LayerTrait;
use crate::loss::Loss;
use crate::optimizer::Optimizer;

/// Options for [`Sequential::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub shuffle: bool,
    /// Seed for the shuffling RNG; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            epochs: 1,
            batch_size: 128,
            learning_rate: 0.01,
            shuffle: true,
            seed: None,
        }
    }
}

/// Per-epoch training record returned by [`Sequential::fit`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    /// Sample-weighted mean of the batch losses, one entry per epoch
    pub loss: Vec<f32>,
}

/// A linear stack of layers trained with one optimizer and one loss.
///
/// Layers see `training = true` from [`Sequential::train_on_batch`] and
/// [`Sequential::fit`], and `training = false` from [`Sequential::predict`].
pub struct Sequential {
    layers: Vec<Box<dyn LayerTrait>>,
    optimizer: Box<dyn Optimizer>,
    loss: Box<dyn Loss>,
}

impl Sequential {
    pub fn new<O, L>(optimizer: O, loss: L) -> Self
    where
        O: Optimizer + 'static,
        L: Loss + 'static,
    {
        Sequential {
            layers: Vec::new(),
            optimizer: Box::new(optimizer),
            loss: Box::new(loss),
        }
    }

    /// Append a layer as the next pipeline stage
    pub fn add<T: LayerTrait + 'static>(&mut self, layer: T) -> &mut Self {
        debug!(layer = layer.name(), index = self.layers.len(), "added layer");
        self.layers.push(Box::new(layer));
        self
    }

    pub fn layers(&self) -> &[Box<dyn LayerTrait>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Box<dyn LayerTrait>] {
        &mut self.layers
    }

    /// Run every layer in inference mode
    pub fn predict(&mut self, inputs: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        let mut current = inputs.to_owned();
        for layer in &mut self.layers {
            current = layer.forward(current.view(), false)?;
        }
        Ok(current)
    }

    /// One gradient step on a single batch. Returns the loss measured before
    /// the parameters were updated.
    pub fn train_on_batch(
        &mut self,
        inputs: ArrayViewD<f32>,
        targets: ArrayViewD<f32>,
        learning_rate: f32,
    ) -> Result<f32> {
        // activations[i] is the input of layer i; the last entry is the output
        let mut activations = vec![inputs.to_owned()];
        for layer in &mut self.layers {
            let output = {
                let input = &activations[activations.len() - 1];
                layer.forward(input.view(), true)?
            };
            activations.push(output);
        }

        let outputs = &activations[activations.len() - 1];
        let loss = self.loss.compute(outputs.view(), targets.view())?;
        let mut error = self.loss.gradient(outputs.view(), targets.view())?;

        let mut parameter_gradients = Vec::with_capacity(self.layers.len());
        let layer_inputs = &activations[..self.layers.len()];
        for (layer, input) in self.layers.iter().zip(layer_inputs).rev() {
            let gradients = layer.backward(input.view(), error.view(), true)?;
            error = gradients.input;
            parameter_gradients.push(gradients.parameters);
        }
        parameter_gradients.reverse();

        let mut slot = 0;
        for (layer, gradients) in self.layers.iter_mut().zip(parameter_gradients) {
            for (param, grad) in layer.parameters_mut().into_iter().zip(gradients.iter()) {
                self.optimizer.update(slot, param, grad, learning_rate);
                slot += 1;
            }
        }

        Ok(loss)
    }

    /// Train for `options.epochs` passes over `inputs`, batching along axis 0
    pub fn fit(
        &mut self,
        inputs: ArrayViewD<f32>,
        targets: ArrayViewD<f32>,
        options: &FitOptions,
    ) -> Result<History> {
        let samples = match (inputs.shape().first(), targets.shape().first()) {
            (Some(&x), Some(&y)) if x == y => x,
            _ => {
                return Err(NormError::shape_mismatch(
                    format!("targets with {:?} samples", inputs.shape().first()),
                    format!("{:?}", targets.shape().first()),
                ))
            }
        };

        if options.batch_size == 0 {
            return Err(NormError::configuration(
                "batch_size".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut indices: Vec<usize> = (0..samples).collect();
        let mut history = History::default();

        for epoch in 0..options.epochs {
            if options.shuffle {
                indices.shuffle(&mut rng);
            }

            let mut total = 0.0f32;
            for chunk in indices.chunks(options.batch_size) {
                let batch_inputs = inputs.select(Axis(0), chunk);
                let batch_targets = targets.select(Axis(0), chunk);
                let loss = self.train_on_batch(batch_inputs.view(), batch_targets.view(), options.learning_rate)?;
                total += loss * chunk.len() as f32;
            }

            let epoch_loss = if samples > 0 { total / samples as f32 } else { 0.0 };
            info!(epoch = epoch + 1, epochs = options.epochs, loss = epoch_loss, "epoch finished");
            history.loss.push(epoch_loss);
        }

        Ok(history)
    }
}

use ndarray::Array1;
use crate::layers::{BatchNormalization, NormMode, DEFAULT_EPSILON, DEFAULT_MOMENTUM};
use crate::layers::initialization::WeightInit;
use crate::error::{NormError, Result};

/// Builder for BatchNormalization
pub struct BatchNormalizationBuilder {
    input_shape: Option<Vec<usize>>,
    mode: u8,
    epsilon: f32,
    momentum: f32,
    gamma_init: WeightInit,
    beta_init: WeightInit,
    weights: Option<Vec<Array1<f32>>>,
}

impl BatchNormalizationBuilder {
    /// Create a new batch normalization builder
    pub fn new() -> Self {
        BatchNormalizationBuilder {
            input_shape: None,
            mode: 0,
            epsilon: DEFAULT_EPSILON,
            momentum: DEFAULT_MOMENTUM,
            gamma_init: WeightInit::Ones,
            beta_init: WeightInit::Zeros,
            weights: None,
        }
    }

    /// Set the input shape; its last entry is the feature dimension
    pub fn input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shape = Some(shape.to_vec());
        self
    }

    /// Set the mode code: 0 for per-batch, 1 for running averages
    pub fn mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Set epsilon for numerical stability
    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set momentum for running statistics
    pub fn momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    /// Set gamma initialization
    pub fn gamma_init(mut self, init: WeightInit) -> Self {
        self.gamma_init = init;
        self
    }

    /// Set beta initialization
    pub fn beta_init(mut self, init: WeightInit) -> Self {
        self.beta_init = init;
        self
    }

    /// Set explicit initial weights; takes precedence over the initializers
    pub fn weights(mut self, weights: Vec<Array1<f32>>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Build the batch normalization layer
    pub fn build(self) -> Result<BatchNormalization> {
        let input_shape = self.input_shape.ok_or_else(|| NormError::Configuration {
            name: "input_shape".to_string(),
            reason: "Input shape not specified".to_string(),
        })?;

        let mode = NormMode::try_from(self.mode)?;
        let layer = BatchNormalization::with_options(&input_shape, mode, self.epsilon, self.momentum)?;

        let weights = match self.weights {
            Some(weights) => weights,
            None => {
                let features = layer.features();
                vec![
                    self.gamma_init.initialize(features)?,
                    self.beta_init.initialize(features)?,
                ]
            }
        };

        layer.with_weights(weights)
    }
}

impl Default for BatchNormalizationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

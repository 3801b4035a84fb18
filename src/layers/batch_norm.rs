use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, ArrayView2, ArrayViewD, Axis, Zip};
use serde::{Serialize, Deserialize};
use tracing::{debug, trace, warn};

use super::moments::{self, Moments};
use super::traits::{Gradients, Layer as LayerTrait};
use crate::error::{NormError, Result};

/// Name reported by [`BatchNormalization::get_config`]
pub const LAYER_NAME: &str = "BatchNormalization";

/// Default floor added to the variance before taking the square root
pub const DEFAULT_EPSILON: f32 = 1e-6;

/// Default weight of the old value in the running-average update
pub const DEFAULT_MOMENTUM: f32 = 0.9;

/// Operating mode of a [`BatchNormalization`] layer.
///
/// Serialized as its integer code: `0` for per-batch, `1` for running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NormMode {
    /// Statistics of the current batch, at train and inference time alike
    #[default]
    PerBatch,

    /// Batch statistics while training, frozen running averages at inference
    PerFeatureRunning,
}

impl TryFrom<u8> for NormMode {
    type Error = NormError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(NormMode::PerBatch),
            1 => Ok(NormMode::PerFeatureRunning),
            other => Err(unsupported_mode(other)),
        }
    }
}

fn unsupported_mode<C: std::fmt::Display>(code: C) -> NormError {
    NormError::configuration(
        "mode".to_string(),
        format!("unsupported mode {}, expected 0 (per batch) or 1 (running average)", code),
    )
}

impl From<NormMode> for u8 {
    fn from(mode: NormMode) -> u8 {
        match mode {
            NormMode::PerBatch => 0,
            NormMode::PerFeatureRunning => 1,
        }
    }
}

/// Serializable layer configuration.
///
/// Holds exactly the keys `input_shape`, `name`, `epsilon` and `mode`. Together
/// with the `(gamma, beta)` pair it is enough to rebuild a layer with the same
/// forward behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchNormConfig {
    pub input_shape: Vec<usize>,
    pub name: String,
    pub epsilon: f32,
    pub mode: NormMode,
}

impl BatchNormConfig {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a configuration from JSON. An unknown `mode` code is reported as a
    /// configuration error rather than a parse error.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mode = u8::try_from(raw.mode)
            .map_err(|_| unsupported_mode(raw.mode))
            .and_then(|code| NormMode::try_from(code))?;

        Ok(BatchNormConfig {
            input_shape: raw.input_shape,
            name: raw.name,
            epsilon: raw.epsilon,
            mode,
        })
    }
}

/// Wire form of [`BatchNormConfig`] with the mode left as a plain integer
#[derive(Deserialize)]
struct RawConfig {
    input_shape: Vec<usize>,
    name: String,
    epsilon: f32,
    mode: u64,
}

/// Exponential moving averages of the per-feature mean and std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
    pub momentum: f32,
}

impl RunningStats {
    fn new(features: usize, momentum: f32) -> Self {
        RunningStats {
            mean: Array1::zeros(features),
            std: Array1::ones(features),
            momentum,
        }
    }

    /// `running = momentum * running + (1 - momentum) * batch`
    fn update(&mut self, batch_mean: &Array1<f32>, batch_std: &Array1<f32>) {
        let m = self.momentum;
        self.mean = &self.mean * m + batch_mean * (1.0 - m);
        self.std = &self.std * m + batch_std * (1.0 - m);
    }
}

/// Mode-specific state. Only the running variant owns running statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NormState {
    BatchRelative,
    RunningAverage(RunningStats),
}

/// Batch Normalization Layer
///
/// Normalizes every feature (the trailing axis) to zero mean and unit variance
/// over all other axes, then scales and shifts with the learnable parameters
/// gamma and beta: `gamma * (x - mean) / sqrt(var + epsilon) + beta`.
///
/// In [`NormMode::PerFeatureRunning`] a training call also folds the batch mean
/// and std into running averages, which inference calls use instead of the
/// batch statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNormalization {
    input_shape: Vec<usize>,
    epsilon: f32,

    /// Scale parameter (gamma)
    gamma: Array1<f32>,

    /// Shift parameter (beta)
    beta: Array1<f32>,

    state: NormState,
}

impl BatchNormalization {
    /// Create a per-batch layer with default epsilon and parameters
    pub fn new(input_shape: &[usize]) -> Result<Self> {
        Self::with_options(input_shape, NormMode::PerBatch, DEFAULT_EPSILON, DEFAULT_MOMENTUM)
    }

    /// Create a layer from an integer mode code (`0` or `1`)
    pub fn with_mode(input_shape: &[usize], mode: u8) -> Result<Self> {
        let mode = NormMode::try_from(mode)?;
        Self::with_options(input_shape, mode, DEFAULT_EPSILON, DEFAULT_MOMENTUM)
    }

    /// Create a layer with every option spelled out.
    ///
    /// `momentum` only matters in [`NormMode::PerFeatureRunning`].
    pub fn with_options(
        input_shape: &[usize],
        mode: NormMode,
        epsilon: f32,
        momentum: f32,
    ) -> Result<Self> {
        let features = match input_shape.last() {
            Some(&features) if input_shape.iter().all(|&d| d > 0) => features,
            _ => {
                return Err(NormError::configuration(
                    "input_shape".to_string(),
                    format!("expected a non-empty shape of positive dimensions, got {:?}", input_shape),
                ))
            }
        };

        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(NormError::configuration(
                "epsilon".to_string(),
                format!("must be a finite positive number, got {}", epsilon),
            ));
        }

        if !(0.0..=1.0).contains(&momentum) {
            return Err(NormError::configuration(
                "momentum".to_string(),
                format!("must lie in [0, 1], got {}", momentum),
            ));
        }

        let state = match mode {
            NormMode::PerBatch => NormState::BatchRelative,
            NormMode::PerFeatureRunning => {
                NormState::RunningAverage(RunningStats::new(features, momentum))
            }
        };

        debug!(?input_shape, ?mode, epsilon, momentum, "created batch normalization layer");

        Ok(BatchNormalization {
            input_shape: input_shape.to_vec(),
            epsilon,
            gamma: Array1::ones(features),
            beta: Array1::zeros(features),
            state,
        })
    }

    /// Replace the default parameters with an explicit `(gamma, beta)` pair
    pub fn with_weights(mut self, weights: Vec<Array1<f32>>) -> Result<Self> {
        self.set_weights(weights)?;
        Ok(self)
    }

    /// Rebuild a layer from a configuration and optionally its saved weights.
    ///
    /// Momentum is not part of the configuration; a rebuilt running-average
    /// layer uses [`DEFAULT_MOMENTUM`].
    pub fn from_config(config: &BatchNormConfig, weights: Option<Vec<Array1<f32>>>) -> Result<Self> {
        if config.name != LAYER_NAME {
            return Err(NormError::configuration(
                "name".to_string(),
                format!("expected {}, got {}", LAYER_NAME, config.name),
            ));
        }

        let layer = Self::with_options(&config.input_shape, config.mode, config.epsilon, DEFAULT_MOMENTUM)?;
        match weights {
            Some(weights) => layer.with_weights(weights),
            None => Ok(layer),
        }
    }

    /// Serializable configuration of this layer
    pub fn get_config(&self) -> BatchNormConfig {
        BatchNormConfig {
            input_shape: self.input_shape.clone(),
            name: LAYER_NAME.to_string(),
            epsilon: self.epsilon,
            mode: self.mode(),
        }
    }

    /// Current parameters as `[gamma, beta]`
    pub fn get_weights(&self) -> Vec<Array1<f32>> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    /// Overwrite the parameters.
    ///
    /// `weights` must hold exactly two arrays, gamma then beta, each as long as
    /// the feature dimension.
    pub fn set_weights(&mut self, weights: Vec<Array1<f32>>) -> Result<()> {
        let features = self.features();
        let count = weights.len();
        let [gamma, beta]: [Array1<f32>; 2] = weights.try_into().map_err(|_| {
            NormError::configuration(
                "weights".to_string(),
                format!("expected a (gamma, beta) pair, got {} array(s)", count),
            )
        })?;

        for (name, param) in [("gamma", &gamma), ("beta", &beta)] {
            if param.len() != features {
                return Err(NormError::configuration(
                    "weights".to_string(),
                    format!("{} has length {}, expected {}", name, param.len(), features),
                ));
            }
        }

        debug!(features, "injected batch normalization weights");
        self.gamma = gamma;
        self.beta = beta;
        Ok(())
    }

    pub fn gamma(&self) -> &Array1<f32> {
        &self.gamma
    }

    pub fn beta(&self) -> &Array1<f32> {
        &self.beta
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// Size of the trailing (feature) axis
    pub fn features(&self) -> usize {
        self.gamma.len()
    }

    pub fn mode(&self) -> NormMode {
        match self.state {
            NormState::BatchRelative => NormMode::PerBatch,
            NormState::RunningAverage(_) => NormMode::PerFeatureRunning,
        }
    }

    pub fn state(&self) -> &NormState {
        &self.state
    }

    /// Running-average momentum, `None` in per-batch mode
    pub fn momentum(&self) -> Option<f32> {
        match &self.state {
            NormState::RunningAverage(stats) => Some(stats.momentum),
            NormState::BatchRelative => None,
        }
    }

    /// Running mean, `None` in per-batch mode
    pub fn running_mean(&self) -> Option<&Array1<f32>> {
        match &self.state {
            NormState::RunningAverage(stats) => Some(&stats.mean),
            NormState::BatchRelative => None,
        }
    }

    /// Running standard deviation, `None` in per-batch mode
    pub fn running_std(&self) -> Option<&Array1<f32>> {
        match &self.state {
            NormState::RunningAverage(stats) => Some(&stats.std),
            NormState::BatchRelative => None,
        }
    }

    /// Normalize a batch.
    ///
    /// Every axis except the last is treated as batch. A rank-1 input is
    /// therefore a batch of one sample, not one feature column. In running mode a
    /// training call updates the running statistics after the output has been
    /// computed from the batch statistics; nothing else mutates the layer.
    pub fn normalize(&mut self, input: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        let x = self.flatten(&input)?;
        trace!(mode = ?self.mode(), training, batch = x.nrows(), "normalize");

        let (mean, variance) = self.statistics(x.view(), training);
        let output = affine_normalize(x.view(), &mean, &variance, &self.gamma, &self.beta, self.epsilon);

        if training {
            if let NormState::RunningAverage(stats) = &mut self.state {
                stats.update(&mean, &variance.mapv(f32::sqrt));
            }
        }

        moments::restore_shape(output, input.shape())
    }

    /// Save the layer (configuration, parameters and running statistics)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(&serialized)?;
        Ok(())
    }

    /// Load a layer written by [`BatchNormalization::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = fs::File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        let layer: Self = bincode::deserialize(&buffer)?;
        layer.validate()?;
        Ok(layer)
    }

    fn validate(&self) -> Result<()> {
        let rebuilt = Self::with_options(
            &self.input_shape,
            self.mode(),
            self.epsilon,
            self.momentum().unwrap_or(DEFAULT_MOMENTUM),
        )?;
        let features = rebuilt.features();
        let lengths_match = self.gamma.len() == features
            && self.beta.len() == features
            && match &self.state {
                NormState::RunningAverage(stats) => {
                    stats.mean.len() == features && stats.std.len() == features
                }
                NormState::BatchRelative => true,
            };

        if !lengths_match {
            return Err(NormError::Serialization(format!(
                "stored parameters do not match feature dimension {}",
                features
            )));
        }
        Ok(())
    }

    fn flatten(&self, input: &ArrayViewD<f32>) -> Result<Array2<f32>> {
        moments::flatten_features(input, self.features()).map_err(|e| {
            warn!(error = %e, "batch normalization rejected input");
            e
        })
    }

    /// Mean and variance used to normalize `x`: the frozen running values for
    /// a running-mode inference call, the batch values otherwise.
    fn statistics(&self, x: ArrayView2<f32>, training: bool) -> (Array1<f32>, Array1<f32>) {
        match &self.state {
            NormState::RunningAverage(stats) if !training => {
                (stats.mean.clone(), stats.std.mapv(|s| s * s))
            }
            _ => {
                let batch = Moments::compute(x);
                (batch.mean, batch.variance)
            }
        }
    }

    fn uses_batch_statistics(&self, training: bool) -> bool {
        training || matches!(self.state, NormState::BatchRelative)
    }

    fn backward_flat(
        &self,
        x: ArrayView2<f32>,
        grad_output: ArrayView2<f32>,
        training: bool,
    ) -> (Array2<f32>, Array1<f32>, Array1<f32>) {
        let (mean, variance) = self.statistics(x, training);
        let std = variance.mapv(|v| (v + self.epsilon).sqrt());
        let x_hat = (&x - &mean) / &std;

        let grad_gamma = (&grad_output * &x_hat).sum_axis(Axis(0));
        let grad_beta = grad_output.sum_axis(Axis(0));
        let grad_x_hat = &grad_output * &self.gamma;

        let grad_input = if self.uses_batch_statistics(training) {
            // Mean and variance depend on every sample of the batch
            let n = x.nrows() as f32;
            let sum_grad = grad_x_hat.sum_axis(Axis(0));
            let sum_grad_x_hat = (&grad_x_hat * &x_hat).sum_axis(Axis(0));

            let mut grad_input = &grad_x_hat * n - &sum_grad;
            grad_input -= &(&x_hat * &sum_grad_x_hat);
            grad_input /= &(&std * n);
            grad_input
        } else {
            &grad_x_hat / &std
        };

        (grad_input, grad_gamma, grad_beta)
    }
}

/// `gamma * (x - mean) / sqrt(variance + epsilon) + beta`, per feature column
fn affine_normalize(
    x: ArrayView2<f32>,
    mean: &Array1<f32>,
    variance: &Array1<f32>,
    gamma: &Array1<f32>,
    beta: &Array1<f32>,
    epsilon: f32,
) -> Array2<f32> {
    let denominator = variance.mapv(|v| (v + epsilon).sqrt());
    let mut output = Array2::zeros(x.raw_dim());

    // Rows are independent once the statistics are fixed
    Zip::from(output.axis_iter_mut(Axis(0)))
        .and(x.axis_iter(Axis(0)))
        .par_for_each(|mut out_row, in_row| {
            Zip::from(&mut out_row)
                .and(&in_row)
                .and(mean)
                .and(&denominator)
                .and(gamma)
                .and(beta)
                .for_each(|o, &v, &m, &d, &g, &b| *o = (v - m) / d * g + b);
        });
    output
}

impl LayerTrait for BatchNormalization {
    fn forward(&mut self, input: ArrayViewD<f32>, training: bool) -> Result<ArrayD<f32>> {
        self.normalize(input, training)
    }

    fn backward(
        &self,
        input: ArrayViewD<f32>,
        output_error: ArrayViewD<f32>,
        training: bool,
    ) -> Result<Gradients> {
        if input.shape() != output_error.shape() {
            return Err(NormError::shape_mismatch(
                format!("output error of shape {:?}", input.shape()),
                format!("{:?}", output_error.shape()),
            ));
        }

        let x = self.flatten(&input)?;
        let grad_output = self.flatten(&output_error)?;
        let (grad_input, grad_gamma, grad_beta) = self.backward_flat(x.view(), grad_output.view(), training);

        Ok(Gradients {
            input: moments::restore_shape(grad_input, input.shape())?,
            parameters: vec![grad_gamma, grad_beta],
        })
    }

    fn parameters(&self) -> Vec<&Array1<f32>> {
        vec![&self.gamma, &self.beta]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f32>> {
        vec![&mut self.gamma, &mut self.beta]
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn name(&self) -> &'static str {
        LAYER_NAME
    }

    fn clone_box(&self) -> Box<dyn LayerTrait> {
        Box::new(self.clone())
    }
}

use ndarray::Array1;
use ndarray_rand::RandomExt;
use rand_distr::{Normal, Uniform};
use serde::{Serialize, Deserialize};
use crate::error::{NormError, Result};

/// Initialization strategies for the affine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// All ones (default for gamma)
    Ones,

    /// All zeros (default for beta)
    Zeros,

    /// Every element set to the same value
    Constant(f32),

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },

    /// Normal distribution with custom mean and std
    Normal { mean: f32, std: f32 },
}

impl WeightInit {
    /// Initialize a parameter vector of the given size
    pub fn initialize(&self, size: usize) -> Result<Array1<f32>> {
        match self {
            WeightInit::Ones => Ok(Array1::ones(size)),

            WeightInit::Zeros => Ok(Array1::zeros(size)),

            WeightInit::Constant(value) => Ok(Array1::from_elem(size, *value)),

            WeightInit::Uniform { min, max } => {
                if !(min < max) {
                    return Err(NormError::configuration(
                        "init".to_string(),
                        format!("uniform range [{}, {}) is empty", min, max),
                    ));
                }
                if !(min.is_finite() && max.is_finite() && (max - min).is_finite()) {
                    return Err(NormError::configuration(
                        "init".to_string(),
                        format!("uniform range [{}, {}) is not finite", min, max),
                    ));
                }
                Ok(Array1::random(size, Uniform::new(*min, *max)))
            }

            WeightInit::Normal { mean, std } => {
                if !(mean.is_finite() && std.is_finite() && *std >= 0.0) {
                    return Err(NormError::configuration(
                        "init".to_string(),
                        format!("normal(mean {}, std {}) needs a finite mean and a finite non-negative std", mean, std),
                    ));
                }
                let dist = Normal::new(*mean, *std).map_err(|e| {
                    NormError::configuration("init".to_string(), e.to_string())
                })?;
                Ok(Array1::random(size, dist))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_inits() {
        assert_eq!(WeightInit::Ones.initialize(3).unwrap(), Array1::from(vec![1.0, 1.0, 1.0]));
        assert_eq!(WeightInit::Zeros.initialize(2).unwrap(), Array1::from(vec![0.0, 0.0]));
        assert_eq!(WeightInit::Constant(2.5).initialize(2).unwrap(), Array1::from(vec![2.5, 2.5]));
    }

    #[test]
    fn test_uniform_range() {
        let values = WeightInit::Uniform { min: -0.1, max: 0.1 }.initialize(100).unwrap();
        for &v in values.iter() {
            assert!(v >= -0.1 && v < 0.1);
        }
    }

    #[test]
    fn test_invalid_distributions() {
        assert!(WeightInit::Uniform { min: 1.0, max: 1.0 }.initialize(4).is_err());
        assert!(WeightInit::Normal { mean: 0.0, std: f32::NAN }.initialize(4).is_err());
    }

    #[test]
    fn test_non_finite_distributions_are_configuration_errors() {
        let cases = [
            WeightInit::Uniform { min: -f32::MAX, max: f32::MAX },
            WeightInit::Uniform { min: 0.0, max: f32::INFINITY },
            WeightInit::Uniform { min: f32::NEG_INFINITY, max: 0.0 },
            WeightInit::Normal { mean: f32::INFINITY, std: 1.0 },
            WeightInit::Normal { mean: 0.0, std: f32::INFINITY },
            WeightInit::Normal { mean: 0.0, std: -1.0 },
        ];
        for init in cases {
            let err = init.initialize(3).unwrap_err();
            assert!(err.is_configuration(), "{:?} gave {:?}", init, err);
        }
    }
}

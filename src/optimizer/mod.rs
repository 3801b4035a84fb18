use ndarray::Array1;
use serde::{Serialize, Deserialize};

/// Update rule applied by a model container to each trainable parameter.
///
/// `slot` identifies the parameter across calls so stateful optimizers can
/// keep per-parameter buffers.
pub trait Optimizer: Send + Sync {
    fn update(&mut self, slot: usize, param: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);
}

/// Stochastic gradient descent with optional classical momentum
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SGD {
    pub momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    pub fn new() -> SGD {
        SGD::default()
    }

    pub fn with_momentum(momentum: f32) -> SGD {
        SGD {
            momentum,
            velocities: Vec::new(),
        }
    }
}

impl Optimizer for SGD {
    fn update(&mut self, slot: usize, param: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        if self.momentum == 0.0 {
            param.zip_mut_with(gradients, |p, &g| *p -= learning_rate * g);
            return;
        }

        if self.velocities.len() <= slot {
            self.velocities.resize(slot + 1, None);
        }
        let velocity = self.velocities[slot].get_or_insert_with(|| Array1::zeros(param.len()));

        // v = momentum * v - lr * g; p += v
        let momentum = self.momentum;
        velocity.zip_mut_with(gradients, |v, &g| *v = momentum * *v - learning_rate * g);
        *param += &*velocity;
    }
}

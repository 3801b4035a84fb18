use ndarray::{Array1, Array2, ArrayD, ArrayViewD, ArrayView2, IxDyn};
use crate::error::{NormError, Result};

/// Per-feature first and second moments of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub mean: Array1<f32>,
    /// Population variance (divides by the batch size, not batch size - 1)
    pub variance: Array1<f32>,
}

impl Moments {
    /// Compute moments down the rows of a `(batch, features)` matrix.
    ///
    /// The mean is accumulated relative to the first row, so a column that is
    /// constant across the batch gets a mean bit-identical to its values and a
    /// variance of exactly zero.
    pub fn compute(x: ArrayView2<f32>) -> Self {
        let rows = x.nrows();
        let features = x.ncols();
        if rows == 0 {
            return Moments {
                mean: Array1::zeros(features),
                variance: Array1::zeros(features),
            };
        }

        let shift = x.row(0);
        let mut offset = vec![0.0f64; features];
        for row in x.rows() {
            for ((acc, &v), &s) in offset.iter_mut().zip(row.iter()).zip(shift.iter()) {
                *acc += v as f64 - s as f64;
            }
        }
        let mean = Array1::from_shape_fn(features, |j| {
            shift[j] + (offset[j] / rows as f64) as f32
        });

        let mut squares = vec![0.0f64; features];
        for row in x.rows() {
            for ((acc, &v), &m) in squares.iter_mut().zip(row.iter()).zip(mean.iter()) {
                let d = v as f64 - m as f64;
                *acc += d * d;
            }
        }
        let variance = Array1::from_iter(squares.into_iter().map(|s| (s / rows as f64) as f32));

        Moments { mean, variance }
    }

    /// Population standard deviation
    pub fn std(&self) -> Array1<f32> {
        self.variance.mapv(f32::sqrt)
    }
}

/// Flatten every axis but the last into one effective batch axis.
///
/// Fails when the input has no axes, no elements, or a trailing axis that
/// differs from `features`.
pub fn flatten_features(input: &ArrayViewD<f32>, features: usize) -> Result<Array2<f32>> {
    let shape = input.shape();
    let last = match shape.last() {
        Some(&last) => last,
        None => {
            return Err(NormError::shape_mismatch(
                format!("input with trailing dimension {}", features),
                "a rank-0 input".to_string(),
            ))
        }
    };

    if last != features {
        return Err(NormError::shape_mismatch(
            format!("trailing dimension {}", features),
            format!("trailing dimension {} (input shape {:?})", last, shape),
        ));
    }

    let rows = input.len() / features;
    if rows == 0 {
        return Err(NormError::shape_mismatch(
            "at least one sample".to_string(),
            format!("empty input of shape {:?}", shape),
        ));
    }

    input
        .as_standard_layout()
        .into_owned()
        .into_shape((rows, features))
        .map_err(|e| NormError::shape_mismatch(format!("{} x {}", rows, features), e.to_string()))
}

/// Undo [`flatten_features`], restoring the caller's original shape
pub fn restore_shape(flat: Array2<f32>, shape: &[usize]) -> Result<ArrayD<f32>> {
    flat.into_shape(IxDyn(shape))
        .map_err(|e| NormError::shape_mismatch(format!("{:?}", shape), e.to_string()))
}

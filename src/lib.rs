//! # batchnorm - Batch Normalization Layer
//!
//! A batch normalization layer for `ndarray` tensors of any rank, together
//! with the small amount of model plumbing needed to train it.
//!
//! ## Key Features
//!
//! - **Two modes**: per-batch statistics (mode 0) or running averages for
//!   inference (mode 1)
//! - **Any rank**: every axis except the trailing feature axis is a batch axis
//! - **Affine parameters**: learnable gamma/beta with gradient support
//! - **Serializable**: `get_config()` round trips through JSON, whole layers
//!   save and load with bincode
//!
//! ## Quick Start
//!
//! ```rust
//! use batchnorm::layers::BatchNormalization;
//! use ndarray::Array2;
//!
//! let mut layer = BatchNormalization::with_mode(&[3], 1).unwrap();
//! let batch = Array2::from_shape_fn((4, 3), |(i, j)| (i * 3 + j) as f32).into_dyn();
//!
//! // Training call: batch statistics, running averages updated afterwards
//! let out = layer.normalize(batch.view(), true).unwrap();
//! assert_eq!(out.shape(), batch.shape());
//!
//! // Inference call: frozen running statistics
//! let _ = layer.normalize(batch.view(), false).unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`layers`] - The normalization layer and the `Layer` trait it implements
//! - [`builders`] - Builder for layer construction
//! - [`network`] - Minimal sequential container used to train layers
//! - [`optimizer`] - Parameter update rules
//! - [`loss`] - Loss functions for training
//! - [`debug`] - Finite-difference gradient checks
//! - [`error`] - Error types and result handling

#[macro_use]
pub mod macros;

pub mod builders;
pub mod debug;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizer;

pub use error::{NormError, Result};
pub use layers::{BatchNormConfig, BatchNormalization, NormMode};

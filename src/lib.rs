//! Soft-DTW alignment loss and Siamese pair sampling for multivariate time series.
//!
//! This crate provides the pieces of an unsupervised representation-learning
//! pipeline on fixed-width time series (for example the UCI Human Activity
//! Recognition signals): sample same-label and different-label pairs, compare
//! encoded sequences with a differentiable alignment cost, train a small
//! encoder, and evaluate the embeddings with k-nearest-neighbour
//! classification and a linear probe.
//!
//! # Quick Start
//!
//! ```rust
//! use siamese_sdtw::softdtw::SoftDtw;
//! use ndarray::Array2;
//!
//! // Two sequences with 3 features and different lengths.
//! let x = Array2::from_shape_fn((3, 20), |(k, t)| (t as f64 * 0.3 + k as f64).sin());
//! let y = Array2::from_shape_fn((3, 25), |(k, t)| (t as f64 * 0.24 + k as f64).sin());
//!
//! let sdtw = SoftDtw::new(1.0).unwrap();
//! let out = sdtw.value_and_grad(x.view(), y.view()).unwrap();
//! assert_eq!(out.grad_x.shape(), &[3, 20]);
//! assert_eq!(out.grad_y.shape(), &[3, 25]);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`softdtw`] | Soft-DTW forward/backward, divergence, banding, batches |
//! | [`distance`] | Pointwise distances with gradients, cost matrices |
//! | [`sampling`] | Labelled pools, positive/negative pair sampling |
//! | [`encoder`] | Encoder seam and a linear baseline encoder |
//! | [`loss`] | Contrastive loss on Soft-DTW distances |
//! | [`siamese`] | Siamese training step and epochs |
//! | [`knn`] | k-NN evaluation of embeddings |
//! | [`probe`] | Linear probe on time-pooled embeddings |
//! | [`utils`] | Classical DTW, validation helpers |
//!
//! # Sequence Layout
//!
//! Sequences are `ndarray` matrices of shape `(n_features, n_frames)`: one
//! column per timestep. All arithmetic is `f64`.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Shapes and parameters are validated
//! before any dynamic programming starts.
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `parallel` | Evaluate batches of pairs on rayon worker threads |

#![deny(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod distance;
pub mod encoder;
pub mod knn;
pub mod loss;
pub mod probe;
pub mod sampling;
pub mod siamese;
pub mod softdtw;
pub mod utils;

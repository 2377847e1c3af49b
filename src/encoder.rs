//! Encoders map a raw sequence to an embedding sequence.
//!
//! The Siamese setup applies one encoder, with shared weights, to both sides
//! of a pair and compares the embeddings with Soft-DTW. Any differentiable
//! model can sit behind [`Encoder`]; [`LinearEncoder`] is the small built-in
//! baseline used for training and tests.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Maps a sequence of shape `(input_features, n_frames)` to an embedding
/// sequence of shape `(output_features, n_frames')`.
pub trait Encoder {
    fn input_features(&self) -> usize;

    fn output_features(&self) -> usize;

    fn encode(&self, x: ArrayView2<f64>) -> crate::Result<Array2<f64>>;
}

/// An [`Encoder`] whose parameters can be trained by gradient descent.
pub trait TrainableEncoder: Encoder {
    type Grad;

    /// Parameter gradient given `x` and `d loss / d encode(x)`.
    fn backward(&self, x: ArrayView2<f64>, grad_out: ArrayView2<f64>) -> crate::Result<Self::Grad>;

    /// Apply one gradient descent step with learning rate `lr`.
    fn apply_gradient(&mut self, grad: &Self::Grad, lr: f64);
}

/// Frame-wise affine projection `W x_t + b`.
///
/// `W` has shape `(output_features, input_features)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEncoder {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Parameter gradients of a [`LinearEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEncoderGrad {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

impl LinearEncoderGrad {
    pub fn zeros(encoder: &LinearEncoder) -> Self {
        Self {
            weight: Array2::zeros(encoder.weight.raw_dim()),
            bias: Array1::zeros(encoder.bias.raw_dim()),
        }
    }

    /// Accumulate another gradient into this one.
    pub fn add_assign(&mut self, other: &LinearEncoderGrad) {
        self.weight += &other.weight;
        self.bias += &other.bias;
    }
}

impl LinearEncoder {
    /// Uniform Glorot-style initialisation in `[-1/sqrt(in), 1/sqrt(in)]`,
    /// zero bias.
    pub fn new(input_features: usize, output_features: usize, seed: u64) -> crate::Result<Self> {
        if input_features == 0 || output_features == 0 {
            return Err(crate::Error::InvalidParameter {
                name: "features",
                value: format!("{input_features} -> {output_features}"),
                reason: "encoder dimensions must be > 0".to_string(),
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let scale = 1.0 / (input_features as f64).sqrt();
        let weight = Array2::from_shape_fn((output_features, input_features), |_| {
            rng.gen_range(-scale..scale)
        });
        Ok(Self {
            weight,
            bias: Array1::zeros(output_features),
        })
    }

    /// Encoder returning its input unchanged (square identity weight).
    pub fn identity(features: usize) -> Self {
        Self {
            weight: Array2::eye(features),
            bias: Array1::zeros(features),
        }
    }

    fn check_input(&self, x: &ArrayView2<f64>) -> crate::Result<()> {
        if x.nrows() != self.input_features() {
            return Err(crate::Error::ShapeMismatch {
                expected: format!("{} input features", self.input_features()),
                got: format!("{} features", x.nrows()),
            });
        }
        crate::utils::valid_sequence(x, "encoder input")
    }

    /// Parameter gradients given the upstream gradient on the embedding.
    ///
    /// # Arguments
    /// * `x` - Input that produced the embedding (input_features x n_frames)
    /// * `grad_out` - d loss / d embedding (output_features x n_frames)
    pub fn backward(
        &self,
        x: ArrayView2<f64>,
        grad_out: ArrayView2<f64>,
    ) -> crate::Result<LinearEncoderGrad> {
        self.check_input(&x)?;
        let expected = (self.output_features(), x.ncols());
        if grad_out.dim() != expected {
            return Err(crate::Error::ShapeMismatch {
                expected: format!("{expected:?}"),
                got: format!("{:?}", grad_out.dim()),
            });
        }
        Ok(LinearEncoderGrad {
            weight: grad_out.dot(&x.t()),
            bias: grad_out.sum_axis(Axis(1)),
        })
    }

    /// Plain SGD update `theta -= lr * grad`.
    pub fn sgd_step(&mut self, grad: &LinearEncoderGrad, lr: f64) {
        self.weight.scaled_add(-lr, &grad.weight);
        self.bias.scaled_add(-lr, &grad.bias);
    }
}

impl Encoder for LinearEncoder {
    fn input_features(&self) -> usize {
        self.weight.ncols()
    }

    fn output_features(&self) -> usize {
        self.weight.nrows()
    }

    fn encode(&self, x: ArrayView2<f64>) -> crate::Result<Array2<f64>> {
        self.check_input(&x)?;
        let mut out = self.weight.dot(&x);
        out += &self.bias.view().insert_axis(Axis(1));
        Ok(out)
    }
}

impl TrainableEncoder for LinearEncoder {
    type Grad = LinearEncoderGrad;

    fn backward(&self, x: ArrayView2<f64>, grad_out: ArrayView2<f64>) -> crate::Result<Self::Grad> {
        LinearEncoder::backward(self, x, grad_out)
    }

    fn apply_gradient(&mut self, grad: &Self::Grad, lr: f64) {
        self.sgd_step(grad, lr);
    }
}

//! Soft Dynamic Time Warping.
//!
//! Soft-DTW replaces the hard minimum of the DTW recurrence with a smoothed
//! minimum controlled by `gamma`, which makes the alignment cost
//! differentiable with respect to both input sequences.
//!
//! Sequences are feature matrices of shape `(n_features, n_frames)`, one
//! column per timestep. Both sequences of a pair must share `n_features`, but
//! their lengths are independent.
//!
//! # Example
//! ```
//! use siamese_sdtw::softdtw::SoftDtw;
//! use ndarray::array;
//!
//! let x = array![[0.0, 1.0, 2.0, 3.0]];
//! let y = array![[0.0, 1.0, 1.0, 2.0, 3.0]];
//! let z = array![[3.0, 2.0, 1.0]];
//!
//! let sdtw = SoftDtw::new(1.0).unwrap();
//! let near = sdtw.distance(x.view(), y.view()).unwrap();
//! let far = sdtw.distance(x.view(), z.view()).unwrap();
//! assert!(near < far);
//!
//! let out = sdtw.value_and_grad(x.view(), z.view()).unwrap();
//! assert_eq!(out.grad_x.shape(), x.shape());
//! assert_eq!(out.grad_y.shape(), z.shape());
//! ```

mod batch;
mod recurrence;

pub use batch::SequencePair;
pub use recurrence::softmin;

use ndarray::{Array2, ArrayView2};

use crate::distance::{PointwiseDistance, SquaredEuclidean, cost_matrix_unchecked};

/// Soft-DTW configuration.
///
/// `gamma` has no default: it must be given explicitly and be strictly
/// positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftDtwConfig {
    /// Smoothing factor. Smaller values approach classical DTW.
    pub gamma: f64,
    /// Optional Sakoe-Chiba band: cells with `|i - j| > bandwidth` are pruned.
    pub bandwidth: Option<usize>,
    /// Report the Soft-DTW divergence
    /// `sdtw(x, y) - (sdtw(x, x) + sdtw(y, y)) / 2` instead of the raw value.
    pub normalize: bool,
}

impl SoftDtwConfig {
    pub fn new(gamma: f64) -> crate::Result<Self> {
        crate::utils::valid_gamma(gamma)?;
        Ok(Self {
            gamma,
            bandwidth: None,
            normalize: false,
        })
    }

    pub fn with_bandwidth(mut self, bandwidth: usize) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Re-check the configuration. Fields are public, so the engine calls
    /// this before every computation.
    pub fn validate(&self) -> crate::Result<()> {
        crate::utils::valid_gamma(self.gamma)
    }
}

/// Value of a Soft-DTW comparison together with its gradients.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDtwGradient {
    pub value: f64,
    /// Gradient with respect to `x`, same shape as `x`.
    pub grad_x: Array2<f64>,
    /// Gradient with respect to `y`, same shape as `y`.
    pub grad_y: Array2<f64>,
}

/// Result of one forward pass: the cost matrix and the accumulated table.
///
/// Created fresh for each pair and consumed by [`Alignment::expected_alignment`]
/// for the backward pass.
#[derive(Debug, Clone)]
pub struct Alignment {
    cost: Array2<f64>,
    table: Array2<f64>,
    gamma: f64,
}

impl Alignment {
    /// Soft-DTW value `R[n_x][n_y]`.
    pub fn value(&self) -> f64 {
        let (n, m) = self.table.dim();
        self.table[(n - 1, m - 1)]
    }

    /// Pairwise cost matrix, shape `(n_frames_x, n_frames_y)`.
    pub fn cost(&self) -> ArrayView2<'_, f64> {
        self.cost.view()
    }

    /// Accumulated table `R`, shape `(n_frames_x + 1, n_frames_y + 1)`.
    pub fn table(&self) -> ArrayView2<'_, f64> {
        self.table.view()
    }

    /// Expected alignment matrix: the gradient of [`Alignment::value`] with
    /// respect to each entry of the cost matrix.
    pub fn expected_alignment(&self) -> Array2<f64> {
        recurrence::expected_alignment(&self.cost.view(), &self.table.view(), self.gamma)
    }
}

/// Soft-DTW engine parameterised by a pointwise distance.
#[derive(Debug, Clone)]
pub struct SoftDtw<M = SquaredEuclidean> {
    config: SoftDtwConfig,
    metric: M,
}

impl SoftDtw<SquaredEuclidean> {
    /// Engine with squared Euclidean pointwise distance and no band.
    pub fn new(gamma: f64) -> crate::Result<Self> {
        Self::with_metric(SoftDtwConfig::new(gamma)?, SquaredEuclidean)
    }
}

impl<M: PointwiseDistance> SoftDtw<M> {
    pub fn with_metric(config: SoftDtwConfig, metric: M) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self { config, metric })
    }

    pub fn config(&self) -> &SoftDtwConfig {
        &self.config
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Validate one pair before any table is allocated.
    fn check_pair(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> crate::Result<()> {
        self.config.validate()?;
        crate::utils::valid_pair(x, y)?;
        crate::utils::valid_bandwidth(self.config.bandwidth, x.ncols(), y.ncols())
    }

    /// Run the forward pass for one pair.
    ///
    /// The returned alignment always holds the raw Soft-DTW value, regardless
    /// of [`SoftDtwConfig::normalize`].
    pub fn align(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> crate::Result<Alignment> {
        self.check_pair(&x, &y)?;
        self.align_unchecked(&x, &y)
    }

    /// Forward pass on an already validated pair. Still fails if the cost
    /// matrix overflows, since finite inputs can have an infinite distance.
    fn align_unchecked(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> crate::Result<Alignment> {
        log::trace!(
            "soft-dtw {}x{} frames, {} features, gamma={}, metric={}",
            x.ncols(),
            y.ncols(),
            x.nrows(),
            self.config.gamma,
            self.metric.name()
        );
        let cost = cost_matrix_unchecked(x, y, &self.metric);
        crate::utils::finite_cost(&cost.view())?;
        let table = recurrence::accumulate(&cost.view(), self.config.gamma, self.config.bandwidth);
        Ok(Alignment {
            cost,
            table,
            gamma: self.config.gamma,
        })
    }

    /// Soft-DTW value between `x` and `y` (the divergence if normalising).
    ///
    /// # Errors
    /// `ShapeMismatch` if feature dimensions differ, `EmptySequence` if either
    /// side has no frames, `InvalidGamma` for a non-positive gamma and
    /// `InvalidParameter` if the band cannot reach the end cell,
    /// `NonFiniteInput` if a pointwise distance overflows.
    pub fn distance(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> crate::Result<f64> {
        self.check_pair(&x, &y)?;
        self.distance_unchecked(&x, &y)
    }

    fn distance_unchecked(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> crate::Result<f64> {
        let xy = self.align_unchecked(x, y)?.value();
        if !self.config.normalize {
            return Ok(xy);
        }
        let xx = self.align_unchecked(x, x)?.value();
        let yy = self.align_unchecked(y, y)?.value();
        Ok(xy - 0.5 * (xx + yy))
    }

    /// Soft-DTW value and its gradient with respect to both sequences.
    pub fn value_and_grad(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> crate::Result<SoftDtwGradient> {
        self.check_pair(&x, &y)?;
        self.value_and_grad_unchecked(&x, &y)
    }

    fn value_and_grad_unchecked(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView2<f64>,
    ) -> crate::Result<SoftDtwGradient> {
        let (value, grad_x, grad_y) = self.raw_value_and_grad(x, y)?;
        if !self.config.normalize {
            return Ok(SoftDtwGradient {
                value,
                grad_x,
                grad_y,
            });
        }

        let (xx, gxx_a, gxx_b) = self.raw_value_and_grad(x, x)?;
        let (yy, gyy_a, gyy_b) = self.raw_value_and_grad(y, y)?;
        Ok(SoftDtwGradient {
            value: value - 0.5 * (xx + yy),
            grad_x: grad_x - 0.5 * (gxx_a + gxx_b),
            grad_y: grad_y - 0.5 * (gyy_a + gyy_b),
        })
    }

    /// Forward and backward pass for the raw value, chaining the expected
    /// alignment through the pointwise distance.
    fn raw_value_and_grad(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView2<f64>,
    ) -> crate::Result<(f64, Array2<f64>, Array2<f64>)> {
        let alignment = self.align_unchecked(x, y)?;
        let e = alignment.expected_alignment();

        let mut grad_x = Array2::<f64>::zeros(x.raw_dim());
        let mut grad_y = Array2::<f64>::zeros(y.raw_dim());
        for ((i, j), &weight) in e.indexed_iter() {
            if weight == 0.0 {
                continue;
            }
            self.metric.accumulate_gradient(
                x.column(i),
                y.column(j),
                weight,
                grad_x.column_mut(i),
                grad_y.column_mut(j),
            );
        }

        Ok((alignment.value(), grad_x, grad_y))
    }
}

#[cfg(test)]
mod tests;

//! Pointwise distances between timesteps and the cost matrices built from them.
//!
//! A [`PointwiseDistance`] compares one column of sequence `x` with one column
//! of sequence `y`. Soft-DTW needs the derivative of that comparison as well,
//! so every distance also knows how to accumulate its gradient.

use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

/// Distance between two feature vectors of equal length, with its gradient.
pub trait PointwiseDistance: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Distance between `a` and `b`.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;

    /// Add `weight * d distance / d a` into `grad_a` and `weight * d distance / d b`
    /// into `grad_b`.
    fn accumulate_gradient(
        &self,
        a: ArrayView1<f64>,
        b: ArrayView1<f64>,
        weight: f64,
        grad_a: ArrayViewMut1<f64>,
        grad_b: ArrayViewMut1<f64>,
    );
}

/// Squared Euclidean distance `||a - b||^2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquaredEuclidean;

impl PointwiseDistance for SquaredEuclidean {
    fn name(&self) -> &'static str {
        "sqeuclidean"
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }

    fn accumulate_gradient(
        &self,
        a: ArrayView1<f64>,
        b: ArrayView1<f64>,
        weight: f64,
        grad_a: ArrayViewMut1<f64>,
        grad_b: ArrayViewMut1<f64>,
    ) {
        Zip::from(grad_a)
            .and(grad_b)
            .and(&a)
            .and(&b)
            .for_each(|ga, gb, &x, &y| {
                let g = 2.0 * weight * (x - y);
                *ga += g;
                *gb -= g;
            });
    }
}

/// Manhattan (L1) distance. The gradient is the subgradient `sign(a - b)`,
/// taken as zero where the coordinates coincide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Manhattan;

impl PointwiseDistance for Manhattan {
    fn name(&self) -> &'static str {
        "manhattan"
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).abs()).sum()
    }

    fn accumulate_gradient(
        &self,
        a: ArrayView1<f64>,
        b: ArrayView1<f64>,
        weight: f64,
        grad_a: ArrayViewMut1<f64>,
        grad_b: ArrayViewMut1<f64>,
    ) {
        Zip::from(grad_a)
            .and(grad_b)
            .and(&a)
            .and(&b)
            .for_each(|ga, gb, &x, &y| {
                let diff = x - y;
                if diff != 0.0 {
                    let g = weight * diff.signum();
                    *ga += g;
                    *gb -= g;
                }
            });
    }
}

/// Cosine distance `1 - <a, b> / (|a| |b|)`.
///
/// Vectors with (near) zero norm are treated as maximally distant (distance 1)
/// and contribute no gradient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cosine;

const COSINE_EPS: f64 = 1e-10;

impl PointwiseDistance for Cosine {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let dot = a.dot(&b);
        let norm_prod = (a.dot(&a) * b.dot(&b)).sqrt();
        if norm_prod > COSINE_EPS {
            1.0 - dot / norm_prod
        } else {
            1.0
        }
    }

    fn accumulate_gradient(
        &self,
        a: ArrayView1<f64>,
        b: ArrayView1<f64>,
        weight: f64,
        grad_a: ArrayViewMut1<f64>,
        grad_b: ArrayViewMut1<f64>,
    ) {
        let dot = a.dot(&b);
        let aa = a.dot(&a);
        let bb = b.dot(&b);
        let norm_prod = (aa * bb).sqrt();
        if norm_prod <= COSINE_EPS {
            return;
        }
        // d cos / d a = b / (|a||b|) - cos * a / |a|^2, and the distance is 1 - cos.
        let cos = dot / norm_prod;
        Zip::from(grad_a)
            .and(grad_b)
            .and(&a)
            .and(&b)
            .for_each(|ga, gb, &x, &y| {
                *ga -= weight * (y / norm_prod - cos * x / aa);
                *gb -= weight * (x / norm_prod - cos * y / bb);
            });
    }
}

/// Runtime-selectable pointwise distance.
///
/// # Example
/// ```
/// use siamese_sdtw::distance::Metric;
///
/// let metric: Metric = "manhattan".parse().unwrap();
/// assert_eq!(metric, Metric::Manhattan);
/// assert!("hamming".parse::<Metric>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    #[default]
    SquaredEuclidean,
    Manhattan,
    Cosine,
}

impl FromStr for Metric {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "sqeuclidean" | "squared_euclidean" => Ok(Metric::SquaredEuclidean),
            "manhattan" | "l1" => Ok(Metric::Manhattan),
            "cosine" => Ok(Metric::Cosine),
            other => Err(crate::Error::InvalidParameter {
                name: "metric",
                value: other.to_string(),
                reason: "expected one of: sqeuclidean, manhattan, cosine".to_string(),
            }),
        }
    }
}

impl PointwiseDistance for Metric {
    fn name(&self) -> &'static str {
        match self {
            Metric::SquaredEuclidean => SquaredEuclidean.name(),
            Metric::Manhattan => Manhattan.name(),
            Metric::Cosine => Cosine.name(),
        }
    }

    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            Metric::SquaredEuclidean => SquaredEuclidean.distance(a, b),
            Metric::Manhattan => Manhattan.distance(a, b),
            Metric::Cosine => Cosine.distance(a, b),
        }
    }

    fn accumulate_gradient(
        &self,
        a: ArrayView1<f64>,
        b: ArrayView1<f64>,
        weight: f64,
        grad_a: ArrayViewMut1<f64>,
        grad_b: ArrayViewMut1<f64>,
    ) {
        match self {
            Metric::SquaredEuclidean => {
                SquaredEuclidean.accumulate_gradient(a, b, weight, grad_a, grad_b)
            }
            Metric::Manhattan => Manhattan.accumulate_gradient(a, b, weight, grad_a, grad_b),
            Metric::Cosine => Cosine.accumulate_gradient(a, b, weight, grad_a, grad_b),
        }
    }
}

/// Compute the pairwise cost matrix between the frames of two sequences.
///
/// # Arguments
/// * `x` - First sequence (n_features x n_frames_x)
/// * `y` - Second sequence (n_features x n_frames_y)
/// * `metric` - Pointwise distance
///
/// # Returns
/// Cost matrix of shape (n_frames_x, n_frames_y)
///
/// # Example
/// ```
/// use siamese_sdtw::distance::{SquaredEuclidean, cost_matrix};
/// use ndarray::array;
///
/// let x = array![[0.0, 1.0, 2.0]];
/// let y = array![[0.0, 2.0]];
/// let c = cost_matrix(&x.view(), &y.view(), &SquaredEuclidean).unwrap();
/// assert_eq!(c.shape(), &[3, 2]);
/// assert_eq!(c[(2, 0)], 4.0);
/// ```
pub fn cost_matrix<M: PointwiseDistance + ?Sized>(
    x: &ArrayView2<f64>,
    y: &ArrayView2<f64>,
    metric: &M,
) -> crate::Result<Array2<f64>> {
    crate::utils::valid_pair(x, y)?;
    let cost = cost_matrix_unchecked(x, y, metric);
    crate::utils::finite_cost(&cost.view())?;
    Ok(cost)
}

pub(crate) fn cost_matrix_unchecked<M: PointwiseDistance + ?Sized>(
    x: &ArrayView2<f64>,
    y: &ArrayView2<f64>,
    metric: &M,
) -> Array2<f64> {
    let n_x = x.ncols();
    let n_y = y.ncols();
    let mut cost = Array2::<f64>::zeros((n_x, n_y));
    for i in 0..n_x {
        let xi = x.column(i);
        for j in 0..n_y {
            cost[(i, j)] = metric.distance(xi, y.column(j));
        }
    }
    cost
}

//! Forward and backward sweeps of the Soft-DTW recurrence over a cost matrix.
//!
//! Tables are indexed with a one-cell border: `r[(i, j)]` for `i in 0..=n_x`,
//! `j in 0..=n_y`, where row 0 and column 0 are the unreachable border except
//! the origin `r[(0, 0)] = 0`. Cell `(i, j)` pays `cost[(i - 1, j - 1)]`.

use ndarray::{Array2, ArrayView2};

/// Soft minimum of three values with smoothing `gamma`:
/// `-gamma * ln(exp(-a/gamma) + exp(-b/gamma) + exp(-c/gamma))`.
///
/// The minimum is subtracted before exponentiating so no term overflows.
/// Infinite arguments contribute nothing; if all three are `+inf` the result
/// is `+inf`.
///
/// # Example
/// ```
/// use siamese_sdtw::softdtw::softmin;
///
/// let s = softmin(1.0, 1.0, 1.0, 1.0);
/// assert!((s - (1.0 - 3.0f64.ln())).abs() < 1e-12);
///
/// // Large magnitudes do not overflow.
/// assert!(softmin(1e5, 1e5 + 1.0, f64::INFINITY, 0.01).is_finite());
/// ```
#[inline]
pub fn softmin(a: f64, b: f64, c: f64, gamma: f64) -> f64 {
    let m = a.min(b).min(c);
    if m == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum = (-(a - m) / gamma).exp() + (-(b - m) / gamma).exp() + (-(c - m) / gamma).exp();
    m - gamma * sum.ln()
}

#[inline]
fn in_band(i: usize, j: usize, bandwidth: Option<usize>) -> bool {
    bandwidth.is_none_or(|band| i.abs_diff(j) <= band)
}

/// Fill the accumulated soft cost table `R` of shape `(n_x + 1, n_y + 1)`.
///
/// Cells outside the optional Sakoe-Chiba band stay at `+inf`.
pub(crate) fn accumulate(cost: &ArrayView2<f64>, gamma: f64, bandwidth: Option<usize>) -> Array2<f64> {
    let (n_x, n_y) = cost.dim();
    let mut r = Array2::<f64>::from_elem((n_x + 1, n_y + 1), f64::INFINITY);
    r[(0, 0)] = 0.0;

    for i in 1..=n_x {
        for j in 1..=n_y {
            if !in_band(i, j, bandwidth) {
                continue;
            }
            let best = softmin(r[(i - 1, j - 1)], r[(i - 1, j)], r[(i, j - 1)], gamma);
            r[(i, j)] = cost[(i - 1, j - 1)] + best;
        }
    }

    r
}

/// Backward sweep: expected alignment matrix `E` of shape `(n_x, n_y)`.
///
/// `E[(i, j)]` is the derivative of `R[n_x][n_y]` with respect to
/// `cost[(i, j)]`. Each cell collects the adjoints of its three successors,
/// weighted by the share it had in that successor's soft minimum:
/// `exp((R[s] - cost[s] - R[p]) / gamma)`.
pub(crate) fn expected_alignment(
    cost: &ArrayView2<f64>,
    r: &ArrayView2<f64>,
    gamma: f64,
) -> Array2<f64> {
    let (n_x, n_y) = cost.dim();
    // e[(i, j)] mirrors r's one-cell border layout.
    let mut e = Array2::<f64>::zeros((n_x + 2, n_y + 2));
    e[(n_x, n_y)] = 1.0;

    // Share of predecessor value `r_p` in the soft minimum feeding successor (si, sj).
    let share = |r_p: f64, si: usize, sj: usize| -> f64 {
        if si > n_x || sj > n_y {
            return 0.0;
        }
        let r_s = r[(si, sj)];
        if !r_s.is_finite() {
            return 0.0;
        }
        ((r_s - cost[(si - 1, sj - 1)] - r_p) / gamma).exp()
    };

    for i in (1..=n_x).rev() {
        for j in (1..=n_y).rev() {
            if i == n_x && j == n_y {
                continue;
            }
            let r_p = r[(i, j)];
            if !r_p.is_finite() {
                continue;
            }
            e[(i, j)] = e[(i + 1, j)] * share(r_p, i + 1, j)
                + e[(i, j + 1)] * share(r_p, i, j + 1)
                + e[(i + 1, j + 1)] * share(r_p, i + 1, j + 1);
        }
    }

    e.slice(ndarray::s![1..=n_x, 1..=n_y]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_softmin_equal_arguments() {
        assert_relative_eq!(softmin(2.0, 2.0, 2.0, 0.5), 2.0 - 0.5 * 3.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_softmin_below_hard_min() {
        let s = softmin(1.0, 2.0, 3.0, 1.0);
        assert!(s < 1.0);
        // Small gamma approaches the hard minimum.
        assert_relative_eq!(softmin(1.0, 2.0, 3.0, 1e-3), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_softmin_infinite() {
        assert_eq!(softmin(f64::INFINITY, f64::INFINITY, f64::INFINITY, 1.0), f64::INFINITY);
        assert_relative_eq!(softmin(f64::INFINITY, 4.0, f64::INFINITY, 1.0), 4.0);
    }

    #[test]
    fn test_softmin_no_overflow() {
        let s = softmin(-1e6, -1e6 + 1.0, 1e6, 1e-3);
        assert!(s.is_finite());
        assert_relative_eq!(s, -1e6, epsilon = 1e-6);
    }

    #[test]
    fn test_accumulate_borders() {
        let cost = array![[1.0, 2.0], [3.0, 4.0]];
        let r = accumulate(&cost.view(), 1.0, None);
        assert_eq!(r.dim(), (3, 3));
        assert_eq!(r[(0, 0)], 0.0);
        assert_eq!(r[(0, 1)], f64::INFINITY);
        assert_eq!(r[(1, 0)], f64::INFINITY);
        // Only the diagonal predecessor of (1, 1) is reachable.
        assert_relative_eq!(r[(1, 1)], 1.0);
        assert_relative_eq!(r[(1, 2)], 2.0 + 1.0);
    }

    #[test]
    fn test_single_cell_alignment() {
        let cost = array![[2.5]];
        let r = accumulate(&cost.view(), 1.0, None);
        assert_relative_eq!(r[(1, 1)], 2.5);
        let e = expected_alignment(&cost.view(), &r.view(), 1.0);
        assert_eq!(e, array![[1.0]]);
    }

    #[test]
    fn test_expected_alignment_corners() {
        let cost = array![[0.0, 5.0, 9.0], [4.0, 1.0, 3.0], [8.0, 2.0, 0.5]];
        let r = accumulate(&cost.view(), 0.7, None);
        let e = expected_alignment(&cost.view(), &r.view(), 0.7);
        // Every path starts at (0, 0) and ends at (n-1, m-1).
        assert_relative_eq!(e[(0, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(e[(2, 2)], 1.0, epsilon = 1e-10);
        assert!(e.iter().all(|&v| (0.0..=1.0 + 1e-10).contains(&v)));
    }

    #[test]
    fn test_expected_alignment_matches_finite_difference() {
        let cost = array![[0.3, 1.1, 2.0, 0.4], [0.9, 0.2, 0.8, 1.5], [1.7, 0.6, 0.1, 0.3]];
        let gamma = 0.8;
        let r = accumulate(&cost.view(), gamma, None);
        let e = expected_alignment(&cost.view(), &r.view(), gamma);
        let eps = 1e-6;
        for i in 0..3 {
            for j in 0..4 {
                let mut plus = cost.clone();
                let mut minus = cost.clone();
                plus[(i, j)] += eps;
                minus[(i, j)] -= eps;
                let fp = accumulate(&plus.view(), gamma, None)[(3, 4)];
                let fm = accumulate(&minus.view(), gamma, None)[(3, 4)];
                assert_relative_eq!(e[(i, j)], (fp - fm) / (2.0 * eps), epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_band_leaves_far_cells_unreachable() {
        let cost = Array2::<f64>::ones((4, 4));
        let r = accumulate(&cost.view(), 1.0, Some(1));
        assert_eq!(r[(1, 3)], f64::INFINITY);
        assert_eq!(r[(4, 1)], f64::INFINITY);
        assert!(r[(4, 4)].is_finite());

        let e = expected_alignment(&cost.view(), &r.view(), 1.0);
        assert_eq!(e[(0, 3)], 0.0);
        assert_relative_eq!(e[(3, 3)], 1.0);
    }
}

use ndarray::{Array2, ArrayView2};

use crate::distance::{PointwiseDistance, cost_matrix};

/// Compute Dynamic Time Warping (DTW) distance and path.
///
/// Classical DTW with a hard minimum over the three predecessors. This is the
/// `gamma -> 0` limit of Soft-DTW and serves as its reference.
///
/// # Arguments
/// * `x` - First sequence (n_features x n_frames_x)
/// * `y` - Second sequence (n_features x n_frames_y)
/// * `metric` - Pointwise distance between frames
///
/// # Returns
/// Tuple of (distance, path) where path is Vec<(i, j)> of aligned frame indices,
/// from (0, 0) to (n_frames_x - 1, n_frames_y - 1)
///
/// # Example
/// ```
/// use siamese_sdtw::distance::SquaredEuclidean;
/// use siamese_sdtw::utils::dtw;
/// use ndarray::Array2;
///
/// let x = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 3.0]).unwrap();
/// let y = Array2::from_shape_vec((1, 4), vec![1.0, 2.0, 2.0, 3.0]).unwrap();
/// let (distance, path) = dtw(x.view(), y.view(), &SquaredEuclidean).unwrap();
/// assert_eq!(distance, 0.0);
/// assert_eq!(path.first(), Some(&(0, 0)));
/// assert_eq!(path.last(), Some(&(2, 3)));
/// ```
pub fn dtw<M: PointwiseDistance + ?Sized>(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    metric: &M,
) -> crate::Result<(f64, Vec<(usize, usize)>)> {
    let cost = cost_matrix(&x, &y, metric)?;
    let (n_x, n_y) = cost.dim();

    // Same bordered layout as the Soft-DTW table: row 0 and column 0 are
    // unreachable except the origin.
    let mut table = Array2::<f64>::from_elem((n_x + 1, n_y + 1), f64::INFINITY);
    table[(0, 0)] = 0.0;
    for i in 1..=n_x {
        for j in 1..=n_y {
            let best = table[(i - 1, j - 1)]
                .min(table[(i - 1, j)])
                .min(table[(i, j - 1)]);
            table[(i, j)] = cost[(i - 1, j - 1)] + best;
        }
    }

    // Walk back from the end cell, preferring the diagonal on ties.
    let mut path = Vec::with_capacity(n_x + n_y);
    let (mut i, mut j) = (n_x, n_y);
    while i > 0 && j > 0 {
        path.push((i - 1, j - 1));
        let diag = table[(i - 1, j - 1)];
        let up = table[(i - 1, j)];
        let left = table[(i, j - 1)];
        if diag <= up && diag <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();

    Ok((table[(n_x, n_y)], path))
}

/// Compute DTW distance only (path discarded).
pub fn dtw_distance<M: PointwiseDistance + ?Sized>(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    metric: &M,
) -> crate::Result<f64> {
    let (distance, _) = dtw(x, y, metric)?;
    Ok(distance)
}

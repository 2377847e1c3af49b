use ndarray::ArrayView2;

/// Validate a single sequence.
///
/// Checks that the sequence satisfies the following conditions:
/// - At least one feature row
/// - At least one timestep (column)
/// - All values are finite (no NaN or Inf)
///
/// # Arguments
/// * `x` - Sequence to validate (n_features x n_frames)
/// * `name` - Name reported in the error
///
/// # Example
/// ```
/// use siamese_sdtw::utils::valid_sequence;
/// use ndarray::Array2;
///
/// let x = Array2::<f64>::zeros((3, 4));
/// assert!(valid_sequence(&x.view(), "x").is_ok());
///
/// let empty = Array2::<f64>::zeros((3, 0));
/// assert!(valid_sequence(&empty.view(), "x").is_err());
/// ```
pub fn valid_sequence(x: &ArrayView2<f64>, name: &'static str) -> crate::Result<()> {
    if x.nrows() == 0 {
        return Err(crate::Error::InvalidParameter {
            name,
            value: format!("{:?}", x.shape()),
            reason: "sequence must have at least one feature".to_string(),
        });
    }

    if x.ncols() == 0 {
        return Err(crate::Error::EmptySequence { name });
    }

    if !x.iter().all(|v| v.is_finite()) {
        return Err(crate::Error::NonFiniteInput { name });
    }

    Ok(())
}

/// Ensure two sequences share the same feature dimension.
pub fn same_features(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> crate::Result<()> {
    if x.nrows() != y.nrows() {
        return Err(crate::Error::ShapeMismatch {
            expected: format!("{} features", x.nrows()),
            got: format!("{} features", y.nrows()),
        });
    }
    Ok(())
}

/// Validate a pair of sequences for alignment.
///
/// Feature dimensions are compared first so that a dimension mismatch is
/// reported even when one side is also empty.
pub fn valid_pair(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> crate::Result<()> {
    same_features(x, y)?;
    valid_sequence(x, "x")?;
    valid_sequence(y, "y")?;
    Ok(())
}

/// Reject a cost matrix with overflowed entries.
///
/// Finite inputs can still produce an infinite pointwise distance (for
/// example squared differences around `1e200`), which would make the DP
/// value infinite and its gradient meaningless.
///
/// # Example
/// ```
/// use siamese_sdtw::utils::finite_cost;
/// use ndarray::array;
///
/// assert!(finite_cost(&array![[0.0, 1.0]].view()).is_ok());
/// assert!(finite_cost(&array![[0.0, f64::INFINITY]].view()).is_err());
/// ```
pub fn finite_cost(cost: &ArrayView2<f64>) -> crate::Result<()> {
    if !cost.iter().all(|v| v.is_finite()) {
        return Err(crate::Error::NonFiniteInput { name: "cost matrix" });
    }
    Ok(())
}

/// Validate a Soft-DTW smoothing factor.
///
/// # Example
/// ```
/// use siamese_sdtw::utils::valid_gamma;
///
/// assert!(valid_gamma(1.0).is_ok());
/// assert!(valid_gamma(0.0).is_err());
/// assert!(valid_gamma(f64::NAN).is_err());
/// ```
pub fn valid_gamma(gamma: f64) -> crate::Result<()> {
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(crate::Error::InvalidGamma { gamma });
    }
    Ok(())
}

/// Check that a Sakoe-Chiba band still reaches the end cell.
///
/// With `|n_x - n_y| > bandwidth` no monotone path can connect `(0, 0)` to
/// `(n_x, n_y)` without leaving the band.
pub fn valid_bandwidth(bandwidth: Option<usize>, n_x: usize, n_y: usize) -> crate::Result<()> {
    if let Some(band) = bandwidth {
        let gap = n_x.abs_diff(n_y);
        if gap > band {
            return Err(crate::Error::InvalidParameter {
                name: "bandwidth",
                value: band.to_string(),
                reason: format!("must be >= |{n_x} - {n_y}| = {gap} to reach the end cell"),
            });
        }
    }
    Ok(())
}

/// Ensure a float parameter is finite and strictly positive.
pub fn positive_finite(value: f64, name: &'static str) -> crate::Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(crate::Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: "must be finite and > 0".to_string(),
        });
    }
    Ok(())
}

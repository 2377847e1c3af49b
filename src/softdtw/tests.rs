use super::*;
use crate::distance::{Cosine, Manhattan, Metric};
use approx::assert_relative_eq;
use ndarray::{Array2, array};

fn ramp(n_features: usize, n_frames: usize, offset: f64) -> Array2<f64> {
    Array2::from_shape_fn((n_features, n_frames), |(k, t)| {
        ((t as f64) * 0.4 + k as f64).sin() + offset
    })
}

/// Central finite-difference gradient of `f` with respect to every entry of `x`.
fn numeric_grad<F: Fn(&Array2<f64>) -> f64>(x: &Array2<f64>, f: F) -> Array2<f64> {
    let eps = 1e-6;
    let mut g = Array2::zeros(x.raw_dim());
    for idx in 0..x.len() {
        let (k, t) = (idx / x.ncols(), idx % x.ncols());
        let mut plus = x.clone();
        let mut minus = x.clone();
        plus[(k, t)] += eps;
        minus[(k, t)] -= eps;
        g[(k, t)] = (f(&plus) - f(&minus)) / (2.0 * eps);
    }
    g
}

fn assert_grad_close(analytic: &Array2<f64>, numeric: &Array2<f64>) {
    for (a, n) in analytic.iter().zip(numeric.iter()) {
        let tol = 1e-3 * n.abs().max(1.0);
        assert!((a - n).abs() <= tol, "analytic {a} vs numeric {n}");
    }
}

#[test]
fn test_config_requires_positive_gamma() {
    assert!(SoftDtwConfig::new(1.0).is_ok());
    for gamma in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = SoftDtwConfig::new(gamma).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidGamma { .. }));
    }
}

#[test]
fn test_mutated_config_rejected_at_call_time() {
    let mut config = SoftDtwConfig::new(1.0).unwrap();
    config.gamma = 0.0;
    assert!(SoftDtw::with_metric(config, SquaredEuclidean).is_err());
}

#[test]
fn test_single_frame_is_pointwise_distance() {
    let x = array![[1.0], [2.0]];
    let y = array![[4.0], [6.0]];
    let sdtw = SoftDtw::new(1.0).unwrap();
    assert_relative_eq!(sdtw.distance(x.view(), y.view()).unwrap(), 25.0);
}

#[test]
fn test_two_by_two_closed_form() {
    // With one feature and cost c_ij = (x_i - y_j)^2 the 2x2 table has
    // R11 = c00, R12 = c01 + c00, R21 = c10 + c00, R22 = c11 + softmin(R11, R12, R21).
    let x = array![[0.0, 1.0]];
    let y = array![[0.0, 2.0]];
    let gamma = 1.0;
    let (c00, c01, c10, c11) = (0.0, 4.0, 1.0, 1.0);
    let expected = c11 + softmin(c00, c01 + c00, c10 + c00, gamma);

    let sdtw = SoftDtw::new(gamma).unwrap();
    assert_relative_eq!(sdtw.distance(x.view(), y.view()).unwrap(), expected, epsilon = 1e-12);
}

#[test]
fn test_align_exposes_tables() {
    let x = ramp(2, 5, 0.0);
    let y = ramp(2, 3, 0.5);
    let sdtw = SoftDtw::new(1.0).unwrap();
    let alignment = sdtw.align(x.view(), y.view()).unwrap();

    assert_eq!(alignment.cost().shape(), &[5, 3]);
    assert_eq!(alignment.table().shape(), &[6, 4]);
    assert_eq!(alignment.table()[(0, 0)], 0.0);
    assert_eq!(alignment.table()[(0, 2)], f64::INFINITY);
    assert_eq!(alignment.table()[(3, 0)], f64::INFINITY);
    assert_eq!(alignment.expected_alignment().shape(), &[5, 3]);
    assert_relative_eq!(alignment.value(), sdtw.distance(x.view(), y.view()).unwrap());
}

#[test]
fn test_gradient_matches_finite_difference() {
    let x = ramp(3, 6, 0.0);
    let y = ramp(3, 4, 0.3).mapv(|v| v * 0.8);
    let sdtw = SoftDtw::new(1.0).unwrap();
    let out = sdtw.value_and_grad(x.view(), y.view()).unwrap();

    let num_x = numeric_grad(&x, |xp| sdtw.distance(xp.view(), y.view()).unwrap());
    let num_y = numeric_grad(&y, |yp| sdtw.distance(x.view(), yp.view()).unwrap());
    assert_grad_close(&out.grad_x, &num_x);
    assert_grad_close(&out.grad_y, &num_y);
}

#[test]
fn test_gradient_small_gamma() {
    let x = ramp(2, 4, 0.0);
    let y = ramp(2, 5, 1.0);
    let sdtw = SoftDtw::new(0.1).unwrap();
    let out = sdtw.value_and_grad(x.view(), y.view()).unwrap();
    let num_x = numeric_grad(&x, |xp| sdtw.distance(xp.view(), y.view()).unwrap());
    assert_grad_close(&out.grad_x, &num_x);
}

#[test]
fn test_gradient_cosine_metric() {
    let x = ramp(3, 4, 0.2);
    let y = ramp(3, 3, -0.4);
    let config = SoftDtwConfig::new(0.5).unwrap();
    let sdtw = SoftDtw::with_metric(config, Cosine).unwrap();
    let out = sdtw.value_and_grad(x.view(), y.view()).unwrap();
    let num_x = numeric_grad(&x, |xp| sdtw.distance(xp.view(), y.view()).unwrap());
    assert_grad_close(&out.grad_x, &num_x);
}

#[test]
fn test_normalized_divergence() {
    let x = ramp(2, 6, 0.0);
    let y = ramp(2, 4, 0.7);
    let config = SoftDtwConfig::new(1.0).unwrap().with_normalize(true);
    let sdtw = SoftDtw::with_metric(config, SquaredEuclidean).unwrap();

    // The divergence of a sequence with itself is exactly zero.
    assert_relative_eq!(sdtw.distance(x.view(), x.view()).unwrap(), 0.0, epsilon = 1e-10);

    let raw = SoftDtw::new(1.0).unwrap();
    let expected = raw.distance(x.view(), y.view()).unwrap()
        - 0.5
            * (raw.distance(x.view(), x.view()).unwrap()
                + raw.distance(y.view(), y.view()).unwrap());
    assert_relative_eq!(sdtw.distance(x.view(), y.view()).unwrap(), expected, epsilon = 1e-10);

    let out = sdtw.value_and_grad(x.view(), y.view()).unwrap();
    let num_x = numeric_grad(&x, |xp| sdtw.distance(xp.view(), y.view()).unwrap());
    let num_y = numeric_grad(&y, |yp| sdtw.distance(x.view(), yp.view()).unwrap());
    assert_grad_close(&out.grad_x, &num_x);
    assert_grad_close(&out.grad_y, &num_y);
}

#[test]
fn test_band_restricts_alignment() {
    let x = ramp(1, 8, 0.0);
    let y = ramp(1, 8, 0.0).mapv(|v| v * 1.5);
    let full = SoftDtw::new(1.0).unwrap();
    let banded =
        SoftDtw::with_metric(SoftDtwConfig::new(1.0).unwrap().with_bandwidth(1), SquaredEuclidean)
            .unwrap();

    let d_full = full.distance(x.view(), y.view()).unwrap();
    let d_band = banded.distance(x.view(), y.view()).unwrap();
    // Pruning paths removes terms from every soft minimum.
    assert!(d_band >= d_full - 1e-12);

    let out = banded.value_and_grad(x.view(), y.view()).unwrap();
    let num_x = numeric_grad(&x, |xp| banded.distance(xp.view(), y.view()).unwrap());
    assert_grad_close(&out.grad_x, &num_x);
}

#[test]
fn test_band_too_narrow_for_lengths() {
    let x = ramp(1, 8, 0.0);
    let y = ramp(1, 4, 0.0);
    let banded =
        SoftDtw::with_metric(SoftDtwConfig::new(1.0).unwrap().with_bandwidth(2), SquaredEuclidean)
            .unwrap();
    let err = banded.distance(x.view(), y.view()).unwrap_err();
    assert!(matches!(err, crate::Error::InvalidParameter { name: "bandwidth", .. }));
}

#[test]
fn test_errors_before_computation() {
    let sdtw = SoftDtw::new(1.0).unwrap();
    let a = Array2::<f64>::zeros((7, 4));
    let b = Array2::<f64>::zeros((5, 4));
    assert!(matches!(
        sdtw.value_and_grad(a.view(), b.view()).unwrap_err(),
        crate::Error::ShapeMismatch { .. }
    ));

    let empty = Array2::<f64>::zeros((7, 0));
    assert!(matches!(
        sdtw.distance(a.view(), empty.view()).unwrap_err(),
        crate::Error::EmptySequence { name: "y" }
    ));

    let mut nan = Array2::<f64>::zeros((7, 3));
    nan[(2, 1)] = f64::NAN;
    assert!(matches!(
        sdtw.distance(nan.view(), a.view()).unwrap_err(),
        crate::Error::NonFiniteInput { name: "x" }
    ));
}

#[test]
fn test_batch_matches_single_pairs() {
    let a = ramp(2, 5, 0.0);
    let b = ramp(2, 7, 0.2);
    let c = ramp(2, 3, -1.0);
    let sdtw = SoftDtw::new(1.0).unwrap();
    let pairs = [
        SequencePair::new(a.view(), b.view()),
        SequencePair::new(b.view(), c.view()),
        SequencePair::new(c.view(), a.view()),
    ];

    let values = sdtw.distance_batch(&pairs).unwrap();
    let grads = sdtw.value_and_grad_batch(&pairs).unwrap();
    for (k, pair) in pairs.iter().enumerate() {
        let single = sdtw.value_and_grad(pair.x, pair.y).unwrap();
        assert_relative_eq!(values[k], single.value);
        assert_eq!(grads[k], single);
    }
}

#[test]
fn test_batch_rejects_mixed_feature_dimensions() {
    let a = ramp(2, 5, 0.0);
    let b = ramp(3, 5, 0.0);
    let sdtw = SoftDtw::new(1.0).unwrap();
    let pairs = [
        SequencePair::new(a.view(), a.view()),
        SequencePair::new(b.view(), b.view()),
    ];
    assert!(matches!(
        sdtw.distance_batch(&pairs).unwrap_err(),
        crate::Error::ShapeMismatch { .. }
    ));
    assert!(sdtw.distance_batch(&[]).unwrap().is_empty());
}

#[test]
fn test_pairwise_matrix() {
    let xs = [ramp(1, 4, 0.0), ramp(1, 6, 2.0)];
    let ys = [ramp(1, 5, 0.0), ramp(1, 3, 2.0), ramp(1, 4, -3.0)];
    let x_views: Vec<_> = xs.iter().map(|x| x.view()).collect();
    let y_views: Vec<_> = ys.iter().map(|y| y.view()).collect();

    let sdtw = SoftDtw::with_metric(SoftDtwConfig::new(1.0).unwrap(), Metric::Manhattan).unwrap();
    let matrix = sdtw.pairwise(&x_views, &y_views).unwrap();
    assert_eq!(matrix.shape(), &[2, 3]);
    for i in 0..2 {
        for j in 0..3 {
            assert_relative_eq!(
                matrix[(i, j)],
                sdtw.distance(x_views[i], y_views[j]).unwrap()
            );
        }
    }
}

#[test]
fn test_pairwise_views_with_unrelated_lifetimes() {
    let long_lived = ramp(2, 5, 0.0);
    let xs = [long_lived.view()];
    let sdtw = SoftDtw::new(1.0).unwrap();
    let matrix = {
        let short_lived = ramp(2, 3, 3.0);
        let ys = [short_lived.view(), long_lived.view()];
        sdtw.pairwise(&xs, &ys).unwrap()
    };
    assert_eq!(matrix.shape(), &[1, 2]);
    assert!(matrix[(0, 0)] > matrix[(0, 1)]);
}

#[test]
fn test_manhattan_engine() {
    let x = array![[0.0, 1.0, 2.0]];
    let y = array![[0.0, 1.0, 2.0]];
    let sdtw = SoftDtw::with_metric(SoftDtwConfig::new(0.01).unwrap(), Manhattan).unwrap();
    // Identical sequences: the diagonal path costs zero, soft minimum only subtracts.
    assert!(sdtw.distance(x.view(), y.view()).unwrap() <= 1e-9);
}

//! Soft-DTW Alignment Example
//!
//! Compares classical DTW with Soft-DTW at several smoothing factors and
//! shows the expected alignment matrix.

use log::info;
use ndarray::Array2;
use siamese_sdtw::distance::{Metric, SquaredEuclidean};
use siamese_sdtw::softdtw::{SoftDtw, SoftDtwConfig};
use siamese_sdtw::utils::dtw;

fn main() -> siamese_sdtw::Result<()> {
    env_logger::init();
    info!("Soft-DTW Alignment Example");

    // Two similar but time-warped sequences
    let x = Array2::from_shape_fn((1, 50), |(_, t)| (t as f64 * 0.2).sin());
    let y = Array2::from_shape_fn((1, 40), |(_, t)| (t as f64 * 0.25).sin());

    info!("Sequence X: {} frames", x.ncols());
    info!("Sequence Y: {} frames", y.ncols());

    // Classical DTW
    let (distance, path) = dtw(x.view(), y.view(), &SquaredEuclidean)?;
    info!("DTW distance: {:.4}", distance);
    info!("Warp path length: {} points", path.len());

    // Soft-DTW approaches DTW from below as gamma shrinks
    for gamma in [10.0, 1.0, 0.1, 0.01] {
        let value = SoftDtw::new(gamma)?.distance(x.view(), y.view())?;
        info!("  gamma={:<5} soft-DTW={:.4}", gamma, value);
    }

    // Expected alignment: soft version of the warp path
    let alignment = SoftDtw::new(0.1)?.align(x.view(), y.view())?;
    let e = alignment.expected_alignment();
    info!("\nExpected alignment along the hard path (first 10 points):");
    for &(i, j) in path.iter().take(10) {
        info!("  X[{}] -> Y[{}]: E={:.3}", i, j, e[(i, j)]);
    }

    // Gradient with respect to X
    let out = SoftDtw::new(1.0)?.value_and_grad(x.view(), y.view())?;
    let norm = out.grad_x.iter().map(|g| g * g).sum::<f64>().sqrt();
    info!("\n|d sdtw / dX| = {:.4}", norm);

    // Divergence and metrics
    info!("\nSoft-DTW divergence (gamma=1) per metric:");
    for metric in [Metric::SquaredEuclidean, Metric::Manhattan, Metric::Cosine] {
        let config = SoftDtwConfig::new(1.0)?.with_normalize(true);
        let value = SoftDtw::with_metric(config, metric)?.distance(x.view(), y.view())?;
        info!("  {:?}: {:.4}", metric, value);
    }

    Ok(())
}

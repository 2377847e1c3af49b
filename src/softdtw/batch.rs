//! Batched Soft-DTW over independent sequence pairs.
//!
//! Pairs share a feature dimension but not their lengths. Each pair is an
//! independent unit of work, so with the `parallel` feature they are spread
//! over rayon workers.

use ndarray::{Array2, ArrayView2};

use super::{SoftDtw, SoftDtwGradient};
use crate::distance::PointwiseDistance;

/// Two sequences to compare, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct SequencePair<'a> {
    pub x: ArrayView2<'a, f64>,
    pub y: ArrayView2<'a, f64>,
}

impl<'a> SequencePair<'a> {
    pub fn new(x: ArrayView2<'a, f64>, y: ArrayView2<'a, f64>) -> Self {
        Self { x, y }
    }
}

impl<M: PointwiseDistance> SoftDtw<M> {
    /// Validate a whole batch before any pair is computed.
    ///
    /// All pairs must share the feature dimension of the first pair.
    pub fn check_batch(&self, pairs: &[SequencePair<'_>]) -> crate::Result<()> {
        self.config.validate()?;
        let Some(first) = pairs.first() else {
            return Ok(());
        };
        let n_features = first.x.nrows();
        for pair in pairs {
            if pair.x.nrows() != n_features {
                return Err(crate::Error::ShapeMismatch {
                    expected: format!("{n_features} features"),
                    got: format!("{} features", pair.x.nrows()),
                });
            }
            self.check_pair(&pair.x, &pair.y)?;
        }
        Ok(())
    }

    fn map_pairs<T, F>(&self, pairs: &[SequencePair<'_>], f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&SequencePair<'_>) -> T + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            pairs.par_iter().map(f).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            pairs.iter().map(f).collect()
        }
    }

    /// Soft-DTW value for every pair, in input order.
    ///
    /// Shapes are checked for the whole batch up front. A pair whose cost
    /// matrix overflows still fails the batch with `NonFiniteInput`.
    ///
    /// # Example
    /// ```
    /// use siamese_sdtw::softdtw::{SequencePair, SoftDtw};
    /// use ndarray::array;
    ///
    /// let a = array![[0.0, 1.0, 2.0]];
    /// let b = array![[0.0, 2.0]];
    /// let c = array![[5.0, 5.0, 5.0, 5.0]];
    ///
    /// let sdtw = SoftDtw::new(0.5).unwrap();
    /// let pairs = [SequencePair::new(a.view(), b.view()), SequencePair::new(a.view(), c.view())];
    /// let values = sdtw.distance_batch(&pairs).unwrap();
    /// assert_eq!(values.len(), 2);
    /// assert!(values[0] < values[1]);
    /// ```
    pub fn distance_batch(&self, pairs: &[SequencePair<'_>]) -> crate::Result<Vec<f64>> {
        self.check_batch(pairs)?;
        log::debug!("soft-dtw batch of {} pairs", pairs.len());
        self.map_pairs(pairs, |pair| self.distance_unchecked(&pair.x, &pair.y))
            .into_iter()
            .collect()
    }

    /// Values and gradients for every pair, in input order.
    pub fn value_and_grad_batch(
        &self,
        pairs: &[SequencePair<'_>],
    ) -> crate::Result<Vec<SoftDtwGradient>> {
        self.check_batch(pairs)?;
        log::debug!("soft-dtw value+grad batch of {} pairs", pairs.len());
        self.map_pairs(pairs, |pair| self.value_and_grad_unchecked(&pair.x, &pair.y))
            .into_iter()
            .collect()
    }

    /// Distance matrix between two collections of sequences.
    ///
    /// # Returns
    /// Matrix of shape (xs.len(), ys.len())
    pub fn pairwise(
        &self,
        xs: &[ArrayView2<'_, f64>],
        ys: &[ArrayView2<'_, f64>],
    ) -> crate::Result<Array2<f64>> {
        let n_y = ys.len();
        // Reborrow so views from both slices share one lifetime.
        let pairs: Vec<SequencePair<'_>> = xs
            .iter()
            .flat_map(|x| ys.iter().map(move |y| SequencePair::new(x.view(), y.view())))
            .collect();
        let values = self.distance_batch(&pairs)?;

        let mut out = Array2::<f64>::zeros((xs.len(), n_y));
        for (k, value) in values.into_iter().enumerate() {
            out[(k / n_y, k % n_y)] = value;
        }
        Ok(out)
    }
}

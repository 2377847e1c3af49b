//! k-nearest-neighbour classification under Soft-DTW.
//!
//! Used to evaluate learned embeddings: encode the labelled pools, then
//! classify each test sequence by majority vote among its `k` nearest
//! training sequences.

use std::collections::BTreeMap;

use ndarray::{ArrayView1, ArrayView2};

use crate::distance::{PointwiseDistance, SquaredEuclidean};
use crate::encoder::Encoder;
use crate::sampling::LabeledPool;
use crate::softdtw::SoftDtw;

/// Encode every sequence of `pool`, keeping labels.
pub fn embed_pool<E: Encoder + ?Sized>(encoder: &E, pool: &LabeledPool) -> crate::Result<LabeledPool> {
    let mut embedded = Vec::with_capacity(pool.len());
    for (seq, _) in pool.iter() {
        embedded.push(encoder.encode(seq)?);
    }
    LabeledPool::new(embedded, pool.labels().to_vec())
}

fn no_neighbours() -> crate::Error {
    crate::Error::InvalidParameter {
        name: "train",
        value: "0 sequences".to_string(),
        reason: "k-NN needs at least one training sequence".to_string(),
    }
}

/// Majority vote among the `k` smallest distances.
///
/// Ties on the vote count go to the label with the smaller summed distance,
/// then to the smaller label.
fn vote(distances: ArrayView1<f64>, labels: &[usize], k: usize) -> Option<usize> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

    let mut tally: BTreeMap<usize, (usize, f64)> = BTreeMap::new();
    for &i in order.iter().take(k) {
        let entry = tally.entry(labels[i]).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += distances[i];
    }

    tally
        .into_iter()
        .min_by(|(la, (ca, sa)), (lb, (cb, sb))| {
            cb.cmp(ca)
                .then_with(|| sa.total_cmp(sb))
                .then_with(|| la.cmp(lb))
        })
        .map(|(label, _)| label)
}

/// k-NN classifier using a Soft-DTW engine as the distance.
///
/// # Example
/// ```
/// use siamese_sdtw::knn::KnnClassifier;
/// use siamese_sdtw::sampling::LabeledPool;
/// use siamese_sdtw::softdtw::SoftDtw;
/// use ndarray::{Array2, array};
///
/// let train = LabeledPool::new(
///     vec![Array2::zeros((1, 4)), Array2::from_elem((1, 5), 3.0)],
///     vec![0, 1],
/// )
/// .unwrap();
/// let knn = KnnClassifier::new(1, SoftDtw::new(0.5).unwrap()).unwrap();
/// let query = array![[2.8, 3.1, 2.9]];
/// assert_eq!(knn.predict(&train, query.view()).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KnnClassifier<M = SquaredEuclidean> {
    k: usize,
    engine: SoftDtw<M>,
}

impl<M: PointwiseDistance> KnnClassifier<M> {
    pub fn new(k: usize, engine: SoftDtw<M>) -> crate::Result<Self> {
        if k == 0 {
            return Err(crate::Error::InvalidParameter {
                name: "k",
                value: k.to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(Self { k, engine })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn check_train(train: &LabeledPool) -> crate::Result<()> {
        if train.is_empty() {
            return Err(no_neighbours());
        }
        Ok(())
    }

    /// Predicted label for one query. `k` larger than the pool is clamped.
    pub fn predict(&self, train: &LabeledPool, query: ArrayView2<f64>) -> crate::Result<usize> {
        let predictions = self.predict_batch(train, &[query])?;
        predictions
            .into_iter()
            .next()
            .ok_or_else(no_neighbours)
    }

    /// Predicted labels for many queries, in order.
    pub fn predict_batch(
        &self,
        train: &LabeledPool,
        queries: &[ArrayView2<'_, f64>],
    ) -> crate::Result<Vec<usize>> {
        Self::check_train(train)?;
        let distances = self.engine.pairwise(queries, &train.views())?;
        let k = self.k.min(train.len());
        distances
            .rows()
            .into_iter()
            .map(|row| vote(row, train.labels(), k).ok_or_else(no_neighbours))
            .collect()
    }

    /// Fraction of `test` sequences whose predicted label matches.
    pub fn accuracy(&self, train: &LabeledPool, test: &LabeledPool) -> crate::Result<f64> {
        if test.is_empty() {
            return Err(crate::Error::InvalidParameter {
                name: "test",
                value: "0 sequences".to_string(),
                reason: "accuracy needs at least one test sequence".to_string(),
            });
        }
        let predictions = self.predict_batch(train, &test.views())?;
        let correct = predictions
            .iter()
            .zip(test.labels())
            .filter(|(p, l)| p == l)
            .count();
        let accuracy = correct as f64 / test.len() as f64;
        log::info!(
            "{}-NN accuracy: {}/{} = {:.3}",
            self.k,
            correct,
            test.len(),
            accuracy
        );
        Ok(accuracy)
    }
}

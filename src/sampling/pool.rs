use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use super::{Relation, SelfPairPolicy};

/// Labelled sequences sharing one feature dimension.
///
/// # Example
/// ```
/// use siamese_sdtw::sampling::LabeledPool;
/// use ndarray::Array2;
///
/// let sequences = vec![Array2::<f64>::zeros((3, 10)); 4];
/// let pool = LabeledPool::new(sequences, vec![0, 0, 1, 2]).unwrap();
/// assert_eq!(pool.len(), 4);
/// assert_eq!(pool.classes(), vec![0, 1, 2]);
/// assert_eq!(pool.indices_with_label(0), &[0, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct LabeledPool {
    sequences: Vec<Array2<f64>>,
    labels: Vec<usize>,
    by_label: BTreeMap<usize, Vec<usize>>,
    n_features: usize,
}

impl LabeledPool {
    /// Build a pool from parallel vectors of sequences and labels.
    ///
    /// # Errors
    /// `InvalidParameter` if the vectors differ in length, `EmptySequence` or
    /// `NonFiniteInput` for an invalid sequence, `ShapeMismatch` if the
    /// sequences disagree on feature dimension.
    pub fn new(sequences: Vec<Array2<f64>>, labels: Vec<usize>) -> crate::Result<Self> {
        if sequences.len() != labels.len() {
            return Err(crate::Error::InvalidParameter {
                name: "labels",
                value: labels.len().to_string(),
                reason: format!("expected one label per sequence ({})", sequences.len()),
            });
        }

        let n_features = sequences.first().map_or(0, |s| s.nrows());
        let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, (seq, &label)) in sequences.iter().zip(labels.iter()).enumerate() {
            crate::utils::valid_sequence(&seq.view(), "pool sequence")?;
            if seq.nrows() != n_features {
                return Err(crate::Error::ShapeMismatch {
                    expected: format!("{n_features} features"),
                    got: format!("{} features at index {i}", seq.nrows()),
                });
            }
            by_label.entry(label).or_default().push(i);
        }

        log::debug!(
            "labelled pool: {} sequences, {} classes, {} features",
            sequences.len(),
            by_label.len(),
            n_features
        );

        Ok(Self {
            sequences,
            labels,
            by_label,
            n_features,
        })
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Shared feature dimension (0 for an empty pool).
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn check_index(&self, index: usize) -> crate::Result<()> {
        if index >= self.len() {
            return Err(crate::Error::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Sequence and label at `index`.
    pub fn get(&self, index: usize) -> crate::Result<(ArrayView2<'_, f64>, usize)> {
        self.check_index(index)?;
        Ok((self.sequences[index].view(), self.labels[index]))
    }

    pub fn sequence(&self, index: usize) -> crate::Result<ArrayView2<'_, f64>> {
        self.check_index(index)?;
        Ok(self.sequences[index].view())
    }

    pub fn label(&self, index: usize) -> crate::Result<usize> {
        self.check_index(index)?;
        Ok(self.labels[index])
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Distinct labels in ascending order.
    pub fn classes(&self) -> Vec<usize> {
        self.by_label.keys().copied().collect()
    }

    /// Indices carrying `label`, ascending. Empty if the label is unknown.
    pub fn indices_with_label(&self, label: usize) -> &[usize] {
        self.by_label
            .get(&label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Views of every sequence, in index order.
    pub fn views(&self) -> Vec<ArrayView2<'_, f64>> {
        self.sequences.iter().map(|s| s.view()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArrayView2<'_, f64>, usize)> {
        self.sequences
            .iter()
            .zip(self.labels.iter())
            .map(|(s, &l)| (s.view(), l))
    }

    /// Every valid partner index for `anchor` under `relation`, ascending.
    ///
    /// # Example
    /// ```
    /// use siamese_sdtw::sampling::{LabeledPool, Relation, SelfPairPolicy};
    /// use ndarray::Array2;
    ///
    /// let pool = LabeledPool::new(vec![Array2::<f64>::ones((1, 2)); 5], vec![0, 0, 1, 1, 1]).unwrap();
    /// let pos = pool.candidates(0, Relation::Positive, SelfPairPolicy::Allow).unwrap();
    /// assert_eq!(pos, vec![0, 1]);
    /// let neg = pool.candidates(0, Relation::Negative, SelfPairPolicy::Allow).unwrap();
    /// assert_eq!(neg, vec![2, 3, 4]);
    /// ```
    pub fn candidates(
        &self,
        anchor: usize,
        relation: Relation,
        policy: SelfPairPolicy,
    ) -> crate::Result<Vec<usize>> {
        let label = self.label(anchor)?;
        let candidates = match relation {
            Relation::Positive => self
                .indices_with_label(label)
                .iter()
                .copied()
                .filter(|&i| policy == SelfPairPolicy::Allow || i != anchor)
                .collect(),
            Relation::Negative => {
                let mut out: Vec<usize> = self
                    .by_label
                    .iter()
                    .filter(|&(&l, _)| l != label)
                    .flat_map(|(_, indices)| indices.iter().copied())
                    .collect();
                out.sort_unstable();
                out
            }
        };
        Ok(candidates)
    }
}

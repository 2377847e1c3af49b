//! Linear probe on frozen embeddings.
//!
//! The second downstream evaluation next to [`crate::knn`]: each embedded
//! sequence is mean-pooled over time, and a softmax regression is trained on
//! the pooled vectors while the encoder stays frozen. Build the pools with
//! [`crate::knn::embed_pool`].
//!
//! # Example
//! ```
//! use siamese_sdtw::encoder::LinearEncoder;
//! use siamese_sdtw::knn::embed_pool;
//! use siamese_sdtw::probe::LinearProbe;
//! use siamese_sdtw::sampling::LabeledPool;
//! use ndarray::Array2;
//!
//! let pool = LabeledPool::new(
//!     vec![Array2::zeros((2, 5)), Array2::from_elem((2, 4), 3.0)],
//!     vec![0, 1],
//! )
//! .unwrap();
//! let embedded = embed_pool(&LinearEncoder::identity(2), &pool).unwrap();
//! let probe = LinearProbe::fit(&embedded, 200, 0.1).unwrap();
//! assert_eq!(probe.accuracy(&embedded).unwrap(), 1.0);
//! ```

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::sampling::LabeledPool;

/// Mean of a sequence over its frames, shape `(n_features,)`.
pub fn mean_pool(x: ArrayView2<f64>) -> crate::Result<Array1<f64>> {
    crate::utils::valid_sequence(&x, "sequence")?;
    Ok(x.sum_axis(Axis(1)) / x.ncols() as f64)
}

/// Pooled features of every sequence in `pool`, shape `(len, n_features)`.
fn pooled_features(pool: &LabeledPool) -> crate::Result<Array2<f64>> {
    let mut features = Array2::<f64>::zeros((pool.len(), pool.n_features()));
    for (mut row, (seq, _)) in features.rows_mut().into_iter().zip(pool.iter()) {
        row.assign(&mean_pool(seq)?);
    }
    Ok(features)
}

/// In-place softmax of each row, shifted by the row maximum.
fn softmax_rows(logits: &mut Array2<f64>) {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
}

/// Softmax regression over the classes seen at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProbe {
    /// Shape `(n_classes, n_features)`.
    weight: Array2<f64>,
    bias: Array1<f64>,
    /// Class labels, ascending; row `c` of `weight` scores `classes[c]`.
    classes: Vec<usize>,
}

impl LinearProbe {
    /// Train by full-batch gradient descent on the mean cross-entropy,
    /// starting from zero weights.
    ///
    /// # Errors
    /// `InvalidParameter` for an empty pool, zero epochs or a learning rate
    /// that is not finite and positive.
    pub fn fit(train: &LabeledPool, epochs: usize, learning_rate: f64) -> crate::Result<Self> {
        if train.is_empty() {
            return Err(crate::Error::InvalidParameter {
                name: "train",
                value: "0 sequences".to_string(),
                reason: "linear probe needs at least one training sequence".to_string(),
            });
        }
        if epochs == 0 {
            return Err(crate::Error::InvalidParameter {
                name: "epochs",
                value: epochs.to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        crate::utils::positive_finite(learning_rate, "learning_rate")?;

        let features = pooled_features(train)?;
        let classes = train.classes();
        let mut probe = Self {
            weight: Array2::zeros((classes.len(), train.n_features())),
            bias: Array1::zeros(classes.len()),
            classes,
        };
        let targets = probe.targets(train)?;
        let n = train.len() as f64;

        for epoch in 0..epochs {
            let mut grad = probe.probabilities(features.view());
            let loss = targets
                .iter()
                .enumerate()
                .map(|(i, &t)| -grad[(i, t)].max(f64::MIN_POSITIVE).ln())
                .sum::<f64>()
                / n;
            for (i, &t) in targets.iter().enumerate() {
                grad[(i, t)] -= 1.0;
            }
            grad /= n;

            probe.weight.scaled_add(-learning_rate, &grad.t().dot(&features));
            probe.bias.scaled_add(-learning_rate, &grad.sum_axis(Axis(0)));
            log::debug!("probe epoch {}: cross-entropy {:.4}", epoch + 1, loss);
        }

        log::info!(
            "linear probe: {} classes, {} features, {} epochs",
            probe.classes.len(),
            probe.n_features(),
            epochs
        );
        Ok(probe)
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Row index into `classes` for every label of `pool`.
    fn targets(&self, pool: &LabeledPool) -> crate::Result<Vec<usize>> {
        pool.labels()
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .map_err(|_| crate::Error::InvalidParameter {
                        name: "label",
                        value: label.to_string(),
                        reason: "label was not seen when fitting the probe".to_string(),
                    })
            })
            .collect()
    }

    /// Class probabilities for each row of pooled `features`.
    fn probabilities(&self, features: ArrayView2<f64>) -> Array2<f64> {
        let mut logits = features.dot(&self.weight.t()) + &self.bias;
        softmax_rows(&mut logits);
        logits
    }

    fn check_features(&self, n_features: usize) -> crate::Result<()> {
        if n_features != self.n_features() {
            return Err(crate::Error::ShapeMismatch {
                expected: format!("{} features", self.n_features()),
                got: format!("{n_features} features"),
            });
        }
        Ok(())
    }

    /// Class probabilities for one embedded sequence, ordered as [`LinearProbe::classes`].
    pub fn predict_proba(&self, query: ArrayView2<f64>) -> crate::Result<Array1<f64>> {
        self.check_features(query.nrows())?;
        let pooled = mean_pool(query)?;
        let features = pooled.view().insert_axis(Axis(0));
        Ok(self.probabilities(features).row(0).to_owned())
    }

    /// Most probable label for one embedded sequence.
    pub fn predict(&self, query: ArrayView2<f64>) -> crate::Result<usize> {
        let proba = self.predict_proba(query)?;
        Ok(self.classes[argmax(proba.view())])
    }

    fn check_pool(&self, pool: &LabeledPool, name: &'static str) -> crate::Result<()> {
        if pool.is_empty() {
            return Err(crate::Error::InvalidParameter {
                name,
                value: "0 sequences".to_string(),
                reason: "needs at least one sequence".to_string(),
            });
        }
        self.check_features(pool.n_features())
    }

    /// Mean cross-entropy over `pool`. Every label must be known to the probe.
    pub fn loss(&self, pool: &LabeledPool) -> crate::Result<f64> {
        self.check_pool(pool, "pool")?;
        let targets = self.targets(pool)?;
        let probs = self.probabilities(pooled_features(pool)?.view());
        let total: f64 = targets
            .iter()
            .enumerate()
            .map(|(i, &t)| -probs[(i, t)].max(f64::MIN_POSITIVE).ln())
            .sum();
        Ok(total / pool.len() as f64)
    }

    /// Fraction of `test` sequences whose predicted label matches.
    pub fn accuracy(&self, test: &LabeledPool) -> crate::Result<f64> {
        self.check_pool(test, "test")?;
        let probs = self.probabilities(pooled_features(test)?.view());
        let correct = probs
            .rows()
            .into_iter()
            .zip(test.labels())
            .filter(|(row, label)| self.classes[argmax(row.view())] == **label)
            .count();
        let accuracy = correct as f64 / test.len() as f64;
        log::info!("linear probe accuracy: {}/{} = {:.3}", correct, test.len(), accuracy);
        Ok(accuracy)
    }
}

/// Index of the largest entry; the first one on ties.
fn argmax(values: ArrayView1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv { (i, v) } else { (bi, bv) }
        })
        .0
}

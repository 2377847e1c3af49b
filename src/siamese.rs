//! Siamese training with a Soft-DTW contrastive loss.
//!
//! One step samples a pair, encodes both sides with the same encoder,
//! evaluates [`ContrastiveLoss`] on the Soft-DTW value between the embeddings
//! and applies one SGD update through both branches.

use crate::distance::{PointwiseDistance, SquaredEuclidean};
use crate::encoder::{LinearEncoder, TrainableEncoder};
use crate::loss::ContrastiveLoss;
use crate::sampling::{LabeledPool, Pair, PairSampler, Relation, SelfPairPolicy};
use crate::softdtw::SoftDtw;

/// Training configuration. `gamma` must be given explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    pub gamma: f64,
    pub learning_rate: f64,
    pub margin: f64,
    pub seed: u64,
    pub self_pairs: SelfPairPolicy,
}

impl TrainerConfig {
    pub fn new(gamma: f64) -> crate::Result<Self> {
        crate::utils::valid_gamma(gamma)?;
        Ok(Self {
            gamma,
            learning_rate: 1e-3,
            margin: 10.0,
            seed: 0,
            self_pairs: SelfPairPolicy::Allow,
        })
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_self_pairs(mut self, policy: SelfPairPolicy) -> Self {
        self.self_pairs = policy;
        self
    }

    pub fn validate(&self) -> crate::Result<()> {
        crate::utils::valid_gamma(self.gamma)?;
        crate::utils::positive_finite(self.learning_rate, "learning_rate")?;
        ContrastiveLoss::new(self.margin).map(|_| ())
    }
}

/// Outcome of a single training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub anchor_index: usize,
    pub partner_index: usize,
    pub relation: Relation,
    /// Soft-DTW value between the embeddings before the update.
    pub distance: f64,
    pub loss: f64,
}

/// Aggregate over one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    /// Pairs that produced an update.
    pub pairs: usize,
    /// Anchors skipped because no partner satisfied the drawn relation.
    pub skipped: usize,
    pub mean_loss: f64,
    pub mean_positive_distance: Option<f64>,
    pub mean_negative_distance: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Siamese trainer owning the encoder, the Soft-DTW engine and the sampler.
#[derive(Debug)]
pub struct SiameseTrainer<E = LinearEncoder, M = SquaredEuclidean> {
    encoder: E,
    engine: SoftDtw<M>,
    loss: ContrastiveLoss,
    sampler: PairSampler,
    learning_rate: f64,
}

impl<E: TrainableEncoder> SiameseTrainer<E, SquaredEuclidean> {
    /// Trainer using squared Euclidean Soft-DTW with `config.gamma`.
    pub fn new(encoder: E, config: TrainerConfig) -> crate::Result<Self> {
        let engine = SoftDtw::new(config.gamma)?;
        Self::with_engine(encoder, engine, config)
    }
}

impl<E: TrainableEncoder, M: PointwiseDistance> SiameseTrainer<E, M> {
    /// Trainer with a caller-configured engine. `config.gamma` is ignored in
    /// favour of the engine's own configuration.
    pub fn with_engine(encoder: E, engine: SoftDtw<M>, config: TrainerConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            encoder,
            engine,
            loss: ContrastiveLoss::new(config.margin)?,
            sampler: PairSampler::new(config.seed).with_policy(config.self_pairs),
            learning_rate: config.learning_rate,
        })
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn into_encoder(self) -> E {
        self.encoder
    }

    pub fn engine(&self) -> &SoftDtw<M> {
        &self.engine
    }

    /// Sample a pair for `anchor` and apply one update.
    pub fn step(&mut self, pool: &LabeledPool, anchor: usize) -> crate::Result<StepReport> {
        let pair = self.sampler.produce_pair(pool, anchor)?;
        self.update(&pair)
    }

    /// Apply one update on a given pair.
    pub fn update(&mut self, pair: &Pair<'_>) -> crate::Result<StepReport> {
        let z_anchor = self.encoder.encode(pair.anchor)?;
        let z_partner = self.encoder.encode(pair.partner)?;
        let out = self
            .loss
            .evaluate(&self.engine, z_anchor.view(), z_partner.view(), pair.relation)?;

        // Both branches share weights: gradients are taken at the current
        // parameters before either is applied.
        let grad_anchor = self.encoder.backward(pair.anchor, out.grad_anchor.view())?;
        let grad_partner = self.encoder.backward(pair.partner, out.grad_partner.view())?;
        self.encoder.apply_gradient(&grad_anchor, self.learning_rate);
        self.encoder.apply_gradient(&grad_partner, self.learning_rate);

        log::trace!(
            "step anchor={} partner={} {} d={:.4} loss={:.4}",
            pair.anchor_index,
            pair.partner_index,
            pair.relation,
            out.distance,
            out.loss
        );

        Ok(StepReport {
            anchor_index: pair.anchor_index,
            partner_index: pair.partner_index,
            relation: pair.relation,
            distance: out.distance,
            loss: out.loss,
        })
    }

    /// Mean contrastive loss over `pairs` without updating the encoder.
    pub fn evaluate_pairs(&self, pairs: &[Pair<'_>]) -> crate::Result<f64> {
        let mut losses = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let z_anchor = self.encoder.encode(pair.anchor)?;
            let z_partner = self.encoder.encode(pair.partner)?;
            let d = self.engine.distance(z_anchor.view(), z_partner.view())?;
            losses.push(self.loss.from_distance(d, pair.relation).0);
        }
        Ok(mean(&losses).unwrap_or(0.0))
    }

    /// One shuffled pass over every anchor in `pool`.
    ///
    /// Anchors whose drawn relation has no valid partner are skipped with a
    /// warning and counted in [`EpochSummary::skipped`]; any other error
    /// aborts the epoch.
    pub fn train_epoch(&mut self, pool: &LabeledPool) -> crate::Result<EpochSummary> {
        let draws: Vec<_> = self.sampler.epoch(pool).collect();

        let mut losses = Vec::with_capacity(draws.len());
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        let mut skipped = 0;

        for draw in draws {
            let pair = match draw {
                Ok(pair) => pair,
                Err(crate::Error::SamplingExhausted { anchor, relation }) => {
                    log::warn!("skipping anchor {anchor}: no {relation} partner");
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let report = self.update(&pair)?;
            losses.push(report.loss);
            match report.relation {
                Relation::Positive => positive.push(report.distance),
                Relation::Negative => negative.push(report.distance),
            }
        }

        let summary = EpochSummary {
            pairs: losses.len(),
            skipped,
            mean_loss: mean(&losses).unwrap_or(0.0),
            mean_positive_distance: mean(&positive),
            mean_negative_distance: mean(&negative),
        };
        log::info!(
            "epoch: {} pairs, {} skipped, mean loss {:.4}",
            summary.pairs,
            summary.skipped,
            summary.mean_loss
        );
        Ok(summary)
    }

    /// Run `epochs` epochs and return their summaries.
    pub fn fit(&mut self, pool: &LabeledPool, epochs: usize) -> crate::Result<Vec<EpochSummary>> {
        (0..epochs).map(|_| self.train_epoch(pool)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn two_class_pool() -> LabeledPool {
        let mut sequences = Vec::new();
        let mut labels = Vec::new();
        for k in 0..6 {
            let phase = k as f64 * 0.1;
            let len = 8 + k % 3;
            sequences.push(Array2::from_shape_fn((2, len), |(f, t)| {
                ((t as f64) * 0.7 + phase + f as f64).sin()
            }));
            labels.push(0);
            sequences.push(Array2::from_shape_fn((2, len), |(f, t)| {
                2.0 + ((t as f64) * 0.7 + phase + f as f64).cos()
            }));
            labels.push(1);
        }
        LabeledPool::new(sequences, labels).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainerConfig::new(0.0).is_err());
        let cfg = TrainerConfig::new(1.0).unwrap().with_learning_rate(-1.0);
        assert!(SiameseTrainer::new(LinearEncoder::identity(2), cfg).is_err());
    }

    #[test]
    fn test_step_updates_encoder() {
        let pool = two_class_pool();
        let cfg = TrainerConfig::new(1.0).unwrap().with_learning_rate(1e-2);
        let mut trainer = SiameseTrainer::new(LinearEncoder::new(2, 2, 1).unwrap(), cfg).unwrap();
        let before = trainer.encoder().clone();
        let report = trainer.step(&pool, 0).unwrap();
        assert_eq!(report.anchor_index, 0);
        if report.loss > 0.0 {
            assert_ne!(trainer.encoder(), &before);
        }
    }

    #[test]
    fn test_epoch_skips_exhausted_anchors() {
        let sequences = vec![Array2::<f64>::ones((2, 4)); 4];
        let pool = LabeledPool::new(sequences, vec![0; 4]).unwrap();
        let cfg = TrainerConfig::new(1.0).unwrap().with_seed(3);
        let mut trainer = SiameseTrainer::new(LinearEncoder::identity(2), cfg).unwrap();
        let summary = trainer.train_epoch(&pool).unwrap();
        assert_eq!(summary.pairs + summary.skipped, 4);
        assert!(summary.mean_negative_distance.is_none());
    }

    #[test]
    fn test_encoder_dimension_mismatch_aborts() {
        let pool = two_class_pool();
        let cfg = TrainerConfig::new(1.0).unwrap();
        let mut trainer = SiameseTrainer::new(LinearEncoder::identity(3), cfg).unwrap();
        assert!(matches!(
            trainer.train_epoch(&pool).unwrap_err(),
            crate::Error::ShapeMismatch { .. }
        ));
    }
}

//! Positive/negative pair sampling for Siamese training.
//!
//! A [`LabeledPool`] holds labelled sequences. For an anchor index, a partner
//! is drawn uniformly from every index whose label matches (positive) or
//! differs from (negative) the anchor's label. Randomness always comes from a
//! caller-owned, seedable generator.

mod pool;
mod sampler;

pub use pool::LabeledPool;
pub use sampler::{Epoch, Pair, PairSampler, produce_pair, sample_partner};

use std::fmt;

/// Requested label relation between anchor and partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Partner shares the anchor's label.
    Positive,
    /// Partner has a different label.
    Negative,
}

impl Relation {
    /// Contrastive target: 1 for positive pairs, 0 for negative pairs.
    pub fn target(self) -> f64 {
        match self {
            Relation::Positive => 1.0,
            Relation::Negative => 0.0,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Positive => f.write_str("positive"),
            Relation::Negative => f.write_str("negative"),
        }
    }
}

/// Whether a positive draw may return the anchor itself.
///
/// `Allow` keeps every same-label index as a candidate, so an anchor can be
/// paired with itself (always the case for a singleton class). `Exclude`
/// removes the anchor, which turns a singleton class into
/// `SamplingExhausted` for positive draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelfPairPolicy {
    #[default]
    Allow,
    Exclude,
}

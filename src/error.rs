use crate::sampling::Relation;

/// Crate-level error type for Soft-DTW alignment and pair sampling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two sequences (or a sequence and a model) disagree on feature dimension.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Smoothing factor is zero, negative or not finite.
    #[error("invalid smoothing factor gamma={gamma}: must be finite and > 0")]
    InvalidGamma { gamma: f64 },

    /// A sequence has zero timesteps.
    #[error("sequence `{name}` has no timesteps")]
    EmptySequence { name: &'static str },

    /// No index in the pool satisfies the requested label relation.
    #[error("no {relation} partner available for anchor {anchor}")]
    SamplingExhausted { anchor: usize, relation: Relation },

    /// Invalid parameter value.
    #[error("invalid parameter `{name}`: got {value}, {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Index outside the pool.
    #[error("index {index} out of range for pool of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    /// Input contains NaN or infinite values.
    #[error("input `{name}` contains non-finite values")]
    NonFiniteInput { name: &'static str },
}

/// Convenience Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

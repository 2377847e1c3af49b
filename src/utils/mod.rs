mod dtw;
mod validation;

// Dynamic Time Warping (hard minimum)
pub use dtw::{dtw, dtw_distance};

// Validation operations
pub use validation::{
    finite_cost, positive_finite, same_features, valid_bandwidth, valid_gamma, valid_pair,
    valid_sequence,
};

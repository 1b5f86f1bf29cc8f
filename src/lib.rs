//! flightpipe: flight-delay feature pipeline
//!
//! Joins flights with plane and airport reference data, derives features,
//! indexes and one-hot encodes categorical columns, and selects a logistic
//! regression by k-fold cross-validated grid search.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;

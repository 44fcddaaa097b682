//! Common code shared between `diagnosis_server` and `camera`.
pub mod prediction;
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

//! Error types
//!
//! Only invalid input (and an explicit cancellation) aborts an analysis.
//! Detector faults are recovered into the report by the orchestrator, and a
//! missing backend is a capability state rather than an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the caller of the pipeline or the audio loader
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Empty buffer, zero sample rate or non-finite samples
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cancellation was observed before dispatching a detector
    #[error("analysis cancelled before the {0} detector")]
    Cancelled(&'static str),

    #[error("failed to decode '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resampling failed: {0}")]
    Resample(String),
}

impl AnalysisError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        AnalysisError::InvalidInput(reason.into())
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AnalysisError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A runtime fault inside a single detector
///
/// Never leaves the orchestrator: it becomes a zero-confidence result whose
/// evidence reads `error during analysis: <reason>`.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DetectorFailure(pub String);

impl DetectorFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        DetectorFailure(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

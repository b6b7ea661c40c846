//! Error types.
//!
//! Two layers:
//!
//! - `AnalysisError`: the per-run taxonomy produced by the core (ingest,
//!   detection, regression, picking). Most variants are recoverable at run
//!   granularity.
//! - `AppError`: what the binary reports, carrying a process exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while analyzing a single run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// A data cell could not be read as a number. The row is skipped.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The regression could not be derived for the selected sub-range.
    #[error("fit unavailable: {0}")]
    SingularFit(String),

    /// Too few points for automatic region detection.
    #[error("only {points} point(s), region detection needs at least {required}")]
    DetectorUnderflow { points: usize, required: usize },

    /// Every candidate window scored at or below zero.
    #[error("no linear region found")]
    NoLinearRegion,

    /// A pick referenced a point that is not part of the series.
    #[error("point index {index} out of range (series has {len} points)")]
    PointOutOfRange { index: usize, len: usize },

    /// The workbook could not be opened or read.
    #[error("cannot read '{}': {message}", path.display())]
    SourceAccess { path: PathBuf, message: String },
}

impl AnalysisError {
    pub fn singular(reason: impl Into<String>) -> Self {
        AnalysisError::SingularFit(reason.into())
    }

    pub fn source_access(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        AnalysisError::SourceAccess {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Detector failures that should trigger the first/last fallback.
    pub fn is_detector_fallback(&self) -> bool {
        matches!(
            self,
            AnalysisError::DetectorUnderflow { .. } | AnalysisError::NoLinearRegion
        )
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let exit_code = match err {
            AnalysisError::SourceAccess { .. } | AnalysisError::Parse { .. } => 2,
            AnalysisError::DetectorUnderflow { .. }
            | AnalysisError::NoLinearRegion
            | AnalysisError::SingularFit(_) => 3,
            AnalysisError::PointOutOfRange { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_access_maps_to_input_exit_code() {
        let err: AppError = AnalysisError::source_access("missing.csv", "no such file").into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("missing.csv"));
    }

    #[test]
    fn detector_failures_request_fallback() {
        assert!(AnalysisError::NoLinearRegion.is_detector_fallback());
        assert!(
            AnalysisError::DetectorUnderflow {
                points: 3,
                required: 5
            }
            .is_detector_fallback()
        );
        assert!(!AnalysisError::singular("slope is zero").is_detector_fallback());
    }
}

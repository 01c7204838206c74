// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the PreFlight Pro engine.
//
// Analyzer failures are deliberately absent: an analyzer that cannot complete
// returns a degraded result instead of an error, so a loadable document always
// yields a complete report.

use thiserror::Error;

/// Top-level error type for all preflight operations.
#[derive(Debug, Error)]
pub enum PreflightError {
    // -- Document errors --
    #[error("document could not be loaded: {0}")]
    DocumentLoad(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Fix pipeline --
    #[error("fix operation `{operation}` failed: {reason}")]
    FixOperation { operation: String, reason: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    // -- Color math --
    #[error("invalid color value: {0}")]
    InvalidColor(String),

    // -- External tools --
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    // -- I/O and serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PreflightError {
    /// Wrap any error raised while an operation was running into the
    /// pipeline-aborting `FixOperation` variant.
    pub fn fix_operation(operation: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::FixOperation {
            operation: operation.into(),
            reason: source.to_string(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PreflightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_operation_message_names_the_operation() {
        let err = PreflightError::fix_operation("scale", "factor must be positive");
        assert_eq!(
            err.to_string(),
            "fix operation `scale` failed: factor must be positive"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: PreflightError = io.into();
        assert!(matches!(err, PreflightError::Io(_)));
    }
}

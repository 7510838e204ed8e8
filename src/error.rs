//! Error types for the doc2html library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`]: **Fatal**: the batch cannot produce an archive at all
//!   (nothing uploaded, engine missing, every file rejected). Returned as
//!   `Err(BatchError)` from [`crate::batch::convert_batch`].
//!
//! * [`ConversionError`]: raised by a [`crate::pipeline::engine::ConversionEngine`]
//!   for one document. `ConversionFailed` is absorbed by the orchestrator
//!   and stored as a [`crate::output::FailedDocument`]; `EngineUnavailable`
//!   escalates to [`BatchError::EngineUnavailable`] and stops the batch.

use crate::output::FailedDocument;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the doc2html pipeline.
#[derive(Debug, Error)]
pub enum BatchError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The multipart body carried no part under the upload field name.
    #[error("No file part in the request")]
    NoFilePart,

    /// Upload parts were present but none of them named a file.
    #[error("No selected files")]
    NoFilesSelected,

    /// Nothing survived validation, so no conversion was attempted.
    #[error("No valid files were provided")]
    NoFilesProvided,

    /// The request body could not be decoded as multipart form data.
    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The conversion engine could not be located or started.
    #[error(
        "Conversion engine '{engine}' is not installed or not accessible: {detail}\n\
Install pandoc (https://pandoc.org/installing.html) or point --pandoc at the binary."
    )]
    EngineUnavailable { engine: String, detail: String },

    /// Every attempted file failed to convert; there is nothing to archive.
    #[error("No files were successfully converted ({} failed)", failures.len())]
    AllConversionsFailed { failures: Vec<FailedDocument> },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The ZIP archive could not be written.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::NoFilePart => "NoFilePart",
            BatchError::NoFilesSelected => "NoFilesSelected",
            BatchError::NoFilesProvided => "NoFilesProvided",
            BatchError::InvalidMultipart(_) => "InvalidMultipart",
            BatchError::EngineUnavailable { .. } => "EngineUnavailable",
            BatchError::AllConversionsFailed { .. } => "AllConversionsFailed",
            BatchError::ArchiveFailed(_) => "ArchiveFailed",
            BatchError::InvalidConfig(_) => "InvalidConfig",
            BatchError::Internal(_) => "Internal",
        }
    }

    /// Diagnostic detail beyond the headline message, if any.
    ///
    /// For `AllConversionsFailed` this is one line per file with the
    /// engine's own output.
    pub fn details(&self) -> Option<String> {
        match self {
            BatchError::EngineUnavailable { detail, .. } => Some(detail.clone()),
            BatchError::AllConversionsFailed { failures } => Some(
                failures
                    .iter()
                    .map(|f| format!("{}: {}", f.source_name, f.detail.trim()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }
}

impl From<ConversionError> for BatchError {
    fn from(e: ConversionError) -> Self {
        match e {
            ConversionError::EngineUnavailable { engine, detail } => {
                BatchError::EngineUnavailable { engine, detail }
            }
            ConversionError::ConversionFailed { reason, detail } => {
                BatchError::Internal(format!("unexpected per-file {reason:?} failure: {detail}"))
            }
        }
    }
}

/// Why a single document failed. Every variant is a per-file failure that
/// does not abort sibling conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The engine ran and exited non-zero for this input.
    EngineRejected,
    /// The engine did not finish within the per-conversion timeout.
    TimedOut,
    /// The private temp workspace could not be written or read back.
    Workspace,
}

/// An error raised by a conversion engine for one document.
#[derive(Debug, Clone, Error)]
pub enum ConversionError {
    /// The engine binary is missing or cannot be executed. Fatal for the batch.
    #[error("engine '{engine}' unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The engine rejected this specific input.
    #[error("conversion failed ({reason:?}): {detail}")]
    ConversionFailed { reason: FailureReason, detail: String },
}

impl ConversionError {
    pub fn rejected(detail: impl Into<String>) -> Self {
        ConversionError::ConversionFailed {
            reason: FailureReason::EngineRejected,
            detail: detail.into(),
        }
    }

    pub fn workspace(detail: impl Into<String>) -> Self {
        ConversionError::ConversionFailed {
            reason: FailureReason::Workspace,
            detail: detail.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ConversionError::EngineUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sanitize::sanitize;

    #[test]
    fn engine_unavailable_display_names_engine() {
        let e = BatchError::EngineUnavailable {
            engine: "pandoc".into(),
            detail: "No such file or directory".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pandoc"), "got: {msg}");
        assert_eq!(e.kind(), "EngineUnavailable");
    }

    #[test]
    fn all_failed_details_list_each_file() {
        let e = BatchError::AllConversionsFailed {
            failures: vec![
                FailedDocument {
                    source_name: sanitize("a.docx"),
                    reason: FailureReason::EngineRejected,
                    detail: "bad zip\n".into(),
                },
                FailedDocument {
                    source_name: sanitize("b.odt"),
                    reason: FailureReason::TimedOut,
                    detail: "timed out after 5s".into(),
                },
            ],
        };
        assert!(e.to_string().contains("2 failed"));
        let details = e.details().unwrap();
        assert_eq!(details, "a.docx: bad zip\nb.odt: timed out after 5s");
    }

    #[test]
    fn request_errors_have_no_details() {
        assert!(BatchError::NoFilePart.details().is_none());
        assert_eq!(BatchError::NoFilesSelected.kind(), "NoFilesSelected");
    }

    #[test]
    fn unavailable_conversion_error_is_fatal() {
        let e = ConversionError::EngineUnavailable {
            engine: "pandoc".into(),
            detail: "missing".into(),
        };
        assert!(e.is_fatal());
        assert!(!ConversionError::rejected("boom").is_fatal());
        assert!(matches!(
            BatchError::from(e),
            BatchError::EngineUnavailable { .. }
        ));
    }

    #[test]
    fn failure_reason_serialises_snake_case() {
        let json = serde_json::to_string(&FailureReason::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }
}

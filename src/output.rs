//! Result types produced by the batch pipeline.
//!
//! Every attempted upload yields exactly one [`ConversionOutcome`]. The
//! orchestrator folds those into a [`BatchResult`], and
//! [`BatchResult::settle`] applies the partial-success policy:
//!
//! | converted | failed | result |
//! |-----------|--------|--------|
//! | 0 | 0 | `Err(NoFilesProvided)` |
//! | 0 | ≥1 | `Err(AllConversionsFailed)` |
//! | ≥1 | any | `Ok(converted)`; failures are dropped |
//!
//! Keeping the policy in a pure function means it can be tested without
//! spawning a single process.

use crate::error::{BatchError, ConversionError, FailureReason};
use crate::pipeline::sanitize::SanitizedName;
use serde::Serialize;

/// A document the engine converted.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub source_name: SanitizedName,
    pub html: Vec<u8>,
}

impl ConvertedDocument {
    /// Archive entry name, `<base>.html`.
    pub fn entry_name(&self) -> String {
        self.source_name.html_entry_name()
    }
}

/// A document the engine rejected. Absorbed unless every document fails.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub source_name: SanitizedName,
    pub reason: FailureReason,
    pub detail: String,
}

/// Outcome of one attempted conversion.
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    Converted(ConvertedDocument),
    Failed(FailedDocument),
}

impl ConversionOutcome {
    /// Map an engine result into an outcome.
    ///
    /// Returns `Err` only for a fatal error, which must end the batch rather
    /// than be recorded against one document.
    pub fn from_engine(
        source_name: SanitizedName,
        result: Result<Vec<u8>, ConversionError>,
    ) -> Result<Self, ConversionError> {
        match result {
            Ok(html) => Ok(ConversionOutcome::Converted(ConvertedDocument { source_name, html })),
            Err(ConversionError::ConversionFailed { reason, detail }) => {
                Ok(ConversionOutcome::Failed(FailedDocument {
                    source_name,
                    reason,
                    detail,
                }))
            }
            Err(fatal) => Err(fatal),
        }
    }

    pub fn source_name(&self) -> &SanitizedName {
        match self {
            ConversionOutcome::Converted(c) => &c.source_name,
            ConversionOutcome::Failed(f) => &f.source_name,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }
}

/// All outcomes of one batch, in upload order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub converted: Vec<ConvertedDocument>,
    pub failed: Vec<FailedDocument>,
    /// Uploads never attempted (no filename, or rejected by the filter).
    pub skipped: usize,
}

impl BatchResult {
    /// Fold outcomes in order. `skipped` is carried through for reporting.
    pub fn from_outcomes<I>(outcomes: I, skipped: usize) -> Self
    where
        I: IntoIterator<Item = ConversionOutcome>,
    {
        outcomes.into_iter().fold(
            BatchResult {
                skipped,
                ..Default::default()
            },
            |mut acc, outcome| {
                acc.push(outcome);
                acc
            },
        )
    }

    pub fn push(&mut self, outcome: ConversionOutcome) {
        match outcome {
            ConversionOutcome::Converted(c) => self.converted.push(c),
            ConversionOutcome::Failed(f) => self.failed.push(f),
        }
    }

    pub fn attempted(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            attempted: self.attempted(),
            converted: self.converted.len(),
            failed: self.failed.len(),
            skipped: self.skipped,
        }
    }

    /// Apply the partial-success policy (see the module docs).
    pub fn settle(self) -> Result<Vec<ConvertedDocument>, BatchError> {
        if self.attempted() == 0 {
            return Err(BatchError::NoFilesProvided);
        }
        if self.converted.is_empty() {
            return Err(BatchError::AllConversionsFailed {
                failures: self.failed,
            });
        }
        Ok(self.converted)
    }
}

/// Counts for logging and the CLI report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub converted: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The ZIP archive returned to the caller.
#[derive(Debug, Clone)]
pub struct ArchivePayload {
    /// Complete ZIP file bytes.
    pub bytes: Vec<u8>,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

impl ArchivePayload {
    /// Download name used in `Content-Disposition`.
    pub const FILENAME: &'static str = "converted_documents.zip";

    pub const CONTENT_TYPE: &'static str = "application/zip";

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

//! # doc2html
//!
//! Batch-convert uploaded documents to self-contained HTML and hand the
//! results back as one ZIP archive.
//!
//! ## Why this crate?
//!
//! pandoc already knows how to turn Word, ODT, Markdown, reStructuredText and
//! dozens of other formats into HTML. What it does not do is accept a pile of
//! untrusted uploads, keep each one from escaping its directory, carry on when
//! one file is broken, and return everything that worked in a single download.
//! That glue is what this crate provides, as a library and as an HTTP service.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Intake    decode `files[]` parts into UploadItems
//!  ├─ 2. Sanitize  untrusted filename → single safe path component
//!  ├─ 3. Filter    skip unnamed or disallowed uploads
//!  ├─ 4. Convert   pandoc in a private temp dir, one document at a time
//!  ├─ 5. Settle    partial-success policy over all outcomes
//!  └─ 6. Archive   in-memory ZIP, one `<base>.html` entry per success
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2html::{convert_batch, BatchConfig, PandocEngine, UploadItem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(PandocEngine::default());
//!     let items = vec![UploadItem::new("notes.md", "# Hello\n\nWorld")];
//!
//!     let archive = convert_batch(items, engine, &BatchConfig::default()).await?;
//!     std::fs::write("converted_documents.zip", &archive.bytes)?;
//!     eprintln!("entries: {:?}", archive.entries);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum router for `POST /convert` and `GET /health` |
//! | `cli`    | on      | Enables the `doc2html` binary (clap + anyhow + tracing-subscriber); implies `server` |
//!
//! Disable both when embedding only the library:
//! ```toml
//! doc2html = { version = "0.1", default-features = false }
//! ```
//!
//! ## Failure policy
//!
//! | Situation | Result |
//! |-----------|--------|
//! | some files convert | archive of the successes; failures logged |
//! | every attempted file fails | [`BatchError::AllConversionsFailed`] |
//! | nothing attempted | [`BatchError::NoFilesProvided`] |
//! | pandoc missing | [`BatchError::EngineUnavailable`], batch stops at once |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_batch, run_batch, UploadItem};
pub use config::{BatchConfig, BatchConfigBuilder, EmbedMode, PandocConfig, PandocConfigBuilder};
pub use error::{BatchError, ConversionError, FailureReason};
pub use output::{
    ArchivePayload, BatchResult, BatchSummary, ConversionOutcome, ConvertedDocument,
    FailedDocument,
};
pub use pipeline::archive::build_archive;
pub use pipeline::engine::{ConversionEngine, PandocEngine};
pub use pipeline::filter::{ExtensionFilter, UploadFilter};
pub use pipeline::sanitize::{sanitize, SanitizedName};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};

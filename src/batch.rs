//! Batch orchestration: uploads in, one ZIP archive (or a typed error) out.
//!
//! Each upload moves through
//!
//! ```text
//! Pending ─┬─▶ Skipped                  (no filename, or filtered out)
//!          └─▶ Attempting ─┬─▶ Converted
//!                          └─▶ Failed   (engine rejected this file)
//! ```
//!
//! A per-file failure never stops the batch. An unavailable engine does:
//! the remaining queue is abandoned and the whole request fails, because no
//! other file could succeed either.
//!
//! ## Sequential vs. concurrent
//!
//! With `concurrency == 1` (the default) documents are converted one after
//! another. Higher values run conversions through an order-preserving
//! buffered stream, so archive entries still follow upload order. A shared
//! abort flag stops queued documents from starting once the engine is known
//! to be missing.

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::{ArchivePayload, BatchResult, ConversionOutcome};
use crate::pipeline::archive::build_archive;
use crate::pipeline::engine::ConversionEngine;
use crate::pipeline::filter::UploadFilter;
use crate::pipeline::sanitize::{sanitize, SanitizedName};
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// One uploaded file as decoded from the request.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Client-supplied filename. `None` or empty means "not selected".
    pub filename: Option<String>,
    pub content: Bytes,
}

impl UploadItem {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: Some(filename.into()),
            content: content.into(),
        }
    }

    /// An upload part that carried no filename.
    pub fn unnamed(content: impl Into<Bytes>) -> Self {
        Self {
            filename: None,
            content: content.into(),
        }
    }

    /// The filename, if present and non-empty.
    pub fn selected_name(&self) -> Option<&str> {
        self.filename.as_deref().filter(|n| !n.is_empty())
    }
}

/// A document that survived validation and will be handed to the engine.
#[derive(Debug)]
struct Job {
    name: SanitizedName,
    content: Bytes,
}

/// Convert `items` and package the successes into a ZIP archive.
///
/// # Errors
/// - [`BatchError::NoFilesProvided`] if nothing was attempted
/// - [`BatchError::AllConversionsFailed`] if every attempt failed
/// - [`BatchError::EngineUnavailable`] if the engine could not run
/// - [`BatchError::ArchiveFailed`] if the ZIP could not be written
pub async fn convert_batch(
    items: Vec<UploadItem>,
    engine: Arc<dyn ConversionEngine>,
    config: &BatchConfig,
) -> Result<ArchivePayload, BatchError> {
    let result = run_batch(items, engine, config).await?;

    let summary = result.summary();
    if summary.converted > 0 {
        for failed in &result.failed {
            warn!(
                "Dropping '{}' from archive ({:?}): {}",
                failed.source_name,
                failed.reason,
                failed.detail.trim()
            );
        }
    }

    let converted = result.settle()?;
    let archive = build_archive(&converted)?;

    info!(
        "Archive ready: {} entries, {} bytes ({} failed, {} skipped)",
        archive.entries.len(),
        archive.len(),
        summary.failed,
        summary.skipped
    );
    Ok(archive)
}

/// Convert `items` and return every outcome without settling or archiving.
///
/// Only a fatal engine error is returned as `Err`; an empty or all-failed
/// batch is a valid [`BatchResult`] here.
pub async fn run_batch(
    items: Vec<UploadItem>,
    engine: Arc<dyn ConversionEngine>,
    config: &BatchConfig,
) -> Result<BatchResult, BatchError> {
    let start = Instant::now();
    let uploads = items.len();
    let (queue, skipped) = plan(items, config.filter.as_ref());
    let total = queue.len();

    info!(
        "Batch: {} uploads, {} to convert with {}, {} skipped",
        uploads,
        total,
        engine.name(),
        skipped
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let outcomes = if config.concurrency <= 1 || total <= 1 {
        process_sequential(&engine, queue, config).await?
    } else {
        process_concurrent(&engine, queue, config).await?
    };

    let result = BatchResult::from_outcomes(outcomes, skipped);

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, result.converted.len());
    }

    info!(
        "Batch complete: {}/{} converted in {}ms",
        result.converted.len(),
        total,
        start.elapsed().as_millis()
    );
    Ok(result)
}

/// Sanitise and filter the uploads. Returns the work queue in upload order
/// and the number of skipped uploads.
fn plan(items: Vec<UploadItem>, filter: &dyn UploadFilter) -> (Vec<Job>, usize) {
    let mut queue = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        let Some(raw) = item.selected_name() else {
            debug!("Skipping upload without a filename");
            skipped += 1;
            continue;
        };

        let name = sanitize(raw);
        if !filter.accepts(&name) {
            debug!("Skipping '{}': rejected by upload filter", name);
            skipped += 1;
            continue;
        }
        if name.as_str() != raw {
            debug!("Sanitised {:?} → '{}'", raw, name);
        }

        queue.push(Job {
            name,
            content: item.content,
        });
    }

    (queue, skipped)
}

/// Convert one job and report progress.
///
/// `Err` means the engine is unavailable and the batch must stop.
async fn attempt(
    engine: &dyn ConversionEngine,
    job: Job,
    index: usize,
    total: usize,
    config: &BatchConfig,
) -> Result<ConversionOutcome, BatchError> {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_document_start(index, total, job.name.as_str());
    }
    debug!("[{}/{}] converting '{}'", index, total, job.name);

    let result = engine.convert(&job.content, &job.name).await;
    let outcome = ConversionOutcome::from_engine(job.name, result).map_err(|e| {
        error!("{}", e);
        BatchError::from(e)
    })?;

    match &outcome {
        ConversionOutcome::Converted(doc) => {
            if let Some(cb) = cb {
                cb.on_document_complete(index, total, doc.source_name.as_str(), doc.html.len());
            }
        }
        ConversionOutcome::Failed(failed) => {
            warn!(
                "[{}/{}] '{}' failed ({:?}): {}",
                index,
                total,
                failed.source_name,
                failed.reason,
                failed.detail.trim()
            );
            if let Some(cb) = cb {
                cb.on_document_error(index, total, failed.source_name.as_str(), &failed.detail);
            }
        }
    }

    Ok(outcome)
}

/// Convert jobs one at a time, stopping at the first fatal error.
async fn process_sequential(
    engine: &Arc<dyn ConversionEngine>,
    queue: Vec<Job>,
    config: &BatchConfig,
) -> Result<Vec<ConversionOutcome>, BatchError> {
    let total = queue.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, job) in queue.into_iter().enumerate() {
        outcomes.push(attempt(engine.as_ref(), job, i + 1, total, config).await?);
    }

    Ok(outcomes)
}

/// Convert up to `config.concurrency` jobs at once, preserving upload order.
async fn process_concurrent(
    engine: &Arc<dyn ConversionEngine>,
    queue: Vec<Job>,
    config: &BatchConfig,
) -> Result<Vec<ConversionOutcome>, BatchError> {
    let total = queue.len();
    let abort = Arc::new(AtomicBool::new(false));

    let outcomes: Vec<Option<ConversionOutcome>> =
        stream::iter(queue.into_iter().enumerate().map(|(i, job)| {
            let engine = Arc::clone(engine);
            let config = config.clone();
            let abort = Arc::clone(&abort);
            async move {
                if abort.load(Ordering::SeqCst) {
                    debug!("Not starting '{}': batch aborted", job.name);
                    return Ok(None);
                }
                let result = attempt(engine.as_ref(), job, i + 1, total, &config).await;
                if result.is_err() {
                    abort.store(true, Ordering::SeqCst);
                }
                result.map(Some)
            }
        }))
        .buffered(config.concurrency)
        .try_collect()
        .await?;

    Ok(outcomes.into_iter().flatten().collect())
}

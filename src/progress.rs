//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the orchestrator works through an upload set. The CLI uses it to drive
//! a terminal progress bar; the HTTP service leaves it unset.
//!
//! # Example
//!
//! ```rust
//! use doc2html::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
//!         let done = self.converted.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{name} ({index}/{total}) → {html_len} bytes, {done} done");
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { converted: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each attempted document.
///
/// `index` is 1-based over *attempted* documents (skipped uploads are not
/// counted) and `total` is the number of documents that will be attempted.
///
/// # Thread safety
///
/// With `concurrency > 1` the start/complete/error hooks may fire from
/// several tasks at once and out of order, so implementations must guard
/// shared state (`Mutex`, atomics).
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after validation, before the first conversion.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document is handed to the engine.
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document converted successfully.
    fn on_document_complete(&self, index: usize, total: usize, name: &str, html_len: usize) {
        let _ = (index, total, name, html_len);
    }

    /// Called when a document failed. Not called for a fatal engine error,
    /// which ends the batch instead.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every attempted document has an outcome.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{run_batch, UploadItem};
    use crate::config::BatchConfig;
    use crate::error::ConversionError;
    use crate::pipeline::engine::ConversionEngine;
    use crate::pipeline::sanitize::SanitizedName;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Rejects input `bad`, converts everything else.
    struct PickyEngine;

    #[async_trait]
    impl ConversionEngine for PickyEngine {
        fn name(&self) -> &str {
            "picky"
        }

        async fn convert(
            &self,
            input: &[u8],
            _name: &SanitizedName,
        ) -> Result<Vec<u8>, ConversionError> {
            if input == b"bad" {
                Err(ConversionError::rejected("exit status 64"))
            } else {
                Ok(b"<html></html>".to_vec())
            }
        }

        async fn probe(&self) -> Result<String, ConversionError> {
            Ok("picky 1".into())
        }
    }

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl BatchProgressCallback for EventLog {
        fn on_batch_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("batch 0/{total}"));
        }

        fn on_document_start(&self, index: usize, total: usize, name: &str) {
            self.0.lock().unwrap().push(format!("start {index}/{total} {name}"));
        }

        fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
            self.0
                .lock()
                .unwrap()
                .push(format!("error {index}/{total} {name}: {error}"));
        }

        fn on_batch_complete(&self, total: usize, success_count: usize) {
            self.0
                .lock()
                .unwrap()
                .push(format!("batch {success_count}/{total}"));
        }
    }

    #[tokio::test]
    async fn indices_count_only_attempted_documents() {
        let log = Arc::new(EventLog::default());
        let config = BatchConfig::builder()
            .allow_extensions(["md"])
            .progress_callback(log.clone())
            .build()
            .unwrap();
        let items = vec![
            UploadItem::unnamed("no name"),
            UploadItem::new("one.md", "ok"),
            UploadItem::new("skip.pdf", "filtered"),
            UploadItem::new("two.md", "bad"),
        ];

        run_batch(items, Arc::new(PickyEngine), &config).await.unwrap();

        let events = log.0.lock().unwrap().clone();
        assert_eq!(
            events,
            [
                "batch 0/2",
                "start 1/2 one.md",
                "start 2/2 two.md",
                "error 2/2 two.md: exit status 64",
                "batch 1/2",
            ]
        );
    }

    #[tokio::test]
    async fn noop_callback_can_drive_a_batch() {
        let config = BatchConfig::builder()
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        let result = run_batch(vec![UploadItem::new("a.md", "ok")], Arc::new(PickyEngine), &config)
            .await
            .unwrap();
        assert_eq!(result.converted.len(), 1);
    }
}

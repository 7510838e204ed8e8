//! Batch orchestration tests against in-memory engines.
//!
//! Run with:
//!   cargo test --test batch

mod common;

use common::{zip_entries, zip_names, EchoEngine, MissingEngine};
use doc2html::{
    convert_batch, run_batch, BatchConfig, BatchError, BatchProgressCallback, ConversionEngine,
    FailureReason, UploadItem,
};
use std::sync::{Arc, Mutex};

fn echo() -> Arc<EchoEngine> {
    Arc::new(EchoEngine::default())
}

fn concurrent(n: usize) -> BatchConfig {
    BatchConfig::builder().concurrency(n).build().unwrap()
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_markdown_file_becomes_one_html_entry() {
    let engine = echo();
    let items = vec![UploadItem::new("test.md", "# Test\n\nhello")];

    let archive = convert_batch(items, engine.clone(), &BatchConfig::default())
        .await
        .unwrap();

    let entries = zip_entries(&archive.bytes);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "test.html");
    assert!(entries[0].1.contains("<html"));
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn entries_follow_upload_order() {
    let items = vec![
        UploadItem::new("zulu.docx", "z"),
        UploadItem::new("alpha.md", "a"),
        UploadItem::new("mike.odt", "m"),
    ];
    let archive = convert_batch(items, echo(), &BatchConfig::default())
        .await
        .unwrap();
    assert_eq!(zip_names(&archive.bytes), ["zulu.html", "alpha.html", "mike.html"]);
    assert_eq!(archive.entries, ["zulu.html", "alpha.html", "mike.html"]);
}

#[tokio::test]
async fn hostile_names_are_sanitised_before_archiving() {
    let items = vec![
        UploadItem::new("../../etc/passwd.md", "p"),
        UploadItem::new("C:\\Users\\me\\report.docx", "r"),
    ];
    let archive = convert_batch(items, echo(), &BatchConfig::default())
        .await
        .unwrap();

    let names = zip_names(&archive.bytes);
    assert_eq!(names, ["passwd.html", "report.html"]);
    assert!(names.iter().all(|n| !n.contains("..") && !n.contains('/')));
}

// ── Partial failure policy ───────────────────────────────────────────────────

#[tokio::test]
async fn failures_are_dropped_when_something_converts() {
    let engine = echo();
    let items = vec![
        UploadItem::new("a.md", "ok"),
        UploadItem::new("b.md", "BROKEN"),
        UploadItem::new("c.md", "ok"),
    ];
    let archive = convert_batch(items, engine.clone(), &BatchConfig::default())
        .await
        .unwrap();

    assert_eq!(zip_names(&archive.bytes), ["a.html", "c.html"]);
    assert_eq!(engine.calls(), 3);
}

#[tokio::test]
async fn every_file_failing_is_all_conversions_failed() {
    let items = vec![
        UploadItem::new("a.docx", "BROKEN zip"),
        UploadItem::new("b.docx", "BROKEN too"),
    ];
    let err = convert_batch(items, echo(), &BatchConfig::default())
        .await
        .unwrap_err();

    match &err {
        BatchError::AllConversionsFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures
                .iter()
                .all(|f| f.reason == FailureReason::EngineRejected));
        }
        other => panic!("expected AllConversionsFailed, got {other:?}"),
    }
    let details = err.details().unwrap();
    assert!(details.contains("a.docx: a.docx: unexpected end of input"), "{details}");
    assert!(details.contains("b.docx"));
}

#[tokio::test]
async fn nothing_to_attempt_is_no_files_provided() {
    let engine = echo();
    let items = vec![UploadItem::unnamed("x"), UploadItem::new("", "y")];
    let err = convert_batch(items, engine.clone(), &BatchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::NoFilesProvided), "got {err:?}");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn filter_rejecting_everything_is_no_files_provided() {
    let engine = echo();
    let config = BatchConfig::builder()
        .allow_extensions(["docx"])
        .build()
        .unwrap();
    let items = vec![UploadItem::new("notes.md", "x"), UploadItem::new("a.pdf", "y")];

    let err = convert_batch(items, engine.clone(), &config).await.unwrap_err();
    assert!(matches!(err, BatchError::NoFilesProvided));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn closure_filter_is_applied() {
    let config = BatchConfig::builder()
        .filter(|name: &doc2html::SanitizedName| !name.as_str().starts_with("draft"))
        .build()
        .unwrap();
    let items = vec![UploadItem::new("draft.md", "x"), UploadItem::new("final.md", "y")];

    let result = run_batch(items, echo(), &config).await.unwrap();
    assert_eq!(result.skipped, 1);
    assert_eq!(result.converted.len(), 1);
    assert_eq!(result.converted[0].source_name.as_str(), "final.md");
}

// ── Fatal engine errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn missing_engine_stops_sequential_batch_at_once() {
    let engine = Arc::new(MissingEngine::default());
    let items = vec![
        UploadItem::new("a.md", "a"),
        UploadItem::new("b.md", "b"),
        UploadItem::new("c.md", "c"),
    ];
    let err = convert_batch(items, engine.clone(), &BatchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BatchError::EngineUnavailable { .. }), "got {err:?}");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn missing_engine_stops_concurrent_batch() {
    let engine = Arc::new(MissingEngine::default());
    let items: Vec<UploadItem> = (0..8)
        .map(|i| UploadItem::new(format!("doc{i}.md"), "x"))
        .collect();

    let err = convert_batch(items, engine.clone(), &concurrent(2))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "EngineUnavailable");
    assert!(engine.calls() <= 2, "attempted {} documents", engine.calls());
}

// ── Concurrency & collisions ─────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_batch_keeps_upload_order() {
    let engine = echo();
    let items = vec![
        UploadItem::new("slow-first.md", "1"),
        UploadItem::new("second.md", "2"),
        UploadItem::new("slow-third.md", "3"),
        UploadItem::new("fourth.md", "4"),
    ];
    let archive = convert_batch(items, engine.clone(), &concurrent(4))
        .await
        .unwrap();

    assert_eq!(
        zip_names(&archive.bytes),
        ["slow-first.html", "second.html", "slow-third.html", "fourth.html"]
    );
    assert_eq!(engine.calls(), 4);
}

#[tokio::test]
async fn concurrent_batch_drops_failures_and_keeps_order() {
    let engine = echo();
    let items = vec![
        UploadItem::new("slow-a.md", "a"),
        UploadItem::new("b.md", "BROKEN"),
        UploadItem::new("c.md", "c"),
        UploadItem::new("slow-d.md", "BROKEN slowly"),
        UploadItem::new("e.md", "e"),
    ];

    let result = run_batch(items.clone(), engine.clone(), &concurrent(3))
        .await
        .unwrap();
    let failed: Vec<&str> = result.failed.iter().map(|f| f.source_name.as_str()).collect();
    assert_eq!(failed, ["b.md", "slow-d.md"]);

    let archive = convert_batch(items, engine.clone(), &concurrent(3))
        .await
        .unwrap();
    let entries = zip_entries(&archive.bytes);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["slow-a.html", "c.html", "e.html"]);
    assert!(entries.iter().all(|(_, body)| !body.contains("BROKEN")));
    assert_eq!(engine.calls(), 10);
}

#[tokio::test]
async fn same_base_name_keeps_later_conversion() {
    let items = vec![
        UploadItem::new("report.docx", "from docx"),
        UploadItem::new("report.md", "from markdown"),
    ];
    let archive = convert_batch(items, echo(), &BatchConfig::default())
        .await
        .unwrap();

    let entries = zip_entries(&archive.bytes);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "report.html");
    assert!(entries[0].1.contains("from markdown"));
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start {total}"));
    }
    fn on_document_complete(&self, index: usize, _total: usize, name: &str, _len: usize) {
        self.events.lock().unwrap().push(format!("ok {index} {name}"));
    }
    fn on_document_error(&self, index: usize, _total: usize, name: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {index} {name}"));
    }
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total}"));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_attempt() {
    let recorder = Arc::new(Recorder::default());
    let config = BatchConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let items = vec![
        UploadItem::unnamed("skipped"),
        UploadItem::new("a.md", "ok"),
        UploadItem::new("b.md", "BROKEN"),
    ];

    let result = run_batch(items, echo(), &config).await.unwrap();
    assert_eq!(result.summary().attempted, 2);
    assert_eq!(result.summary().skipped, 1);

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(events, ["start 2", "ok 1 a.md", "err 2 b.md", "done 1/2"]);
}

#[tokio::test]
async fn engine_trait_objects_are_interchangeable() {
    let engines: Vec<Arc<dyn ConversionEngine>> = vec![
        echo() as Arc<dyn ConversionEngine>,
        Arc::new(MissingEngine::default()) as Arc<dyn ConversionEngine>,
    ];
    assert!(engines[0].probe().await.is_ok());
    assert!(engines[1].probe().await.unwrap_err().is_fatal());
}

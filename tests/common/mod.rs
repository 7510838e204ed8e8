//! Shared test helpers: in-memory conversion engines and ZIP readers.

#![allow(dead_code)]

use async_trait::async_trait;
use doc2html::{ConversionEngine, ConversionError, SanitizedName};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zip::ZipArchive;

/// Wraps the input in a minimal HTML page.
///
/// Input starting with `BROKEN` is rejected; names starting with `slow` take
/// 50 ms so that concurrent batches finish out of order.
#[derive(Debug, Default)]
pub struct EchoEngine {
    pub calls: AtomicUsize,
}

impl EchoEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionEngine for EchoEngine {
    fn name(&self) -> &str {
        "echo"
    }

    async fn convert(
        &self,
        input: &[u8],
        name: &SanitizedName,
    ) -> Result<Vec<u8>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if name.as_str().starts_with("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if input.starts_with(b"BROKEN") {
            return Err(ConversionError::rejected(format!(
                "{}: unexpected end of input",
                name
            )));
        }
        let body = String::from_utf8_lossy(input);
        Ok(format!("<!DOCTYPE html>\n<html><body>{body}</body></html>\n").into_bytes())
    }

    async fn probe(&self) -> Result<String, ConversionError> {
        Ok("echo 1.0".into())
    }
}

/// An engine whose binary is never there.
#[derive(Debug, Default)]
pub struct MissingEngine {
    pub calls: AtomicUsize,
}

impl MissingEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionEngine for MissingEngine {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn convert(
        &self,
        _input: &[u8],
        _name: &SanitizedName,
    ) -> Result<Vec<u8>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.unavailable())
    }

    async fn probe(&self) -> Result<String, ConversionError> {
        Err(self.unavailable())
    }
}

impl MissingEngine {
    fn unavailable(&self) -> ConversionError {
        ConversionError::EngineUnavailable {
            engine: "pandoc".into(),
            detail: "No such file or directory (os error 2)".into(),
        }
    }
}

/// Read every entry of a ZIP archive as `(name, body)`, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).expect("entry");
            let mut body = String::new();
            file.read_to_string(&mut body).expect("utf-8 entry");
            (file.name().to_string(), body)
        })
        .collect()
}

pub fn zip_names(bytes: &[u8]) -> Vec<String> {
    zip_entries(bytes).into_iter().map(|(name, _)| name).collect()
}

//! Archive assembly: pack converted HTML documents into one ZIP.
//!
//! The archive is written to an in-memory cursor; nothing touches disk.
//! Entry timestamps are pinned to the ZIP epoch (1980-01-01) so the same
//! conversions always yield byte-identical archives.
//!
//! ## Name collisions
//!
//! `report.docx` and `report.md` both map to `report.html`. The later
//! conversion wins: the archive holds a single `report.html` with the later
//! document's HTML, at the position where the name first appeared. This is a
//! known limitation, logged at warn level.

use crate::error::BatchError;
use crate::output::{ArchivePayload, ConvertedDocument};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Build the ZIP archive for `converted`, in order.
///
/// # Errors
/// [`BatchError::ArchiveFailed`] if the ZIP writer fails.
pub fn build_archive(converted: &[ConvertedDocument]) -> Result<ArchivePayload, BatchError> {
    let entries = resolve_entries(converted);

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, html) in &entries {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| BatchError::ArchiveFailed(format!("entry '{name}': {e}")))?;
        writer
            .write_all(html)
            .map_err(|e| BatchError::ArchiveFailed(format!("writing '{name}': {e}")))?;
    }

    let bytes = writer
        .finish()
        .map_err(|e| BatchError::ArchiveFailed(format!("finalising archive: {e}")))?
        .into_inner();

    debug!("Archive: {} entries, {} bytes", entries.len(), bytes.len());

    Ok(ArchivePayload {
        bytes,
        entries: entries.into_iter().map(|(name, _)| name).collect(),
    })
}

/// Collapse documents sharing an entry name, last write wins.
fn resolve_entries(converted: &[ConvertedDocument]) -> Vec<(String, &[u8])> {
    let mut entries: Vec<(String, &[u8])> = Vec::with_capacity(converted.len());
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(converted.len());

    for doc in converted {
        let name = doc.entry_name();
        match slots.get(&name) {
            Some(&slot) => {
                warn!(
                    "'{}' overwrites an earlier document in archive entry '{}'",
                    doc.source_name, name
                );
                entries[slot].1 = doc.html.as_slice();
            }
            None => {
                slots.insert(name.clone(), entries.len());
                entries.push((name, doc.html.as_slice()));
            }
        }
    }

    entries
}

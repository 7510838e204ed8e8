//! Filename sanitisation for client-supplied upload names.
//!
//! Browsers send whatever the user's file picker produced, and hostile
//! clients send whatever they like (`../../etc/passwd`, `C:\boot.ini`,
//! `CON.docx`). The sanitised name is used twice: as the file name inside the
//! engine's private temp workspace and as the stem of the archive entry, so it
//! must be a single, portable path component.
//!
//! ## Rules (applied in order)
//!
//! 1. Keep only the last path component (`/` and `\` both separate).
//! 2. Drop control characters and `< > : " | ? *`.
//! 3. Trim leading dots/whitespace and trailing dots/whitespace.
//! 4. Fall back to [`FALLBACK_NAME`] if nothing is left, or use it as the
//!    stem when only the extension survived (`???.docx` → `document.docx`).
//! 5. Suffix Windows device stems (`CON`, `LPT1`, …) with `_`.
//! 6. Truncate to [`NAME_MAX`] bytes, keeping a short extension.
//!
//! The result is idempotent: sanitising a sanitised name returns it unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// Replacement used when nothing usable survives sanitisation.
pub const FALLBACK_NAME: &str = "document";

/// Linux `NAME_MAX`; also a safe bound for ZIP entry names.
pub const NAME_MAX: usize = 255;

/// Longest extension treated as an extension when truncating.
const MAX_EXTENSION_LEN: usize = 16;

static RESERVED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\x00-\x1f\x7f<>:"|?*]"#).expect("valid regex"));

static DEVICE_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[1-9]|lpt[1-9])$").expect("valid regex")
});

/// A filename that is safe to use as a single path component.
///
/// Only constructed through [`sanitize`], so the invariants hold for every
/// value: non-empty, no `/` or `\`, no leading dot, at most [`NAME_MAX`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedName(String);

impl SanitizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name without its final extension (`report.v2.docx` → `report.v2`).
    pub fn base_name(&self) -> &str {
        match split_extension(&self.0) {
            Some((stem, _)) => stem,
            None => &self.0,
        }
    }

    /// The final extension without the dot, if there is one.
    pub fn extension(&self) -> Option<&str> {
        split_extension(&self.0).map(|(_, ext)| ext)
    }

    /// Name of the archive entry holding this document's HTML.
    pub fn html_entry_name(&self) -> String {
        format!("{}.html", self.base_name())
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for SanitizedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Normalise an untrusted filename into a [`SanitizedName`]. Never fails.
pub fn sanitize(raw: &str) -> SanitizedName {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = RESERVED_CHARS.replace_all(last, "");
    let trimmed = trim_name(&cleaned);

    if trimmed.is_empty() {
        return SanitizedName(FALLBACK_NAME.to_string());
    }

    // `???.docx`, `.docx`: the stem is gone but the extension still names the format.
    if let Some(ext) = orphan_extension(&cleaned) {
        return SanitizedName(format!("{FALLBACK_NAME}.{ext}"));
    }

    let name = match split_extension(trimmed) {
        Some((stem, ext)) if DEVICE_STEM.is_match(stem) => format!("{stem}_.{ext}"),
        None if DEVICE_STEM.is_match(trimmed) => format!("{trimmed}_"),
        _ => trimmed.to_string(),
    };

    SanitizedName(truncate(name))
}

fn trim_name(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Split `name` into `(stem, ext)` when the part after the last dot looks
/// like a real extension and the stem is non-empty.
fn split_extension(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    let (stem, ext) = (&name[..dot], &name[dot + 1..]);
    (!stem.is_empty() && is_extension(ext)).then_some((stem, ext))
}

/// The extension of `name` when everything before its last dot trims away.
fn orphan_extension(name: &str) -> Option<&str> {
    let name = name.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    let dot = name.rfind('.')?;
    let (stem, ext) = (&name[..dot], &name[dot + 1..]);
    (trim_name(stem).is_empty() && is_extension(ext)).then_some(ext)
}

fn is_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn truncate(name: String) -> String {
    if name.len() <= NAME_MAX {
        return name;
    }

    match split_extension(&name) {
        Some((stem, ext)) => {
            let stem = trim_name(floor_char_boundary(stem, NAME_MAX - ext.len() - 1));
            if stem.is_empty() {
                FALLBACK_NAME.to_string()
            } else {
                format!("{stem}.{ext}")
            }
        }
        None => {
            let cut = trim_name(floor_char_boundary(&name, NAME_MAX));
            if cut.is_empty() {
                FALLBACK_NAME.to_string()
            } else {
                cut.to_string()
            }
        }
    }
}

fn floor_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut take = max;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}

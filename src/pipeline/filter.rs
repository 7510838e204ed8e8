//! Upload filters: decide which sanitised names are worth sending to the engine.
//!
//! Two policies are in common use. The strict one accepts only extensions the
//! deployment knows its engine handles (historically `docx` alone) and skips
//! everything else. The permissive one sends every named upload to the engine
//! and lets it reject what it cannot read. Both are expressed as an
//! [`UploadFilter`]; items a filter rejects are *skipped*, never failed.

use crate::pipeline::sanitize::SanitizedName;
use std::collections::BTreeSet;
use std::fmt;

/// Predicate applied to each sanitised upload name before conversion.
pub trait UploadFilter: Send + Sync {
    fn accepts(&self, name: &SanitizedName) -> bool;
}

impl<F> UploadFilter for F
where
    F: Fn(&SanitizedName) -> bool + Send + Sync,
{
    fn accepts(&self, name: &SanitizedName) -> bool {
        self(name)
    }
}

/// Extension-based filter. Extensions are compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtensionFilter {
    /// Attempt every named upload. (default)
    #[default]
    Any,
    /// Attempt only names whose extension is in the set.
    Allow(BTreeSet<String>),
}

impl ExtensionFilter {
    pub fn any() -> Self {
        ExtensionFilter::Any
    }

    /// Build an allow-list. Leading dots are tolerated (`".docx"` == `"docx"`).
    pub fn allow<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ExtensionFilter::Allow(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }
}

impl UploadFilter for ExtensionFilter {
    fn accepts(&self, name: &SanitizedName) -> bool {
        match self {
            ExtensionFilter::Any => true,
            ExtensionFilter::Allow(allowed) => name
                .extension()
                .is_some_and(|ext| allowed.contains(&ext.to_ascii_lowercase())),
        }
    }
}

impl fmt::Display for ExtensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionFilter::Any => f.write_str("any"),
            ExtensionFilter::Allow(allowed) => {
                let list: Vec<&str> = allowed.iter().map(String::as_str).collect();
                f.write_str(&list.join(","))
            }
        }
    }
}

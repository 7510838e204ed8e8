//! Configuration types for batch conversion.
//!
//! Two structs split the knobs by who consumes them:
//!
//! * [`PandocConfig`]: how the [`crate::pipeline::engine::PandocEngine`] invokes the
//!   pandoc binary (path, timeout, embed flag, temp root).
//! * [`BatchConfig`]: how the orchestrator walks an upload set (filter,
//!   concurrency, progress callback).
//!
//! Both are built via a builder that validates on `build()`, so a bad value
//! from the CLI or environment surfaces as [`BatchError::InvalidConfig`]
//! before any request is served.

use crate::error::BatchError;
use crate::pipeline::filter::{ExtensionFilter, UploadFilter};
use crate::progress::BatchProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ── Pandoc ───────────────────────────────────────────────────────────────

/// How pandoc is asked to inline images, stylesheets and scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmbedMode {
    /// `--embed-resources` (pandoc ≥ 2.19). (default)
    #[default]
    EmbedResources,
    /// `--self-contained`, deprecated in newer pandoc but the only option on
    /// older installs.
    SelfContained,
}

impl EmbedMode {
    pub fn flag(self) -> &'static str {
        match self {
            EmbedMode::EmbedResources => "--embed-resources",
            EmbedMode::SelfContained => "--self-contained",
        }
    }
}

/// Settings for the pandoc-backed conversion engine.
///
/// # Example
/// ```rust
/// use doc2html::PandocConfig;
///
/// let config = PandocConfig::builder()
///     .program("/usr/local/bin/pandoc")
///     .timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout.as_secs(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct PandocConfig {
    /// Executable name or path. Default: `pandoc` (resolved through `PATH`).
    pub program: PathBuf,

    /// Upper bound on a single conversion. Default: 120 s.
    ///
    /// pandoc can spin for a long time on pathological input (deeply nested
    /// lists, huge embedded images). Expiry fails that one document only.
    pub timeout: Duration,

    /// Resource-embedding flag. Default: [`EmbedMode::EmbedResources`].
    pub embed: EmbedMode,

    /// Extra arguments appended after the standard ones.
    pub extra_args: Vec<String>,

    /// Parent directory for per-conversion workspaces. Default: OS temp dir.
    pub temp_root: Option<PathBuf>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
            timeout: Duration::from_secs(120),
            embed: EmbedMode::default(),
            extra_args: Vec::new(),
            temp_root: None,
        }
    }
}

impl PandocConfig {
    pub fn builder() -> PandocConfigBuilder {
        PandocConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PandocConfig`].
#[derive(Debug)]
pub struct PandocConfigBuilder {
    config: PandocConfig,
}

impl PandocConfigBuilder {
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.program = program.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn embed(mut self, mode: EmbedMode) -> Self {
        self.config.embed = mode;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PandocConfig, BatchError> {
        let c = &self.config;
        if c.program.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig(
                "pandoc program path must not be empty".into(),
            ));
        }
        if c.timeout.is_zero() {
            return Err(BatchError::InvalidConfig(
                "conversion timeout must be ≥ 1s".into(),
            ));
        }
        if let Some(root) = &c.temp_root {
            if !root.is_dir() {
                return Err(BatchError::InvalidConfig(format!(
                    "temp root '{}' is not a directory",
                    root.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Batch ────────────────────────────────────────────────────────────────

/// Settings for one pass of the batch orchestrator.
///
/// Cheap to clone: the filter and callback are shared behind `Arc`.
#[derive(Clone)]
pub struct BatchConfig {
    /// Which sanitised names are attempted. Default: [`ExtensionFilter::Any`].
    pub filter: Arc<dyn UploadFilter>,

    /// Conversions in flight at once. Default: 1 (strictly sequential).
    ///
    /// Values above 1 still produce archive entries in upload order.
    pub concurrency: usize,

    /// Optional per-document progress events.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            filter: Arc::new(ExtensionFilter::default()),
            concurrency: 1,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("filter", &"<dyn UploadFilter>")
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn filter(mut self, filter: impl UploadFilter + 'static) -> Self {
        self.config.filter = Arc::new(filter);
        self
    }

    /// Shorthand for an [`ExtensionFilter::allow`] filter.
    pub fn allow_extensions<I, S>(self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter(ExtensionFilter::allow(extensions))
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<BatchConfig, BatchError> {
        if self.config.concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

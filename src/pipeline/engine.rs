//! Conversion engines: turn one uploaded document into self-contained HTML.
//!
//! The orchestrator only sees the [`ConversionEngine`] trait, so tests can
//! swap in an in-memory engine and deployments could swap pandoc for another
//! converter without touching batch logic.
//!
//! ## Why a private temp directory per document?
//!
//! pandoc reads and writes files, infers the input format from the file
//! extension, and resolves relative resources (images referenced by a
//! Markdown file) against its working directory. Each conversion therefore
//! gets its own [`TempDir`] holding `input/<name>` and `output/<base>.html`.
//! The directory is removed when the [`Workspace`] is dropped, which covers
//! success, engine failure, timeout, and the batch being cancelled mid-flight.

use crate::config::PandocConfig;
use crate::error::{ConversionError, FailureReason};
use crate::pipeline::sanitize::SanitizedName;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest engine diagnostic kept in an error, in bytes.
const MAX_DETAIL_LEN: usize = 4096;

/// How long `probe()` waits for `--version`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// An external document-to-HTML converter.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Short human-readable engine name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Convert `input` (the uploaded bytes of `name`) into a standalone HTML
    /// document with all resources embedded.
    ///
    /// # Errors
    /// - [`ConversionError::EngineUnavailable`] if the engine cannot run at all
    /// - [`ConversionError::ConversionFailed`] if this input was rejected
    async fn convert(&self, input: &[u8], name: &SanitizedName)
        -> Result<Vec<u8>, ConversionError>;

    /// Check the engine is runnable and return its version string.
    async fn probe(&self) -> Result<String, ConversionError>;
}

/// [`ConversionEngine`] backed by the `pandoc` command-line tool.
#[derive(Debug, Clone)]
pub struct PandocEngine {
    config: PandocConfig,
    name: String,
}

impl PandocEngine {
    pub fn new(config: PandocConfig) -> Self {
        let name = config
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.program.display().to_string());
        Self { config, name }
    }

    pub fn config(&self) -> &PandocConfig {
        &self.config
    }

    /// Build the pandoc invocation for one workspace.
    fn command(&self, workspace: &Workspace) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg(&workspace.input)
            .arg("--to")
            .arg("html")
            .arg("--output")
            .arg(&workspace.output)
            .arg("--standalone")
            .arg(self.config.embed.flag())
            .args(&self.config.extra_args)
            .current_dir(workspace.input_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Classify an error from spawning the engine process.
    fn spawn_error(&self, e: io::Error) -> ConversionError {
        match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                ConversionError::EngineUnavailable {
                    engine: self.name.clone(),
                    detail: format!("{}: {e}", self.config.program.display()),
                }
            }
            _ => ConversionError::workspace(format!("failed to start {}: {e}", self.name)),
        }
    }
}

impl Default for PandocEngine {
    fn default() -> Self {
        Self::new(PandocConfig::default())
    }
}

#[async_trait]
impl ConversionEngine for PandocEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(
        &self,
        input: &[u8],
        name: &SanitizedName,
    ) -> Result<Vec<u8>, ConversionError> {
        let start = Instant::now();
        let workspace = Workspace::create(self.config.temp_root.as_deref(), name)
            .map_err(|e| ConversionError::workspace(format!("cannot create workspace: {e}")))?;

        tokio::fs::write(&workspace.input, input)
            .await
            .map_err(|e| ConversionError::workspace(format!("cannot stage input: {e}")))?;

        let run = self.command(&workspace).output();
        let output = match tokio::time::timeout(self.config.timeout, run).await {
            Err(_) => {
                warn!(
                    "{}: {} did not finish within {:?}",
                    name, self.name, self.config.timeout
                );
                return Err(ConversionError::ConversionFailed {
                    reason: FailureReason::TimedOut,
                    detail: format!(
                        "{} timed out after {}s",
                        self.name,
                        self.config.timeout.as_secs_f32()
                    ),
                });
            }
            Ok(Err(e)) => return Err(self.spawn_error(e)),
            Ok(Ok(output)) => output,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.name, output.status)
            } else {
                clip(stderr.trim()).to_string()
            };
            return Err(ConversionError::rejected(detail));
        }
        if !stderr.trim().is_empty() {
            debug!("{}: {} stderr: {}", name, self.name, stderr.trim());
        }

        let html = tokio::fs::read(&workspace.output).await.map_err(|e| {
            ConversionError::workspace(format!("{} produced no readable output: {e}", self.name))
        })?;

        debug!(
            "{}: {} bytes → {} bytes HTML in {}ms",
            name,
            input.len(),
            html.len(),
            start.elapsed().as_millis()
        );
        Ok(html)
    }

    async fn probe(&self) -> Result<String, ConversionError> {
        let run = Command::new(&self.config.program)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(PROBE_TIMEOUT, run).await {
            Err(_) => {
                return Err(ConversionError::EngineUnavailable {
                    engine: self.name.clone(),
                    detail: format!("--version did not answer within {PROBE_TIMEOUT:?}"),
                })
            }
            Ok(Err(e)) => {
                return Err(ConversionError::EngineUnavailable {
                    engine: self.name.clone(),
                    detail: format!("{}: {e}", self.config.program.display()),
                })
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(ConversionError::EngineUnavailable {
                engine: self.name.clone(),
                detail: format!("--version exited with {}", output.status),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

/// Scoped, process-private staging area for one conversion.
///
/// The whole tree goes away when `dir` drops.
struct Workspace {
    input: PathBuf,
    output: PathBuf,
    dir: TempDir,
}

impl Workspace {
    fn create(root: Option<&Path>, name: &SanitizedName) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("doc2html-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let input_dir = dir.path().join("input");
        let output_dir = dir.path().join("output");
        std::fs::create_dir(&input_dir)?;
        std::fs::create_dir(&output_dir)?;

        Ok(Self {
            input: input_dir.join(name.as_str()),
            output: output_dir.join(name.html_entry_name()),
            dir,
        })
    }

    fn input_dir(&self) -> PathBuf {
        self.dir.path().join("input")
    }
}

/// Cut `s` to at most [`MAX_DETAIL_LEN`] bytes on a char boundary.
fn clip(s: &str) -> &str {
    if s.len() <= MAX_DETAIL_LEN {
        return s;
    }
    let mut end = MAX_DETAIL_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

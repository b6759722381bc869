//! Configuration types for Markdown-to-document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config between the single-file and batch paths and to
//! diff two runs to understand why their outputs differ.
//!
//! Environment lookups (`PANDOC_PATH`, `MD2DOC_TEMPLATE`) happen exactly once,
//! in [`ConversionConfig::from_env`] — never inside deep call chains. Code that
//! receives a config can trust that what is in the struct is the whole story.

use crate::error::Md2DocError;
use crate::progress::BatchProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding the pandoc executable path.
pub const ENV_PANDOC_PATH: &str = "PANDOC_PATH";

/// Environment variable overriding the default docx template path.
pub const ENV_DEFAULT_TEMPLATE: &str = "MD2DOC_TEMPLATE";

/// Configuration for a conversion run (single file or batch).
///
/// Built via [`ConversionConfig::builder()`], [`ConversionConfig::default()`],
/// or [`ConversionConfig::from_env()`].
///
/// # Example
/// ```rust
/// use md2doc::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .render_diagrams(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Explicit path to the pandoc executable. `None` means: search `PATH`.
    pub pandoc_path: Option<PathBuf>,

    /// Default docx reference template, used when neither the CLI nor the
    /// profile supplies one.
    pub default_template: Option<PathBuf>,

    /// Preferred PDF engine. `None` means: probe the candidate list in order.
    pub pdf_engine: Option<PdfEngine>,

    /// What to do with frontmatter keys outside the recognized set.
    /// Default: [`UnknownKeyPolicy::Drop`].
    pub unknown_keys: UnknownKeyPolicy,

    /// Render fenced mermaid blocks to images via the external `mmdc` CLI
    /// before conversion. When `mmdc` is missing this degrades to a warning.
    /// Default: true.
    pub render_diagrams: bool,

    /// Upper bound on a single engine subprocess call. Default: `None`.
    ///
    /// `None` means the call is unbounded — pandoc (and a LaTeX run behind
    /// it) can legitimately take minutes on large documents, so the default
    /// trusts the external tool. Set a bound when converting untrusted input
    /// in automation; a timed-out call is reported as a conversion failure.
    pub engine_timeout: Option<Duration>,

    /// Per-file progress events for batch runs. `None` disables reporting.
    pub progress: Option<Arc<dyn BatchProgressCallback>>,
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("pandoc_path", &self.pandoc_path)
            .field("default_template", &self.default_template)
            .field("pdf_engine", &self.pdf_engine)
            .field("unknown_keys", &self.unknown_keys)
            .field("render_diagrams", &self.render_diagrams)
            .field("engine_timeout", &self.engine_timeout)
            .field("progress", &self.progress.as_ref().map(|_| "<dyn BatchProgressCallback>"))
            .finish()
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            pandoc_path: None,
            default_template: None,
            pdf_engine: None,
            unknown_keys: UnknownKeyPolicy::default(),
            render_diagrams: true,
            engine_timeout: None,
            progress: None,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config with defaults plus the process environment applied.
    ///
    /// Reads `PANDOC_PATH` and `MD2DOC_TEMPLATE`. This is the only place the
    /// library touches the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(p) = std::env::var(ENV_PANDOC_PATH) {
            if !p.is_empty() {
                config.pandoc_path = Some(PathBuf::from(p));
            }
        }
        if let Ok(t) = std::env::var(ENV_DEFAULT_TEMPLATE) {
            if !t.is_empty() {
                config.default_template = Some(PathBuf::from(t));
            }
        }
        config
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn pandoc_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.pandoc_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn default_template(mut self, path: impl AsRef<Path>) -> Self {
        self.config.default_template = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn pdf_engine(mut self, engine: PdfEngine) -> Self {
        self.config.pdf_engine = Some(engine);
        self
    }

    pub fn unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.config.unknown_keys = policy;
        self
    }

    pub fn render_diagrams(mut self, v: bool) -> Self {
        self.config.render_diagrams = v;
        self
    }

    pub fn engine_timeout(mut self, timeout: Duration) -> Self {
        self.config.engine_timeout = Some(timeout);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2DocError> {
        if let Some(t) = self.config.engine_timeout {
            if t.is_zero() {
                return Err(Md2DocError::InvalidConfig(
                    "engine_timeout must be greater than zero".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Word document, optionally styled by a reference template.
    Docx,
    /// PDF, produced through an external LaTeX engine.
    Pdf,
}

impl TargetFormat {
    /// All supported formats, in the order they are listed to users.
    pub const ALL: [TargetFormat; 2] = [TargetFormat::Docx, TargetFormat::Pdf];

    /// Parse a user-supplied format name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, Md2DocError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(TargetFormat::Docx),
            "pdf" => Ok(TargetFormat::Pdf),
            other => Err(Md2DocError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    /// The format name as pandoc's `-t` argument expects it.
    pub fn pandoc_name(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Pdf => "pdf",
        }
    }

    /// File extension, without the leading dot.
    pub fn extension(&self) -> &'static str {
        self.pandoc_name()
    }
}

impl Default for TargetFormat {
    fn default() -> Self {
        TargetFormat::Docx
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pandoc_name())
    }
}

/// Parse a comma-separated `--formats` list.
///
/// Entries are trimmed and lowercased; empty entries from stray commas are
/// dropped; unknown names are rejected naming the valid set; duplicates are
/// removed preserving first occurrence. An effectively empty list is an error.
pub fn parse_format_list(s: &str) -> Result<Vec<TargetFormat>, Md2DocError> {
    let mut formats: Vec<TargetFormat> = Vec::new();
    for entry in s.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let format = TargetFormat::parse(entry)?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        return Err(Md2DocError::InvalidConfig(
            "--formats must contain at least one valid format (docx, pdf)".into(),
        ));
    }
    Ok(formats)
}

/// External LaTeX engines pandoc can drive for PDF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngine {
    Xelatex,
    Lualatex,
    Pdflatex,
}

impl PdfEngine {
    /// Autodetection candidates, in fixed preference order.
    pub const CANDIDATES: [PdfEngine; 3] =
        [PdfEngine::Xelatex, PdfEngine::Lualatex, PdfEngine::Pdflatex];

    /// Executable name to probe on `PATH` and pass to `--pdf-engine`.
    pub fn executable(&self) -> &'static str {
        match self {
            PdfEngine::Xelatex => "xelatex",
            PdfEngine::Lualatex => "lualatex",
            PdfEngine::Pdflatex => "pdflatex",
        }
    }

    /// Parse a user-supplied engine name.
    pub fn parse(s: &str) -> Result<Self, Md2DocError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xelatex" => Ok(PdfEngine::Xelatex),
            "lualatex" => Ok(PdfEngine::Lualatex),
            "pdflatex" => Ok(PdfEngine::Pdflatex),
            other => Err(Md2DocError::InvalidConfig(format!(
                "unknown PDF engine '{other}' (expected xelatex, lualatex, or pdflatex)"
            ))),
        }
    }
}

impl fmt::Display for PdfEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

/// Policy for frontmatter keys outside the recognized set.
///
/// The recognized set is fixed ([`crate::metadata::RECOGNIZED_KEYS`]); what
/// happens to everything else is a deliberate, named choice rather than an
/// implicit parser behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    /// Silently drop unrecognized keys (logged at debug level). Default.
    #[default]
    Drop,
    /// Forward unrecognized keys to the engine unmodified.
    Passthrough,
}

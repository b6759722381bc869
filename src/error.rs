//! Error types for the md2doc library.
//!
//! Two distinct failure modes exist:
//!
//! * [`Md2DocError`] — **Fatal** for the current operation: the conversion
//!   cannot proceed at all (missing input, pandoc not installed, no LaTeX
//!   engine for a PDF target). Returned as `Err(Md2DocError)` from the
//!   top-level `convert*` functions.
//!
//! * Per-file failures inside a batch run. These reuse [`Md2DocError`] but
//!   are stored inside [`crate::batch::FileOutcome`] rather than propagated,
//!   so one broken document never aborts the rest of the batch. Only
//!   directory-level setup errors (bad source or destination directory) are
//!   fatal to a whole batch.
//!
//! There are no retries: every failure here is a deterministic configuration
//! or environment problem, not a transient one.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the md2doc library.
#[derive(Debug, Error)]
pub enum Md2DocError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file or directory was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input path exists but is not a regular file.
    #[error("Input path is not a file: '{path}'")]
    NotAFile { path: PathBuf },

    /// The batch source path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// The input file exists but could not be read.
    #[error("Cannot read input file '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Frontmatter errors ────────────────────────────────────────────────
    /// A frontmatter block was opened with `---` but never closed.
    #[error(
        "Unterminated frontmatter block in '{path}': opening '---' on line 1 \
         has no closing '---' before end of file"
    )]
    FrontmatterUnterminated { path: PathBuf },

    // ── Profile errors ────────────────────────────────────────────────────
    /// The requested conversion profile is not registered.
    #[error("Profile '{name}' not found. Available profiles: {available}")]
    ProfileNotFound { name: String, available: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The pandoc executable could not be located.
    #[error(
        "Pandoc not found{}.\n\
         Install pandoc (https://pandoc.org/installing.html) or point \
         PANDOC_PATH / --pandoc-path at the executable.",
        .path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default()
    )]
    PandocNotFound { path: Option<PathBuf> },

    /// No LaTeX engine is available for a PDF target.
    #[error(
        "No PDF engine (LaTeX) found; tried {tried}.\n\
         Install a LaTeX distribution:\n\
         - Linux: texlive-xetex, texlive-luatex, or texlive-latex-base\n\
         - macOS: MacTeX (https://www.tug.org/mactex/)\n\
         - Windows: MiKTeX (https://miktex.org/) or TeX Live (https://www.tug.org/texlive/)"
    )]
    PdfEngineNotFound { tried: String },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The engine exited nonzero (or could not be spawned, or timed out).
    #[error("Pandoc conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The engine exited zero but the declared output file does not exist.
    #[error("Pandoc completed but output file was not created: '{path}'")]
    OutputMissing { path: PathBuf },

    /// The engine exited zero but the output file is zero bytes.
    #[error("Pandoc completed but output file is empty: '{path}'")]
    OutputEmpty { path: PathBuf },

    // ── Output path errors ────────────────────────────────────────────────
    /// The destination path cannot be used (e.g. it is an existing directory
    /// where a file was expected, or vice versa).
    #[error("Invalid output path '{path}': {detail}")]
    OutputPathInvalid { path: PathBuf, detail: String },

    /// Creating the output directory or writing next to it failed.
    #[error("Failed to prepare output location '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or CLI validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An output format outside the supported set was requested.
    #[error("Unsupported output format '{format}'. Supported: docx, pdf")]
    UnsupportedFormat { format: String },

    // ── Diagram errors ────────────────────────────────────────────────────
    /// The external mermaid CLI failed to render a diagram.
    #[error("Mermaid rendering failed: {detail}")]
    DiagramRenderFailed { detail: String },
}

impl Md2DocError {
    /// True when the error is a missing external tool the user must install,
    /// as opposed to a problem with a specific document.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Md2DocError::PandocNotFound { .. } | Md2DocError::PdfEngineNotFound { .. }
        )
    }
}

//! Batch conversion: walk a source directory and convert every Markdown
//! file, isolating per-file failures.
//!
//! ## Failure isolation
//!
//! A batch run touches many documents; one corrupt file must not cost the
//! user the other forty-nine. Every error below the directory level —
//! frontmatter, engine, artifact validation — is captured in that
//! (file, format) pair's [`FileOutcome`] and the walk continues. Only setup
//! errors (missing source directory, unusable destination) abort the run.
//!
//! ## Ordering
//!
//! Files are discovered in sorted order so batch runs are deterministic and
//! the collision resolver assigns `_2`, `_3`, … suffixes reproducibly.

use crate::config::{PdfEngine, TargetFormat};
use crate::convert::{ConvertJob, Converter};
use crate::error::Md2DocError;
use crate::frontmatter;
use crate::naming::{output_file_name, NameRegistry, Resolution};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Options for one batch invocation.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Mirror subdirectories of the source into the destination.
    pub recursive: bool,
    /// Overwrite pre-existing output files instead of skipping them.
    pub overwrite: bool,
    /// Profile applied to every file.
    pub profile: Option<String>,
    /// Template applied to every docx conversion.
    pub template: Option<PathBuf>,
    /// Formats produced per file; empty means docx only.
    pub formats: Vec<TargetFormat>,
    /// Explicit PDF engine for PDF targets.
    pub pdf_engine: Option<PdfEngine>,
}

/// Terminal state of one (file, format) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// Record of one conversion attempt within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub format: TargetFormat,
    pub status: OutcomeStatus,
    /// Produced (or, for skips, blocking) output path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Human-readable error detail for failed attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated result of a batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One record per attempted (file, format) pair, in discovery order.
    pub outcomes: Vec<FileOutcome>,
}

impl BatchResult {
    /// True when nothing failed (skips are not failures).
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            OutcomeStatus::Succeeded => self.succeeded += 1,
            OutcomeStatus::Skipped => self.skipped += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch conversion complete: {} successful, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}

/// Convert every Markdown file under `input_dir` into `output_dir`.
pub async fn convert_batch(
    converter: &Converter,
    input_dir: &Path,
    output_dir: &Path,
    options: &BatchOptions,
) -> Result<BatchResult, Md2DocError> {
    if !input_dir.exists() {
        return Err(Md2DocError::InputNotFound {
            path: input_dir.to_path_buf(),
        });
    }
    if !input_dir.is_dir() {
        return Err(Md2DocError::NotADirectory {
            path: input_dir.to_path_buf(),
        });
    }
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(Md2DocError::OutputPathInvalid {
            path: output_dir.to_path_buf(),
            detail: "destination exists and is not a directory".into(),
        });
    }
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Md2DocError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let mut result = BatchResult::default();

    let files = discover_files(input_dir, options.recursive);
    if files.is_empty() {
        warn!("no Markdown files found in {}", input_dir.display());
        return Ok(result);
    }

    let formats: Vec<TargetFormat> = if options.formats.is_empty() {
        vec![TargetFormat::Docx]
    } else {
        options.formats.clone()
    };

    info!("found {} Markdown file(s) to process", files.len());
    info!(
        "output formats: {}",
        formats
            .iter()
            .map(TargetFormat::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let progress = converter.config().progress.clone();
    if let Some(cb) = &progress {
        cb.on_batch_start(files.len() * formats.len());
    }

    // Claimed output names for this run only; dropped with the function.
    let mut registry = NameRegistry::new();

    for file in &files {
        let output_subdir = if options.recursive {
            match file.strip_prefix(input_dir).ok().and_then(Path::parent) {
                Some(rel) => output_dir.join(rel),
                None => output_dir.to_path_buf(),
            }
        } else {
            output_dir.to_path_buf()
        };

        // The title drives output naming. A frontmatter error fails this
        // file for every requested format but never the batch.
        let title = match frontmatter::parse_file(file, converter.config().unknown_keys).await {
            Ok(parsed) => parsed.metadata.title,
            Err(e) => {
                warn!("failed to parse {}: {e}", file.display());
                for format in &formats {
                    let outcome = FileOutcome {
                        source: file.clone(),
                        format: *format,
                        status: OutcomeStatus::Failed,
                        output: None,
                        error: Some(e.to_string()),
                    };
                    if let Some(cb) = &progress {
                        cb.on_file_start(file, *format);
                        cb.on_file_done(&outcome);
                    }
                    result.record(outcome);
                }
                continue;
            }
        };

        for format in &formats {
            if let Some(cb) = &progress {
                cb.on_file_start(file, *format);
            }

            let file_name = output_file_name(file, title.as_deref(), None, *format);
            let outcome = match registry.resolve(&output_subdir, &file_name, options.overwrite)
            {
                Resolution::Skip(existing) => {
                    info!(
                        "skipping {} -> {format} (output exists: {})",
                        file.display(),
                        existing.display()
                    );
                    FileOutcome {
                        source: file.clone(),
                        format: *format,
                        status: OutcomeStatus::Skipped,
                        output: Some(existing),
                        error: None,
                    }
                }
                Resolution::Claim(output_path) => {
                    convert_one(converter, file, output_path, *format, options).await
                }
            };

            if let Some(cb) = &progress {
                cb.on_file_done(&outcome);
            }
            result.record(outcome);
        }
    }

    if let Some(cb) = &progress {
        cb.on_batch_complete(result.succeeded, result.skipped, result.failed);
    }
    info!("{result}");
    Ok(result)
}

/// Run the single-file path for one claimed output, capturing any error.
async fn convert_one(
    converter: &Converter,
    file: &Path,
    output_path: PathBuf,
    format: TargetFormat,
    options: &BatchOptions,
) -> FileOutcome {
    let job = ConvertJob {
        input: file.to_path_buf(),
        output: Some(output_path.clone()),
        template: options.template.clone(),
        profile: options.profile.clone(),
        overrides: Vec::new(),
        extra_args: Vec::new(),
        format,
        pdf_engine: options.pdf_engine,
    };

    match converter.convert(&job).await {
        Ok(produced) => FileOutcome {
            source: file.to_path_buf(),
            format,
            status: OutcomeStatus::Succeeded,
            output: Some(produced),
            error: None,
        },
        Err(e) => {
            warn!("failed to convert {} to {format}: {e}", file.display());
            FileOutcome {
                source: file.to_path_buf(),
                format,
                status: OutcomeStatus::Failed,
                output: Some(output_path),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Enumerate Markdown files (by `.md` extension, case-insensitive) in sorted
/// order. Recursive mode walks subdirectories depth-first.
fn discover_files(input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    WalkDir::new(input_dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map(|e| e.eq_ignore_ascii_case("md"))
                .unwrap_or(false)
        })
        .collect()
}

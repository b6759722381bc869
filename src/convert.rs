//! Single-document conversion: the path every conversion takes, whether
//! invoked directly or per file by the batch orchestrator.
//!
//! ## Pipeline
//!
//! ```text
//! input.md
//!  │
//!  ├─ 1. Validate   file exists, .md extension (warn otherwise)
//!  ├─ 2. Frontmatter  split metadata block from body
//!  ├─ 3. Diagrams   render mermaid blocks via mmdc (optional, degradable)
//!  ├─ 4. Merge      CLI metadata overrides win over frontmatter
//!  ├─ 5. Resolve    profile, template, output path
//!  └─ 6. Engine     pandoc subprocess + artifact validation
//! ```
//!
//! Every resolution step prefers the most explicit source: a caller-supplied
//! value beats the profile, which beats the config default.

use crate::config::{ConversionConfig, PdfEngine, TargetFormat};
use crate::diagram;
use crate::error::Md2DocError;
use crate::frontmatter;
use crate::metadata::DocumentMetadata;
use crate::naming::output_file_name;
use crate::pandoc::{ConversionRequest, Pandoc};
use crate::profiles::{Profile, ProfileRegistry};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One conversion order: what to convert, where to, and with which knobs.
///
/// Everything optional falls back through profile and config defaults.
#[derive(Debug, Clone, Default)]
pub struct ConvertJob {
    pub input: PathBuf,
    /// Explicit output path; derived from metadata/profile when `None`.
    pub output: Option<PathBuf>,
    /// Explicit docx template, overriding profile and config defaults.
    pub template: Option<PathBuf>,
    /// Profile name to look up; unknown names are an error.
    pub profile: Option<String>,
    /// Metadata overrides (`key=value` pairs from the CLI); win per key.
    pub overrides: Vec<(String, String)>,
    /// Additional engine arguments, appended after the profile's.
    pub extra_args: Vec<String>,
    pub format: TargetFormat,
    /// Explicit PDF engine choice for PDF targets.
    pub pdf_engine: Option<PdfEngine>,
}

impl ConvertJob {
    /// A job with defaults for everything but the input path.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }
}

/// Service owning the resolved engine handle, profile registry, and config.
///
/// Construct once, convert many times; the batch orchestrator borrows it for
/// every file in a run.
#[derive(Debug)]
pub struct Converter {
    config: ConversionConfig,
    profiles: ProfileRegistry,
    pandoc: Pandoc,
}

impl Converter {
    /// Create a converter with the built-in profiles.
    ///
    /// Fails fast with `PandocNotFound` when the engine cannot be located —
    /// better at construction than halfway through a batch.
    pub fn new(config: ConversionConfig) -> Result<Self, Md2DocError> {
        Self::with_profiles(config, ProfileRegistry::with_builtins())
    }

    /// Create a converter with a caller-supplied profile registry.
    pub fn with_profiles(
        config: ConversionConfig,
        profiles: ProfileRegistry,
    ) -> Result<Self, Md2DocError> {
        let pandoc = Pandoc::new(&config)?;
        Ok(Self {
            config,
            profiles,
            pandoc,
        })
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    /// Convert one document. Returns the path of the produced artifact.
    pub async fn convert(&self, job: &ConvertJob) -> Result<PathBuf, Md2DocError> {
        let input = &job.input;
        if !input.exists() {
            return Err(Md2DocError::InputNotFound {
                path: input.clone(),
            });
        }
        if !input.is_file() {
            return Err(Md2DocError::NotAFile {
                path: input.clone(),
            });
        }
        if input
            .extension()
            .map(|e| !e.eq_ignore_ascii_case("md"))
            .unwrap_or(true)
        {
            warn!("input file does not have .md extension: {}", input.display());
        }

        let parsed = frontmatter::parse_file(input, self.config.unknown_keys).await?;

        // Profile before anything derived from it.
        let profile = match &job.profile {
            Some(name) => Some(self.profiles.get(name)?),
            None => None,
        };
        if let Some(p) = profile {
            info!("using profile: {}", p.name);
        }

        let format = effective_format(job.format, profile);
        let template = self.resolve_template(job, profile, input.parent());
        let output = resolve_output_path(job, profile, &parsed.metadata, input, format)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Md2DocError::OutputWriteFailed {
                    path: parent.to_path_buf(),
                    source: e,
                }
            })?;
        }

        let mut metadata = parsed.metadata.clone();
        metadata.apply_overrides(job.overrides.iter().cloned());

        let mut extra_args: Vec<String> = Vec::new();
        if let Some(p) = profile {
            extra_args.extend(p.pandoc_args.iter().cloned());
        }
        extra_args.extend(job.extra_args.iter().cloned());

        // Diagram preprocessing may substitute a temp file for the input;
        // the handle keeps the temp file alive until the engine is done.
        let (engine_input, _temp_guard, images) =
            self.preprocess_diagrams(input, &parsed.body).await?;

        let request = ConversionRequest {
            input: engine_input,
            output: output.clone(),
            format,
            template,
            pdf_engine: job.pdf_engine.or(self.config.pdf_engine),
            variables: metadata.to_pandoc_variables(),
            extra_args,
        };

        info!(
            "converting {} to {} (format: {format})",
            input.display(),
            output.display()
        );

        let result = self.pandoc.convert(&request).await;

        // Generated diagram images are cleaned up whether or not the engine
        // call succeeded.
        if !images.is_empty() {
            diagram::cleanup_generated_images(&images).await;
        }

        result.map(|()| output)
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn convert_sync(&self, job: &ConvertJob) -> Result<PathBuf, Md2DocError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| {
                Md2DocError::ConversionFailed {
                    detail: format!("failed to create tokio runtime: {e}"),
                }
            })?
            .block_on(self.convert(job))
    }

    /// Template precedence: job > profile > config default.
    fn resolve_template(
        &self,
        job: &ConvertJob,
        profile: Option<&Profile>,
        base_dir: Option<&Path>,
    ) -> Option<PathBuf> {
        if let Some(explicit) = &job.template {
            // Keep an unresolvable explicit path as-is so the engine adapter
            // can warn with the name the user typed.
            return Some(resolve_relative(explicit, base_dir));
        }
        if let Some(from_profile) = profile.and_then(|p| p.template_path(base_dir)) {
            return Some(from_profile);
        }
        self.config.default_template.clone()
    }

    /// Render mermaid blocks if enabled; returns the engine input path, an
    /// optional temp-file guard, and the generated images.
    async fn preprocess_diagrams(
        &self,
        input: &Path,
        body: &str,
    ) -> Result<(PathBuf, Option<tempfile::NamedTempFile>, Vec<PathBuf>), Md2DocError> {
        if !self.config.render_diagrams || !diagram::has_mermaid_diagrams(body) {
            return Ok((input.to_path_buf(), None, Vec::new()));
        }
        if !diagram::is_mermaid_available() {
            warn!(
                "mermaid diagrams found but mmdc not installed. \
                 Install with: npm install -g @mermaid-js/mermaid-cli"
            );
            return Ok((input.to_path_buf(), None, Vec::new()));
        }

        info!("processing mermaid diagrams");
        let parent = input.parent().unwrap_or_else(|| Path::new("."));
        let diagram_dir = parent.join(".mermaid_tmp");
        let base_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "diagram".to_string());

        let processed =
            match diagram::process_mermaid_in_markdown(body, &diagram_dir, &base_name).await {
                Ok(p) => p,
                Err(e) => {
                    warn!("mermaid processing failed, using original content: {e}");
                    return Ok((input.to_path_buf(), None, Vec::new()));
                }
            };

        if processed.images.is_empty() {
            return Ok((input.to_path_buf(), None, Vec::new()));
        }
        info!("rendered {} mermaid diagram(s)", processed.images.len());

        let temp = tempfile::Builder::new()
            .prefix("mermaid_")
            .suffix(".md")
            .tempfile_in(parent)
            .and_then(|f| {
                std::fs::write(f.path(), &processed.content)?;
                Ok(f)
            })
            .map_err(|e| Md2DocError::OutputWriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;

        let path = temp.path().to_path_buf();
        Ok((path, Some(temp), processed.images))
    }
}

/// When the caller kept the default format and the profile declares its own
/// default list, the profile's first format wins.
fn effective_format(requested: TargetFormat, profile: Option<&Profile>) -> TargetFormat {
    if requested == TargetFormat::Docx {
        if let Some(first) = profile.and_then(|p| p.default_formats.first()) {
            return *first;
        }
    }
    requested
}

/// Output-path precedence: explicit > profile naming pattern > input stem.
fn resolve_output_path(
    job: &ConvertJob,
    profile: Option<&Profile>,
    metadata: &DocumentMetadata,
    input: &Path,
    format: TargetFormat,
) -> Result<PathBuf, Md2DocError> {
    if let Some(explicit) = &job.output {
        if explicit.is_dir() {
            return Err(Md2DocError::OutputPathInvalid {
                path: explicit.clone(),
                detail: "output path must be a file, not a directory".into(),
            });
        }
        return Ok(explicit.clone());
    }

    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let pattern = profile.and_then(|p| p.output_naming.as_deref());
    if pattern.is_some() && metadata.title.is_some() {
        let name = output_file_name(input, metadata.title.as_deref(), pattern, format);
        debug!("profile naming pattern resolved output to {name}");
        return Ok(parent.join(name));
    }

    Ok(input.with_extension(format.extension()))
}

/// Resolve a relative path against `base_dir`, keeping it untouched when the
/// resolution target does not exist.
fn resolve_relative(path: &Path, base_dir: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if let Some(base) = base_dir {
        let candidate = base.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    path.to_path_buf()
}

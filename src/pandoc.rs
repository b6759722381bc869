//! Engine adapter: building and executing the external pandoc invocation.
//!
//! The command line is assembled by a pure builder
//! ([`build_invocation`]) from a typed [`ConversionRequest`], so argument
//! layout is unit-testable without ever spawning a process; only
//! [`Pandoc::convert`] touches the operating system.
//!
//! ## Execution model
//!
//! One conversion is one blocking subprocess call: the caller awaits until
//! pandoc exits. There is no retry — pandoc failures are deterministic
//! (bad input, missing engine), not transient. By default there is also no
//! timeout; see [`crate::config::ConversionConfig::engine_timeout`] for the
//! opt-in bound.
//!
//! ## Post-validation
//!
//! A zero exit status is not trusted on its own: the adapter checks that the
//! declared output file exists and is non-empty before declaring success.
//! pandoc can exit zero while a filter or LaTeX pass quietly produced
//! nothing usable.

use crate::config::{ConversionConfig, PdfEngine, TargetFormat};
use crate::error::Md2DocError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Executable name searched on `PATH` when no explicit path is configured.
const PANDOC_EXE: &str = "pandoc";

/// Everything needed for one engine invocation. Constructed per conversion,
/// consumed read-only, discarded after the call.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: TargetFormat,
    /// Effective template (only meaningful for docx).
    pub template: Option<PathBuf>,
    /// Explicitly requested PDF engine; `None` → autodetect.
    pub pdf_engine: Option<PdfEngine>,
    /// Sanitized `-V` variables, in forwarding order.
    pub variables: Vec<(String, String)>,
    /// Profile and caller-supplied extra arguments, appended last.
    pub extra_args: Vec<String>,
}

/// A fully-formed engine command line, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PandocInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Handle to a located pandoc executable.
#[derive(Debug, Clone)]
pub struct Pandoc {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl Pandoc {
    /// Locate pandoc per the configured resolution order and wrap it.
    ///
    /// Resolution: explicit configured path (which must exist) > `PATH`
    /// search. The environment override was already folded into the config
    /// at construction time.
    pub fn new(config: &ConversionConfig) -> Result<Self, Md2DocError> {
        let path = locate_pandoc(config.pandoc_path.as_deref())?;
        info!("using pandoc at: {}", path.display());
        Ok(Self {
            path,
            timeout: config.engine_timeout,
        })
    }

    /// The resolved executable path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run one conversion: validate, resolve the PDF engine if needed, build
    /// the command, execute it, and post-validate the artifact.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<(), Md2DocError> {
        if !request.input.exists() {
            return Err(Md2DocError::InputNotFound {
                path: request.input.clone(),
            });
        }
        if !request.input.is_file() {
            return Err(Md2DocError::NotAFile {
                path: request.input.clone(),
            });
        }

        // PDF targets need a working LaTeX engine; probing before the spawn
        // turns a doomed subprocess call into an immediate, actionable error.
        let pdf_engine = match request.format {
            TargetFormat::Pdf => Some(detect_pdf_engine(request.pdf_engine)?),
            TargetFormat::Docx => None,
        };

        let template = effective_template(request);
        let invocation = build_invocation(&self.path, request, template.as_deref(), pdf_engine);

        info!(
            "running pandoc (format={}, input={}, output={})",
            request.format,
            request.input.display(),
            request.output.display()
        );
        debug!("full pandoc command: {:?}", invocation);

        let output = self.execute(&invocation).await?;

        if !output.status.success() {
            // Prefer the diagnostic stream; pandoc occasionally writes its
            // complaint to stdout instead, and a blank error helps nobody.
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if !stderr.trim().is_empty() {
                stderr.trim().to_string()
            } else if !stdout.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                format!("pandoc exited with {}", output.status)
            };
            return Err(Md2DocError::ConversionFailed { detail });
        }

        validate_artifact(&request.output).await?;

        info!("conversion completed successfully");
        if !output.stdout.is_empty() {
            debug!("pandoc stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        Ok(())
    }

    async fn execute(
        &self,
        invocation: &PandocInvocation,
    ) -> Result<std::process::Output, Md2DocError> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);

        let run = command.output();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(r) => r,
                Err(_) => {
                    return Err(Md2DocError::ConversionFailed {
                        detail: format!(
                            "engine call exceeded the configured timeout of {}s",
                            limit.as_secs()
                        ),
                    })
                }
            },
            None => run.await,
        };

        result.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Md2DocError::PandocNotFound {
                    path: Some(invocation.program.clone()),
                }
            } else {
                Md2DocError::ConversionFailed {
                    detail: format!("failed to spawn pandoc: {e}"),
                }
            }
        })
    }
}

/// Check the produced artifact exists and is non-empty.
async fn validate_artifact(path: &Path) -> Result<(), Md2DocError> {
    match tokio::fs::metadata(path).await {
        Err(_) => Err(Md2DocError::OutputMissing {
            path: path.to_path_buf(),
        }),
        Ok(meta) if meta.len() == 0 => Err(Md2DocError::OutputEmpty {
            path: path.to_path_buf(),
        }),
        Ok(_) => Ok(()),
    }
}

/// Apply the template rules: docx-only, missing file degrades to a warning.
fn effective_template(request: &ConversionRequest) -> Option<PathBuf> {
    let template = request.template.as_ref()?;
    match request.format {
        TargetFormat::Pdf => {
            info!(
                "docx template '{}' ignored for PDF output",
                template.display()
            );
            None
        }
        TargetFormat::Docx => {
            if template.exists() {
                Some(template.clone())
            } else {
                warn!(
                    "template file does not exist: {}, continuing without template",
                    template.display()
                );
                None
            }
        }
    }
}

/// Assemble the pandoc argument list. Pure: no filesystem or process access,
/// so layout is testable in isolation.
pub fn build_invocation(
    program: &Path,
    request: &ConversionRequest,
    template: Option<&Path>,
    pdf_engine: Option<PdfEngine>,
) -> PandocInvocation {
    let mut args: Vec<String> = vec![
        request.input.to_string_lossy().into_owned(),
        "-f".into(),
        "markdown".into(),
        "-t".into(),
        request.format.pandoc_name().into(),
        "-o".into(),
        request.output.to_string_lossy().into_owned(),
    ];

    if let Some(engine) = pdf_engine {
        args.push("--pdf-engine".into());
        args.push(engine.executable().into());
    }

    if let Some(template) = template {
        args.push("--reference-doc".into());
        args.push(template.to_string_lossy().into_owned());
    }

    for (key, value) in &request.variables {
        args.push("-V".into());
        args.push(format!("{key}={value}"));
    }

    args.extend(request.extra_args.iter().cloned());

    PandocInvocation {
        program: program.to_path_buf(),
        args,
    }
}

/// Locate the pandoc executable.
fn locate_pandoc(explicit: Option<&Path>) -> Result<PathBuf, Md2DocError> {
    if let Some(path) = explicit {
        if path.exists() && path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Md2DocError::PandocNotFound {
            path: Some(path.to_path_buf()),
        });
    }
    find_in_path(PANDOC_EXE).ok_or(Md2DocError::PandocNotFound { path: None })
}

/// Pick a usable PDF engine.
///
/// An explicitly requested engine is probed first; the remaining candidates
/// follow in the fixed preference order, so a missing preferred engine
/// degrades gracefully instead of failing a convertible document.
pub fn detect_pdf_engine(preferred: Option<PdfEngine>) -> Result<PdfEngine, Md2DocError> {
    detect_pdf_engine_with(preferred, |engine| find_in_path(engine.executable()).is_some())
}

fn detect_pdf_engine_with(
    preferred: Option<PdfEngine>,
    available: impl Fn(PdfEngine) -> bool,
) -> Result<PdfEngine, Md2DocError> {
    let mut candidates: Vec<PdfEngine> = Vec::with_capacity(4);
    if let Some(engine) = preferred {
        candidates.push(engine);
    }
    for engine in PdfEngine::CANDIDATES {
        if !candidates.contains(&engine) {
            candidates.push(engine);
        }
    }

    for engine in &candidates {
        if available(*engine) {
            info!("using PDF engine: {engine}");
            return Ok(*engine);
        }
        debug!("PDF engine '{engine}' not found in PATH");
    }

    Err(Md2DocError::PdfEngineNotFound {
        tried: candidates
            .iter()
            .map(|e| e.executable())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Search `PATH` for an executable by name.
pub(crate) fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let with_ext = dir.join(format!("{name}.exe"));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
    }
    None
}

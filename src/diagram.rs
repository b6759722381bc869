//! Diagram preprocessing: render fenced mermaid blocks to images before the
//! engine runs.
//!
//! Rendering itself is delegated to the external mermaid CLI (`mmdc`); this
//! module only finds the fenced blocks, drives the subprocess, and rewrites
//! the Markdown to reference the produced PNGs. A missing `mmdc` degrades to
//! a warning and the content passes through untouched — diagrams-as-code in
//! the output is still a readable document. A single failed diagram keeps its
//! original code block while the remaining diagrams still render.

use crate::error::Md2DocError;
use crate::pandoc::find_in_path;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Fenced mermaid block, case-insensitive, body captured across lines.
static RE_MERMAID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)```mermaid\s*\n(.*?)\n```").unwrap());

/// The mermaid CLI is given this long per diagram before being killed.
/// Rendering spins up a headless browser; a hung one should not stall the
/// whole conversion indefinitely.
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

const MMDC_INSTALL_HINT: &str = "Install it with: npm install -g @mermaid-js/mermaid-cli";

/// True when the content contains at least one mermaid block.
pub fn has_mermaid_diagrams(content: &str) -> bool {
    RE_MERMAID.is_match(content)
}

/// True when the mermaid CLI is available on this system.
pub fn is_mermaid_available() -> bool {
    find_mermaid_cli().is_some()
}

/// Locate the mermaid CLI executable (`mmdc`) on `PATH`.
pub fn find_mermaid_cli() -> Option<PathBuf> {
    find_in_path("mmdc")
}

/// Result of preprocessing one document's mermaid blocks.
#[derive(Debug)]
pub struct ProcessedDiagrams {
    /// Content with rendered blocks replaced by image references.
    pub content: String,
    /// Generated PNG files, for cleanup after the engine call.
    pub images: Vec<PathBuf>,
}

/// Render every mermaid block in `content` to a PNG under `output_dir`.
///
/// Images are named `<base_name>_<i>.png` (1-indexed, in document order) and
/// each rendered block is replaced by a Markdown image reference. When the
/// CLI is missing the content is returned unchanged with a warning.
pub async fn process_mermaid_in_markdown(
    content: &str,
    output_dir: &Path,
    base_name: &str,
) -> Result<ProcessedDiagrams, Md2DocError> {
    if !has_mermaid_diagrams(content) {
        return Ok(ProcessedDiagrams {
            content: content.to_string(),
            images: Vec::new(),
        });
    }

    let Some(mmdc) = find_mermaid_cli() else {
        warn!("mermaid diagrams found but mmdc not installed. {MMDC_INSTALL_HINT}");
        return Ok(ProcessedDiagrams {
            content: content.to_string(),
            images: Vec::new(),
        });
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Md2DocError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let blocks: Vec<(String, String)> = RE_MERMAID
        .captures_iter(content)
        .map(|caps| (caps[0].to_string(), caps[1].trim().to_string()))
        .collect();

    let mut processed = content.to_string();
    let mut images = Vec::new();

    for (i, (full_match, code)) in blocks.iter().enumerate() {
        let index = i + 1;
        let image_name = format!("{base_name}_{index}.png");
        let image_path = output_dir.join(&image_name);

        info!("rendering mermaid diagram {index}/{}: {image_name}", blocks.len());
        match render_mermaid_to_png(&mmdc, code, &image_path).await {
            Ok(()) => {
                let reference = format!(
                    "![Diagram {index}]({})",
                    image_path.to_string_lossy().replace('\\', "/")
                );
                processed = processed.replacen(full_match.as_str(), &reference, 1);
                images.push(image_path);
            }
            Err(e) => {
                // Keep the original code block for this diagram.
                warn!("failed to render diagram {index}: {e}");
            }
        }
    }

    Ok(ProcessedDiagrams {
        content: processed,
        images,
    })
}

/// Render one diagram to PNG via `mmdc`.
async fn render_mermaid_to_png(
    mmdc: &Path,
    code: &str,
    output_path: &Path,
) -> Result<(), Md2DocError> {
    let input = tempfile::Builder::new()
        .suffix(".mmd")
        .tempfile()
        .and_then(|mut f| {
            use std::io::Write;
            f.write_all(code.as_bytes())?;
            Ok(f)
        })
        .map_err(|e| Md2DocError::DiagramRenderFailed {
            detail: format!("cannot write diagram source: {e}"),
        })?;

    let mut command = Command::new(mmdc);
    command
        .arg("-i")
        .arg(input.path())
        .arg("-o")
        .arg(output_path)
        .args(["-w", "800", "-b", "white", "--quiet"])
        .kill_on_drop(true);

    debug!("running mermaid CLI: {command:?}");

    let output = match tokio::time::timeout(RENDER_TIMEOUT, command.output()).await {
        Err(_) => {
            return Err(Md2DocError::DiagramRenderFailed {
                detail: format!("timed out after {}s", RENDER_TIMEOUT.as_secs()),
            })
        }
        Ok(Err(e)) => {
            return Err(Md2DocError::DiagramRenderFailed {
                detail: format!("cannot run '{}': {e}. {MMDC_INSTALL_HINT}", mmdc.display()),
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else if !stdout.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            "unknown error".to_string()
        };
        return Err(Md2DocError::DiagramRenderFailed { detail });
    }

    if !output_path.exists() {
        return Err(Md2DocError::DiagramRenderFailed {
            detail: format!(
                "mmdc completed but output file was not created: {}",
                output_path.display()
            ),
        });
    }

    Ok(())
}

/// Remove generated images and, when empty afterwards, their directory.
pub async fn cleanup_generated_images(images: &[PathBuf]) {
    for image in images {
        if let Err(e) = tokio::fs::remove_file(image).await {
            if image.exists() {
                warn!("failed to clean up {}: {e}", image.display());
            }
        } else {
            debug!("cleaned up: {}", image.display());
        }
    }
    if let Some(dir) = images.first().and_then(|p| p.parent()) {
        // Only removes the directory when nothing else is left in it.
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

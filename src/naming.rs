//! Output naming: slugification and batch-scoped collision resolution.
//!
//! Two different collisions look the same at the filesystem level but must be
//! handled differently:
//!
//! * **In-run collision** — two documents in the same batch resolve to the
//!   same output name (same frontmatter title, say). The second one is
//!   renamed with an `_2` suffix; both convert.
//! * **Prior-run collision** — the name is blocked by a file that already
//!   existed before the batch started. In non-overwrite mode that is a skip,
//!   not a rename: renaming here would silently duplicate a previous run's
//!   output and defeat the skip semantics.
//!
//! The [`NameRegistry`] tracks names claimed during the current run so the
//! orchestrator can tell the two apart. It lives exactly as long as one batch
//! invocation and is never persisted.

use crate::config::TargetFormat;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Longest slug we will emit; longer input is cut at a hyphen-safe point.
const MAX_SLUG_LEN: usize = 100;

/// Name used when neither the title nor the input stem yields any characters.
const FALLBACK_NAME: &str = "document";

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").unwrap());
static RE_INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\-]").unwrap());
static RE_HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Convert a string to a filesystem-safe slug.
///
/// Decomposes accented characters to their ASCII base (é → e), lowercases,
/// replaces whitespace and underscore runs with single hyphens, drops all
/// remaining non-word characters, collapses hyphen runs, and strips edge
/// hyphens. Deterministic and total: any input (including empty) yields a
/// valid, possibly empty, slug.
pub fn slugify(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();

    let s = RE_SEPARATORS.replace_all(&folded, "-");
    let s = RE_INVALID.replace_all(&s, "");
    let s = RE_HYPHEN_RUNS.replace_all(&s, "-");
    let s = s.trim_matches('-');

    if s.chars().count() > MAX_SLUG_LEN {
        let cut: String = s.chars().take(MAX_SLUG_LEN).collect();
        cut.trim_end_matches('-').to_string()
    } else {
        s.to_string()
    }
}

/// Build the output file name for one (document, format) pair.
///
/// Precedence: a profile naming pattern with a title substitutes the
/// slugified title into `{title}` (extension corrected if the pattern names
/// another one); a bare title becomes its slug; otherwise the input file's
/// stem is reused. An empty slug falls back to the stem, and an empty stem
/// to a placeholder.
pub fn output_file_name(
    input: &Path,
    title: Option<&str>,
    pattern: Option<&str>,
    format: TargetFormat,
) -> String {
    let extension = format!(".{}", format.extension());
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let slug = title.map(slugify).filter(|s| !s.is_empty());

    if let (Some(pattern), Some(slug)) = (pattern, slug.as_deref()) {
        let name = pattern.replace("{title}", slug);
        return enforce_extension(&name, &extension);
    }

    let base = slug.unwrap_or(stem);
    if base.is_empty() {
        format!("{FALLBACK_NAME}{extension}")
    } else {
        format!("{base}{extension}")
    }
}

/// Make sure `name` carries `extension`, replacing any other extension.
fn enforce_extension(name: &str, extension: &str) -> String {
    if name.ends_with(extension) {
        return name.to_string();
    }
    let base = match name.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base,
        _ => name,
    };
    format!("{base}{extension}")
}

/// How a desired output name was resolved within the current batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path is claimed for this run; convert into it.
    Claim(PathBuf),
    /// The name is blocked by a pre-existing file in non-overwrite mode;
    /// record a skip for this (file, format) pair.
    Skip(PathBuf),
}

/// Registry of output paths claimed during one batch run.
///
/// Created fresh per batch invocation and discarded afterwards; only the
/// sequential orchestrator loop touches it.
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashSet<PathBuf>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `file_name` within `dir` to a unique output path.
    ///
    /// See the module docs for the skip-vs-rename distinction. The rename
    /// loop appends `_2`, `_3`, … (first unused integer ≥ 2), stepping over
    /// names that are claimed in-run or, in non-overwrite mode, already on
    /// disk.
    pub fn resolve(&mut self, dir: &Path, file_name: &str, overwrite: bool) -> Resolution {
        let base = dir.join(file_name);

        if !self.claimed.contains(&base) {
            if !overwrite && base.exists() {
                return Resolution::Skip(base);
            }
            self.claimed.insert(base.clone());
            return Resolution::Claim(base);
        }

        let (stem, suffix) = split_file_name(file_name);
        let mut counter: u32 = 2;
        loop {
            let candidate = dir.join(format!("{stem}_{counter}{suffix}"));
            let blocked =
                self.claimed.contains(&candidate) || (!overwrite && candidate.exists());
            if !blocked {
                debug!(
                    "output name collision resolved: {} -> {}",
                    file_name,
                    candidate.display()
                );
                self.claimed.insert(candidate.clone());
                return Resolution::Claim(candidate);
            }
            counter += 1;
        }
    }
}

/// Split `report.docx` into `("report", ".docx")`; no extension → empty suffix.
fn split_file_name(name: &str) -> (&str, String) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    }
}

//! Document metadata: the closed field set, CLI-override merging, and the
//! value sanitizer applied before anything reaches the engine.
//!
//! The metadata that travels to pandoc is a fixed, typed structure rather
//! than a free-form map: the recognized keys are known at compile time and
//! everything else rides in `extra` only when the configured
//! [`UnknownKeyPolicy`](crate::config::UnknownKeyPolicy) allows passthrough.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frontmatter keys with a dedicated field, in forwarding order.
pub const RECOGNIZED_KEYS: [&str; 7] = [
    "title",
    "subtitle",
    "author",
    "version",
    "date",
    "customer",
    "project",
];

/// Metadata attached to one document, merged from frontmatter and CLI
/// overrides, consumed read-only by the engine adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub customer: Option<String>,
    pub project: Option<String>,
    /// Unrecognized keys kept under the passthrough policy, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl DocumentMetadata {
    /// Set a recognized key by name. Returns false when `key` is not in
    /// [`RECOGNIZED_KEYS`] (the caller decides what to do with it).
    pub fn set_recognized(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "title" => &mut self.title,
            "subtitle" => &mut self.subtitle,
            "author" => &mut self.author,
            "version" => &mut self.version,
            "date" => &mut self.date,
            "customer" => &mut self.customer,
            "project" => &mut self.project,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// True when no field and no extra entry is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subtitle.is_none()
            && self.author.is_none()
            && self.version.is_none()
            && self.date.is_none()
            && self.customer.is_none()
            && self.project.is_none()
            && self.extra.is_empty()
    }

    /// Apply explicit overrides on top of this metadata. An override always
    /// wins over the frontmatter value for the same key; unrecognized
    /// override keys land in `extra` (replacing an existing entry).
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            if self.set_recognized(&key, value.clone()) {
                debug!("metadata key '{key}' overridden by explicit value");
                continue;
            }
            if let Some(entry) = self.extra.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
            } else {
                self.extra.push((key, value));
            }
        }
    }

    /// Flatten into the `-V key=value` pairs handed to the engine adapter.
    ///
    /// Every value passes through [`sanitize_value`]; keys whose value
    /// sanitizes to empty are absent from the result. Recognized keys come
    /// first in [`RECOGNIZED_KEYS`] order, then extras in source order.
    pub fn to_pandoc_variables(&self) -> Vec<(String, String)> {
        let mut vars = Vec::new();
        let fields = [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("author", &self.author),
            ("version", &self.version),
            ("date", &self.date),
            ("customer", &self.customer),
            ("project", &self.project),
        ];
        for (key, value) in fields {
            if let Some(v) = value.as_deref().and_then(sanitize_value) {
                vars.push((key.to_string(), v));
            }
        }
        for (key, value) in &self.extra {
            if let Some(v) = sanitize_value(value) {
                vars.push((key.clone(), v));
            }
        }
        vars
    }
}

static RE_SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").unwrap());

/// Sanitize one metadata value for the engine command line.
///
/// Replaces every line feed and carriage return with a space, collapses runs
/// of spaces, and trims. Returns `None` when nothing remains — the caller
/// must then drop the key entirely rather than forward an empty value.
///
/// Total over any string input; never fails.
pub fn sanitize_value(value: &str) -> Option<String> {
    let value = value.replace(['\n', '\r'], " ");
    let value = RE_SPACE_RUNS.replace_all(&value, " ");
    let value = value.trim();
    if value.is_empty() {
        debug!("metadata value empty after sanitization, dropping key");
        None
    } else {
        Some(value.to_string())
    }
}

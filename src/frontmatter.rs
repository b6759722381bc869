//! Frontmatter extraction: the optional metadata block at the top of a
//! Markdown document.
//!
//! The parser is deliberately permissive and line-oriented — no YAML grammar.
//! Each interior line is split on its first colon; lines that do not look
//! like `key: value` are ignored rather than rejected, so stray prose inside
//! the block never fails a conversion. The one structural error is an opened
//! block that never closes: that cannot be distinguished from a document
//! whose entire body was swallowed by the block, so it is reported instead of
//! guessed at.
//!
//! ## Encoding
//!
//! Input is decoded as UTF-8 first. Files that fail UTF-8 validation fall
//! back to a single-byte Windows-1252 decode, so regional legacy files
//! convert instead of erroring out. The trade-off (mojibake on genuinely
//! non-Latin legacy encodings) matches what the conversion engine itself
//! would produce.

use crate::config::UnknownKeyPolicy;
use crate::error::Md2DocError;
use crate::metadata::DocumentMetadata;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Result of splitting a document into metadata and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontmatter {
    /// Parsed metadata; default (empty) when the document has no block.
    pub metadata: DocumentMetadata,
    /// Document body with the frontmatter block stripped.
    pub body: String,
}

static RE_KEY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.+)$").unwrap());

/// Read and parse a Markdown file, splitting off its frontmatter block.
pub async fn parse_file(
    path: &Path,
    policy: UnknownKeyPolicy,
) -> Result<Frontmatter, Md2DocError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Md2DocError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Md2DocError::InputUnreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let content = decode(&bytes, path);
    parse_str(&content, policy, path)
}

/// Decode file bytes, falling back from UTF-8 to Windows-1252.
fn decode(bytes: &[u8], path: &Path) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            warn!(
                "UTF-8 decoding failed for {}, falling back to Windows-1252",
                path.display()
            );
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Parse already-decoded document text.
///
/// `origin` is only used in error messages.
pub fn parse_str(
    content: &str,
    policy: UnknownKeyPolicy,
    origin: &Path,
) -> Result<Frontmatter, Md2DocError> {
    let lines: Vec<&str> = content.split('\n').collect();

    // The block must open on the very first line with exactly `---`
    // (a trailing CR from CRLF files is tolerated).
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return Ok(Frontmatter {
            metadata: DocumentMetadata::default(),
            body: content.to_string(),
        });
    }

    let close = lines[1..]
        .iter()
        .position(|line| line.trim() == "---")
        .map(|i| i + 1);

    let Some(close) = close else {
        return Err(Md2DocError::FrontmatterUnterminated {
            path: origin.to_path_buf(),
        });
    };

    let mut metadata = DocumentMetadata::default();
    for line in &lines[1..close] {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(caps) = RE_KEY_VALUE.captures(line) else {
            // Not a key: value line; ignore rather than fail.
            continue;
        };
        let key = &caps[1];
        let value = strip_quotes(caps[2].trim()).to_string();

        if key == "date" {
            metadata.date = Some(normalize_date(&value));
        } else if !metadata.set_recognized(key, value.clone()) {
            match policy {
                UnknownKeyPolicy::Drop => {
                    debug!("dropping unrecognized frontmatter key '{key}'");
                }
                UnknownKeyPolicy::Passthrough => {
                    metadata.extra.push((key.to_string(), value));
                }
            }
        }
    }

    let body = lines[close + 1..].join("\n");
    debug!("parsed frontmatter from {}", origin.display());

    Ok(Frontmatter { metadata, body })
}

/// Strip one pair of matching single or double quotes.
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Accepted input layouts for the `date` field.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Normalize a date value to `YYYY-MM-DD`.
///
/// An empty value becomes today's date; a value in none of the accepted
/// layouts passes through unchanged with a warning.
fn normalize_date(value: &str) -> String {
    if value.is_empty() {
        return Local::now().date_naive().format("%Y-%m-%d").to_string();
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    warn!("could not parse date '{value}', using as-is");
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn origin() -> PathBuf {
        PathBuf::from("test.md")
    }

    fn parse(content: &str) -> Frontmatter {
        parse_str(content, UnknownKeyPolicy::Drop, &origin()).unwrap()
    }

    #[test]
    fn well_formed_block_round_trip() {
        let fm = parse("---\ntitle: Example\n---\n# Body\n");
        assert_eq!(fm.metadata.title.as_deref(), Some("Example"));
        assert_eq!(fm.body, "# Body\n");
    }

    #[test]
    fn absent_block_returns_body_unchanged() {
        let content = "# Just a document\n\ntext\n";
        let fm = parse(content);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, content);
    }

    #[test]
    fn delimiter_must_open_on_first_line() {
        let content = "\n---\ntitle: Late\n---\n";
        let fm = parse(content);
        assert!(fm.metadata.is_empty());
        assert_eq!(fm.body, content);
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let err = parse_str("---\ntitle: Truncated\n", UnknownKeyPolicy::Drop, &origin())
            .unwrap_err();
        assert!(matches!(err, Md2DocError::FrontmatterUnterminated { .. }));
    }

    #[test]
    fn quotes_are_stripped() {
        let fm = parse("---\ntitle: \"Quoted Title\"\nauthor: 'Someone'\n---\nbody");
        assert_eq!(fm.metadata.title.as_deref(), Some("Quoted Title"));
        assert_eq!(fm.metadata.author.as_deref(), Some("Someone"));
    }

    #[test]
    fn mismatched_quotes_are_kept() {
        let fm = parse("---\ntitle: \"Half quoted\n---\nbody");
        assert_eq!(fm.metadata.title.as_deref(), Some("\"Half quoted"));
    }

    #[test]
    fn comments_and_junk_lines_are_ignored() {
        let fm = parse("---\n# a comment\nnot a pair\ntitle: Kept\n---\nbody");
        assert_eq!(fm.metadata.title.as_deref(), Some("Kept"));
        assert!(fm.metadata.extra.is_empty());
    }

    #[test]
    fn unknown_keys_dropped_by_default() {
        let fm = parse("---\ncolour: red\ntitle: T\n---\n");
        assert!(fm.metadata.extra.is_empty());
    }

    #[test]
    fn unknown_keys_pass_through_when_configured() {
        let fm = parse_str(
            "---\ncolour: red\n---\n",
            UnknownKeyPolicy::Passthrough,
            &origin(),
        )
        .unwrap();
        assert_eq!(fm.metadata.extra, vec![("colour".to_string(), "red".to_string())]);
    }

    #[test]
    fn crlf_delimiters_are_tolerated() {
        let fm = parse("---\r\ntitle: Windows\r\n---\r\nbody\r\n");
        assert_eq!(fm.metadata.title.as_deref(), Some("Windows"));
    }

    #[test]
    fn date_normalization_table() {
        for (input, expected) in [
            ("2024-03-01", "2024-03-01"),
            ("01.03.2024", "2024-03-01"),
            ("01/03/2024", "2024-03-01"),
            ("2024/03/01", "2024-03-01"),
            ("01-03-2024", "2024-03-01"),
        ] {
            let fm = parse(&format!("---\ndate: {input}\n---\n"));
            assert_eq!(fm.metadata.date.as_deref(), Some(expected), "input {input}");
        }
    }

    #[test]
    fn unparseable_date_passes_through() {
        let fm = parse("---\ndate: sometime in spring\n---\n");
        assert_eq!(fm.metadata.date.as_deref(), Some("sometime in spring"));
    }

    #[test]
    fn empty_quoted_date_becomes_today() {
        let fm = parse("---\ndate: \"\"\n---\n");
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(fm.metadata.date.as_deref(), Some(today.as_str()));
    }

    #[test]
    fn latin1_fallback_decodes_instead_of_failing() {
        // "Café" with a Latin-1 é byte — invalid UTF-8.
        let bytes = b"---\ntitle: Caf\xe9\n---\nbody";
        let content = decode(bytes, &origin());
        let fm = parse_str(&content, UnknownKeyPolicy::Drop, &origin()).unwrap();
        assert_eq!(fm.metadata.title.as_deref(), Some("Café"));
    }

    #[test]
    fn all_recognized_keys_parse() {
        let fm = parse(
            "---\ntitle: T\nsubtitle: S\nauthor: A\nversion: 1.0\n\
             date: 2024-01-02\ncustomer: C\nproject: P\n---\n",
        );
        let m = &fm.metadata;
        assert_eq!(m.title.as_deref(), Some("T"));
        assert_eq!(m.subtitle.as_deref(), Some("S"));
        assert_eq!(m.author.as_deref(), Some("A"));
        assert_eq!(m.version.as_deref(), Some("1.0"));
        assert_eq!(m.date.as_deref(), Some("2024-01-02"));
        assert_eq!(m.customer.as_deref(), Some("C"));
        assert_eq!(m.project.as_deref(), Some("P"));
    }
}

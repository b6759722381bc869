//! # md2doc
//!
//! Convert Markdown documents to Word (`.docx`) and PDF by orchestrating the
//! external [pandoc](https://pandoc.org) engine.
//!
//! ## Why this crate?
//!
//! pandoc does the hard work of document conversion; what it does not do is
//! the workflow around it — frontmatter-driven metadata, preset profiles,
//! batch runs over whole directories with collision-safe output naming, and
//! honest failure reporting when a "successful" engine run produced nothing
//! usable. This crate is that workflow.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input.md
//!  │
//!  ├─ 1. Frontmatter  split the leading `---` metadata block from the body
//!  ├─ 2. Diagrams     render mermaid blocks via mmdc (optional)
//!  ├─ 3. Metadata     merge CLI overrides, sanitize values
//!  ├─ 4. Resolve      profile, template, output name (collision-safe in batch)
//!  ├─ 5. Engine       pandoc subprocess (PDF: LaTeX engine autodetected)
//!  └─ 6. Validate     artifact must exist and be non-empty
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2doc::{ConversionConfig, Converter, ConvertJob};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConversionConfig::from_env())?;
//!     let output = converter.convert(&ConvertJob::new("report.md")).await?;
//!     println!("wrote {}", output.display());
//!     Ok(())
//! }
//! ```
//!
//! Batch mode walks a directory, skips outputs that already exist (unless
//! overwriting), renames in-run collisions (`report.docx`, `report_2.docx`),
//! and keeps going past per-file failures:
//!
//! ```rust,no_run
//! use md2doc::{convert_batch, BatchOptions, ConversionConfig, Converter};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = Converter::new(ConversionConfig::from_env())?;
//! let result = convert_batch(
//!     &converter,
//!     Path::new("docs/"),
//!     Path::new("out/"),
//!     &BatchOptions::default(),
//! )
//! .await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2doc` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2doc = { version = "0.4", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Needed for | Resolution |
//! |------|-----------|------------|
//! | `pandoc` | everything | explicit path > `PANDOC_PATH` > `PATH` |
//! | `xelatex` / `lualatex` / `pdflatex` | PDF targets | probed in that order |
//! | `mmdc` | mermaid diagrams | `PATH`; optional, degrades to a warning |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod diagram;
pub mod error;
pub mod frontmatter;
pub mod metadata;
pub mod naming;
pub mod pandoc;
pub mod profiles;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_batch, BatchOptions, BatchResult, FileOutcome, OutcomeStatus};
pub use config::{
    parse_format_list, ConversionConfig, ConversionConfigBuilder, PdfEngine, TargetFormat,
    UnknownKeyPolicy,
};
pub use convert::{ConvertJob, Converter};
pub use error::Md2DocError;
pub use frontmatter::Frontmatter;
pub use metadata::DocumentMetadata;
pub use pandoc::{ConversionRequest, Pandoc, PandocInvocation};
pub use profiles::{Profile, ProfileRegistry};
pub use progress::BatchProgressCallback;

//! Integration tests for the single-file and batch conversion paths.
//!
//! Real pandoc is not required: the engine executable is stubbed with a
//! generated shell script so the tests exercise everything up to and
//! including the subprocess boundary — argument construction, collision
//! resolution, skip/overwrite policy, artifact validation, and failure
//! isolation — without depending on a LaTeX toolchain being installed.
//!
//! Shell-script stubs make this suite unix-only.
#![cfg(unix)]

use md2doc::{
    convert_batch, BatchOptions, ConversionConfig, Converter, ConvertJob, OutcomeStatus,
    TargetFormat,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ── Stub engine helpers ──────────────────────────────────────────────────────

/// What the stubbed engine should do when invoked.
enum StubBehavior {
    /// Write a small non-empty file to the `-o` path and exit 0.
    Ok,
    /// Create the `-o` path as a zero-byte file and exit 0.
    EmptyOutput,
    /// Exit 0 without creating any output.
    NoOutput,
    /// Print a diagnostic to stderr and exit 1.
    Fail,
    /// Sleep far longer than any test timeout.
    Hang,
}

/// Create an executable stub pandoc in `dir`. When `args_log` is given the
/// stub dumps its argument list there, one per line, for later assertions.
fn write_stub_pandoc(dir: &Path, behavior: StubBehavior, args_log: Option<&Path>) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log_line = match args_log {
        Some(path) => format!("printf '%s\\n' \"$@\" > '{}'\n", path.display()),
        None => String::new(),
    };
    let body = match behavior {
        StubBehavior::Ok => {
            "out=\"\"; prev=\"\"\n\
             for a in \"$@\"; do [ \"$prev\" = \"-o\" ] && out=\"$a\"; prev=\"$a\"; done\n\
             [ -n \"$out\" ] && printf 'converted' > \"$out\"\n\
             exit 0\n"
        }
        StubBehavior::EmptyOutput => {
            "out=\"\"; prev=\"\"\n\
             for a in \"$@\"; do [ \"$prev\" = \"-o\" ] && out=\"$a\"; prev=\"$a\"; done\n\
             [ -n \"$out\" ] && : > \"$out\"\n\
             exit 0\n"
        }
        StubBehavior::NoOutput => "exit 0\n",
        StubBehavior::Fail => "echo 'pandoc: citeproc filter exploded' >&2\nexit 1\n",
        StubBehavior::Hang => "sleep 300\nexit 0\n",
    };

    let path = dir.join("pandoc");
    std::fs::write(&path, format!("#!/bin/sh\n{log_line}{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn converter_with_stub(stub: &Path) -> Converter {
    let config = ConversionConfig::builder()
        .pandoc_path(stub)
        .render_diagrams(false)
        .build()
        .unwrap();
    Converter::new(config).unwrap()
}

fn write_md(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn names_of(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// True when any LaTeX engine is installed; PDF failure tests skip then.
fn any_pdf_engine_installed() -> bool {
    ["xelatex", "lualatex", "pdflatex"].iter().any(|name| {
        std::env::var_os("PATH")
            .map(|path| {
                std::env::split_paths(&path).any(|dir| dir.join(name).is_file())
            })
            .unwrap_or(false)
    })
}

// ── Single-file path ─────────────────────────────────────────────────────────

#[tokio::test]
async fn single_file_produces_output() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input = write_md(work.path(), "report.md", "# Hello\n");
    let output = work.path().join("report.docx");

    let mut job = ConvertJob::new(&input);
    job.output = Some(output.clone());
    let produced = converter.convert(&job).await.unwrap();

    assert_eq!(produced, output);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "converted");
}

#[tokio::test]
async fn frontmatter_metadata_reaches_engine_sanitized() {
    let work = TempDir::new().unwrap();
    let args_log = work.path().join("args.txt");
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, Some(&args_log));
    let converter = converter_with_stub(&stub);

    let input = write_md(
        work.path(),
        "offer.md",
        "---\ntitle: Technical   Offer\nauthor: \"\"\n---\n# Body\n",
    );
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("offer.docx"));
    converter.convert(&job).await.unwrap();

    let args = std::fs::read_to_string(&args_log).unwrap();
    let lines: Vec<&str> = args.lines().collect();
    // Space runs collapsed by the sanitizer.
    assert!(lines.contains(&"title=Technical Offer"), "args: {lines:?}");
    // Empty-after-sanitize values never reach the engine.
    assert!(!lines.iter().any(|l| l.starts_with("author=")), "args: {lines:?}");
    // Core argument shape.
    assert!(lines.contains(&"-t"));
    assert!(lines.contains(&"docx"));
}

#[tokio::test]
async fn profile_args_are_forwarded() {
    let work = TempDir::new().unwrap();
    let args_log = work.path().join("args.txt");
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, Some(&args_log));
    let converter = converter_with_stub(&stub);

    let input = write_md(work.path(), "doc.md", "# Body\n");
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("doc.docx"));
    job.profile = Some("bericht".to_string());
    converter.convert(&job).await.unwrap();

    let args = std::fs::read_to_string(&args_log).unwrap();
    let lines: Vec<&str> = args.lines().collect();
    assert!(lines.contains(&"--standalone"));
    assert!(lines.contains(&"--toc"));
    assert!(lines.contains(&"--number-sections"));
}

#[tokio::test]
async fn zero_byte_output_is_a_failure() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::EmptyOutput, None);
    let converter = converter_with_stub(&stub);

    let input = write_md(work.path(), "doc.md", "# Body\n");
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("doc.docx"));

    let err = converter.convert(&job).await.unwrap_err();
    assert!(err.to_string().contains("empty"), "got: {err}");
}

#[tokio::test]
async fn missing_output_is_a_failure() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::NoOutput, None);
    let converter = converter_with_stub(&stub);

    let input = write_md(work.path(), "doc.md", "# Body\n");
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("doc.docx"));

    let err = converter.convert(&job).await.unwrap_err();
    assert!(err.to_string().contains("not created"), "got: {err}");
}

#[tokio::test]
async fn engine_stderr_is_surfaced() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Fail, None);
    let converter = converter_with_stub(&stub);

    let input = write_md(work.path(), "doc.md", "# Body\n");
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("doc.docx"));

    let err = converter.convert(&job).await.unwrap_err();
    assert!(err.to_string().contains("citeproc filter exploded"), "got: {err}");
}

#[tokio::test]
async fn engine_timeout_bounds_a_hanging_call() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Hang, None);
    let config = ConversionConfig::builder()
        .pandoc_path(&stub)
        .render_diagrams(false)
        .engine_timeout(std::time::Duration::from_millis(300))
        .build()
        .unwrap();
    let converter = Converter::new(config).unwrap();

    let input = write_md(work.path(), "doc.md", "# Body\n");
    let mut job = ConvertJob::new(&input);
    job.output = Some(work.path().join("doc.docx"));

    let err = converter.convert(&job).await.unwrap_err();
    assert!(err.to_string().contains("timeout"), "got: {err}");
}

#[tokio::test]
async fn missing_input_is_invalid_input() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let job = ConvertJob::new(work.path().join("nope.md"));
    let err = converter.convert(&job).await.unwrap_err();
    assert!(err.to_string().contains("not found"), "got: {err}");
}

// ── Batch path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_title_drives_output_name() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    write_md(&input_dir, "offer.md", "---\ntitle: Technical Offer\n---\n# Body\n");

    let result = convert_batch(&converter, &input_dir, &output_dir, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert!(output_dir.join("technical-offer.docx").is_file());
}

#[tokio::test]
async fn scenario_b_same_base_name_renames_within_run() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    write_md(&input_dir, "first.md", "---\ntitle: Report\n---\nA\n");
    write_md(&input_dir, "second.md", "---\ntitle: Report\n---\nB\n");

    let result = convert_batch(&converter, &input_dir, &output_dir, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(names_of(&output_dir), vec!["report.docx", "report_2.docx"]);
}

#[tokio::test]
async fn scenario_c_missing_pdf_engine_fails_files_not_batch() {
    if any_pdf_engine_installed() {
        eprintln!("SKIP — a LaTeX engine is installed on this machine");
        return;
    }

    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    write_md(&input_dir, "a.md", "# A\n");
    write_md(&input_dir, "b.md", "# B\n");

    let options = BatchOptions {
        formats: vec![TargetFormat::Pdf],
        ..Default::default()
    };
    let result = convert_batch(&converter, &input_dir, &output_dir, &options)
        .await
        .unwrap();

    // Both files get their own failure record; the batch itself completes.
    assert_eq!(result.failed, 2);
    assert_eq!(result.outcomes.len(), 2);
    for outcome in &result.outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(
            outcome.error.as_deref().unwrap_or("").contains("PDF engine"),
            "outcome: {outcome:?}"
        );
    }
}

#[tokio::test]
async fn scenario_d_empty_artifact_counts_as_failed() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::EmptyOutput, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    write_md(&input_dir, "doc.md", "# Body\n");

    let result = convert_batch(&converter, &input_dir, &output_dir, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 1);
}

#[tokio::test]
async fn scenario_e_existing_output_is_skipped_not_failed() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    std::fs::create_dir(&output_dir).unwrap();
    write_md(&input_dir, "notes.md", "# Body\n");
    std::fs::write(output_dir.join("notes.docx"), b"from a previous run").unwrap();

    let result = convert_batch(&converter, &input_dir, &output_dir, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(result.succeeded, 0);
    // The prior run's artifact is untouched.
    assert_eq!(
        std::fs::read(output_dir.join("notes.docx")).unwrap(),
        b"from a previous run"
    );
}

#[tokio::test]
async fn overwrite_mode_replaces_existing_output() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    std::fs::create_dir(&output_dir).unwrap();
    write_md(&input_dir, "notes.md", "# Body\n");
    std::fs::write(output_dir.join("notes.docx"), b"stale").unwrap();

    let options = BatchOptions {
        overwrite: true,
        ..Default::default()
    };
    let result = convert_batch(&converter, &input_dir, &output_dir, &options)
        .await
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(
        std::fs::read_to_string(output_dir.join("notes.docx")).unwrap(),
        "converted"
    );
}

#[tokio::test]
async fn recursive_mode_mirrors_subdirectories() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir_all(input_dir.join("chapter1")).unwrap();
    write_md(&input_dir, "intro.md", "# Intro\n");
    write_md(&input_dir.join("chapter1"), "body.md", "# Chapter\n");

    let options = BatchOptions {
        recursive: true,
        ..Default::default()
    };
    let result = convert_batch(&converter, &input_dir, &output_dir, &options)
        .await
        .unwrap();

    assert_eq!(result.succeeded, 2);
    assert!(output_dir.join("intro.docx").is_file());
    assert!(output_dir.join("chapter1/body.docx").is_file());
}

#[tokio::test]
async fn per_file_failure_does_not_abort_the_batch() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    // Opened but never closed: a frontmatter error for this file only.
    write_md(&input_dir, "broken.md", "---\ntitle: Truncated\n");
    write_md(&input_dir, "good.md", "---\ntitle: Fine\n---\n# Body\n");

    let result = convert_batch(&converter, &input_dir, &output_dir, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.succeeded, 1);
    assert!(output_dir.join("fine.docx").is_file());

    let failed = &result.outcomes[0];
    assert_eq!(failed.status, OutcomeStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("Unterminated"));
}

#[tokio::test]
async fn multiple_formats_produce_one_outcome_each() {
    if any_pdf_engine_installed() {
        eprintln!("SKIP — a LaTeX engine is installed on this machine");
        return;
    }

    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    let output_dir = work.path().join("out");
    std::fs::create_dir(&input_dir).unwrap();
    write_md(&input_dir, "doc.md", "# Body\n");

    let options = BatchOptions {
        formats: vec![TargetFormat::Docx, TargetFormat::Pdf],
        ..Default::default()
    };
    let result = convert_batch(&converter, &input_dir, &output_dir, &options)
        .await
        .unwrap();

    // docx succeeds against the stub; pdf fails on engine detection.
    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert!(output_dir.join("doc.docx").is_file());
}

#[tokio::test]
async fn missing_source_directory_is_fatal() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let err = convert_batch(
        &converter,
        &work.path().join("missing"),
        &work.path().join("out"),
        &BatchOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn destination_file_is_fatal() {
    let work = TempDir::new().unwrap();
    let stub = write_stub_pandoc(work.path(), StubBehavior::Ok, None);
    let converter = converter_with_stub(&stub);

    let input_dir = work.path().join("in");
    std::fs::create_dir(&input_dir).unwrap();
    let blocker = work.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();

    let err = convert_batch(&converter, &input_dir, &blocker, &BatchOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a directory"));
}

//! CLI output formatting.
//!
//! Output is **information-centric**: each thumbnail leads with its source
//! and destination, with geometry shown as indented context lines.
//!
//! # Output Format
//!
//! ## Thumb
//!
//! ```text
//! dawn.jpg → dawn-thumb.jpg
//!     Decoded: 250x188 4:2:0
//!     Output: 128x96 4:4:4 (5.2 KiB)
//! ```
//!
//! ## Batch
//!
//! ```text
//! Thumbnailing 3 images
//!     001 dawn.jpg → dawn-thumb.jpg
//!         Output: 128x96 4:4:4 (5.2 KiB)
//!     002 broken.jpg
//!         Error: decode failed: no image in JPEG datastream
//!     003 dusk.jpg → dusk-thumb.jpg
//!         Output: 128x85 4:4:4 (4.8 KiB)
//!
//! Thumbnailed 2 of 3 images (1 failed)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O.

use crate::imaging::ThumbnailOutcome;
use crate::process::{BatchReport, ProcessEvent, ThumbnailRecord};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// File name for display, falling back to the full path.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Human-readable byte count.
///
/// ```text
/// 512 B
/// 5.2 KiB
/// 1.4 MiB
/// ```
fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{} B", bytes)
    } else if b < KIB * KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{:.1} MiB", b / (KIB * KIB))
    }
}

fn record_header(record: &ThumbnailRecord) -> String {
    format!(
        "{} → {}",
        display_name(&record.input),
        display_name(&record.output)
    )
}

fn output_line(outcome: &ThumbnailOutcome, bytes: u64) -> String {
    format!(
        "Output: {}x{} {} ({})",
        outcome.output.0,
        outcome.output.1,
        outcome.output_format,
        format_bytes(bytes)
    )
}

// ============================================================================
// thumb
// ============================================================================

/// Format the result of a single `thumb` run.
pub fn format_thumb_output(record: &ThumbnailRecord) -> Vec<String> {
    let outcome = &record.outcome;
    vec![
        record_header(record),
        format!(
            "{}Decoded: {}x{} {}",
            indent(1),
            outcome.decoded.0,
            outcome.decoded.1,
            outcome.decoded_format
        ),
        format!("{}{}", indent(1), output_line(outcome, record.bytes)),
    ]
}

pub fn print_thumb_output(record: &ThumbnailRecord) {
    for line in format_thumb_output(record) {
        println!("{}", line);
    }
}

// ============================================================================
// batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => {
            vec![format!("Thumbnailing {} images", total)]
        }
        ProcessEvent::Thumbnailed { index, record } => vec![
            format!("{}{} {}", indent(1), format_index(index + 1), record_header(record)),
            format!("{}{}", indent(2), output_line(&record.outcome, record.bytes)),
        ],
        ProcessEvent::Failed {
            index,
            input,
            message,
        } => vec![
            format!("{}{} {}", indent(1), format_index(index + 1), display_name(input)),
            format!("{}Error: {}", indent(2), message),
        ],
    }
}

/// Format the closing summary of a batch.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let total = report.results.len();
    let failed = report.failed();
    let mut line = format!("Thumbnailed {} of {} images", report.succeeded(), total);
    if failed > 0 {
        line.push_str(&format!(" ({} failed)", failed));
    }
    vec![String::new(), line]
}

pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}

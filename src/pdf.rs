//! Best-effort text extraction from PDF bytes.
//!
//! Extraction never fails the pipeline: a document we cannot parse yields an
//! empty string, which the analysis engine is required to handle. Whitespace
//! is normalized so downstream prompt budgets are not wasted on layout
//! artifacts.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Leading bytes every valid PDF starts with.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Cheap signature check used to judge a fetched body before extraction.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Extract plain text from PDF bytes, best effort.
///
/// Returns an empty string when the document carries no extractable text or
/// the parser rejects it. pdf-extract can panic on malformed files, so the
/// call is isolated behind `catch_unwind`.
pub fn extract_text(bytes: &[u8]) -> String {
    let raw = match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(error)) => {
            warn!(error = %error, "PDF text extraction failed");
            String::new()
        }
        Err(_) => {
            warn!("PDF text extraction panicked on malformed input");
            String::new()
        }
    };
    normalize_whitespace(&raw)
}

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("space pattern is valid"));
static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline pattern is valid"));

fn normalize_whitespace(raw: &str) -> String {
    let collapsed = SPACE_RUNS.replace_all(raw, " ");
    NEWLINE_RUNS
        .replace_all(&collapsed, "\n\n")
        .trim()
        .to_string()
}

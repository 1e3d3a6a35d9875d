// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error clustering signature (`error_clusters`, spec §4.3).
//!
//! Normalizes a log message + top-of-stack frame into a stable fingerprint
//! so that `error_clusters` groups errors sharing a root cause but
//! differing in the incidental details (a request id, a line number, ...).

use std::sync::OnceLock;

use regex::Regex;

fn compiled(cell: &OnceLock<Regex>, pattern: &str) -> &Regex {
    // patterns below are fixed at compile time; a bad one is a programming error.
    #[allow(clippy::expect_used)]
    cell.get_or_init(|| Regex::new(pattern).expect("static signature pattern is valid regex"))
}

/// Replace URLs, UUIDs, hex literals, `line:col` suffixes, and bare digits
/// with `?`, in that order (most-specific pattern first, so a UUID isn't
/// partially eaten by the digit pass first).
fn normalize(text: &str) -> String {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    static HEX_RE: OnceLock<Regex> = OnceLock::new();
    static LINE_COL_RE: OnceLock<Regex> = OnceLock::new();
    static DIGIT_RE: OnceLock<Regex> = OnceLock::new();

    let text = compiled(&URL_RE, r"https?://\S+").replace_all(text, "?");
    let text = compiled(
        &UUID_RE,
        r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .replace_all(&text, "?");
    let text = compiled(&HEX_RE, r"(?i)\b0x[0-9a-f]+\b").replace_all(&text, "?");
    let text = compiled(&LINE_COL_RE, r":\d+:\d+\b").replace_all(&text, ":?:?");
    let text = compiled(&DIGIT_RE, r"\d+").replace_all(&text, "?");
    text.into_owned()
}

/// Top-of-stack frame: the first non-empty line of a stack trace, or
/// `None` if no stack is available.
fn top_frame(stack: Option<&str>) -> Option<&str> {
    stack.and_then(|s| s.lines().map(str::trim).find(|l| !l.is_empty()))
}

/// Compute a stable signature for an error log entry. Same
/// `(message, stack)` input always yields the same signature.
pub fn signature(message: &str, stack: Option<&str>) -> String {
    let normalized_message = normalize(message);
    match top_frame(stack) {
        Some(frame) => format!("{normalized_message}\u{1}{}", normalize(frame)),
        None => normalized_message,
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensitive header redaction, applied at ingest time (spec invariant 4:
//! raw values never persist).

use std::collections::HashMap;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-csrf-token",
    "proxy-authorization",
];

fn is_sensitive(header_name: &str) -> bool {
    SENSITIVE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(header_name))
}

/// Replace the value of any sensitive header (matched case-insensitively)
/// with the literal string `"[REDACTED]"`, in place.
pub fn redact_headers(headers: &mut HashMap<String, String>) {
    for (name, value) in headers.iter_mut() {
        if is_sensitive(name) {
            *value = REDACTED.to_owned();
        }
    }
}

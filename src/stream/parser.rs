// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Event parser
//
// Interprets one logical upstream line. Only `data:` lines matter; blank
// separators, `:` comments and other SSE fields (`event:`, `id:`,
// `retry:`) are protocol noise.

use super::types::{UpstreamEvent, SENTINEL};

/// Parse a logical line into an upstream event.
///
/// Returns `None` for noise. A `data:` payload equal to `[DONE]` is the
/// sentinel; any other payload is decoded as JSON, and a payload that does
/// not decode is `Malformed` rather than an error.
pub fn parse_line(line: &str) -> Option<UpstreamEvent> {
    let payload = data_payload(line)?;

    if payload == SENTINEL {
        return Some(UpstreamEvent::Sentinel);
    }

    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => Some(UpstreamEvent::Data(value)),
        Err(_) => Some(UpstreamEvent::Malformed),
    }
}

/// Strip the `data:` field name (with or without one following space).
fn data_payload(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();

    // Comment lines start with ':'
    if trimmed.starts_with(':') {
        return None;
    }

    trimmed
        .strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest).trim())
}

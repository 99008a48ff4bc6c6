// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// SSE encoder
//
// One downstream frame per fragment: `data: {"content":"..."}\n\n`.
// serde_json does all escaping; newlines inside a fragment become `\n`
// escapes, so a frame never spans more than one SSE data line.

use bytes::Bytes;
use serde::Serialize;

use super::types::StreamError;

#[derive(Serialize)]
struct ContentFrame<'a> {
    content: &'a str,
}

/// Encode one fragment as a complete SSE frame.
pub fn encode_frame(fragment: &str) -> Result<Bytes, StreamError> {
    let json = serde_json::to_string(&ContentFrame { content: fragment })
        .map_err(|e| StreamError::Encode(e.to_string()))?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

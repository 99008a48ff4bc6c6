// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

use super::defaults::*;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level parsed and validated relay config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Config format version. Always "v1".
    pub version: String,
    /// Environment label (e.g. "development", "production").
    pub environment: String,
    pub upstream: UpstreamConfig,
    pub stream: StreamConfig,
    pub server: ServerConfig,
    /// SHA256 hash of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where and how the relay talks to the completion provider.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL without the chat completions path, no trailing slash.
    pub base_url: String,
    /// Bearer credential. `None` when not configured; the relay refuses to
    /// construct without it.
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub system_prompt: String,
    /// Timeout for the upstream response head, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl UpstreamConfig {
    /// Full chat completions endpoint URL.
    pub fn completions_url(&self) -> String {
        format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH)
    }
}

/// Streaming session limits.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum gap between upstream chunks. `None` disables the check.
    pub idle_timeout: Option<Duration>,
    /// Bounded downstream queue size, in frames.
    pub channel_capacity: usize,
    /// Bound on the unterminated tail held by the frame decoder.
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Inbound request body limit in bytes.
    pub max_request_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Upstream API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// These are separate from the public Config structs because:
// 1. Credentials and URLs go through variable interpolation between raw and public
// 2. Defaults and range checks are applied once, in the loader
// 3. Keeps the public API clean

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub chatrelay: String,
    pub environment: Option<String>,
    pub upstream: Option<RawUpstreamConfig>,
    pub stream: Option<RawStreamConfig>,
    pub server: Option<RawServerConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawUpstreamConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawStreamConfig {
    pub idle_timeout_ms: Option<u64>,
    pub channel_capacity: Option<usize>,
    pub max_line_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    pub max_request_bytes: Option<usize>,
}

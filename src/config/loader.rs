// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::defaults::*;
use super::error::ConfigError;
use super::interpolation::resolve_with;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a relay config from the given source, resolving
/// `${VAR}` references from the process environment.
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    load_config_with(source, |name| std::env::var(name).ok())
}

/// Load and validate a relay config with an explicit variable lookup.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version, URLs and limits
/// 5. Resolve variable interpolation in string fields
/// 6. Build typed Config struct with defaults filled in
pub fn load_config_with<F>(source: &dyn ConfigSource, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_yaml = source.read_yaml()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.chatrelay != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.chatrelay
        )));
    }

    let upstream = build_upstream_config(raw.upstream, &lookup)?;
    let stream = build_stream_config(raw.stream)?;
    let server = build_server_config(raw.server)?;

    Ok(Config {
        version: raw.chatrelay,
        environment: raw.environment.unwrap_or_default(),
        upstream,
        stream,
        server,
        config_hash,
    })
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{:x}", hash)
}

fn build_upstream_config<F>(
    raw: Option<raw::RawUpstreamConfig>,
    lookup: &F,
) -> Result<UpstreamConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = raw.unwrap_or_default();

    let base_url = match raw.base_url {
        Some(url) => resolve_with(&url, lookup)?,
        None => DEFAULT_BASE_URL.to_string(),
    };
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "upstream.base_url must be an http(s) URL, got \"{base_url}\""
        )));
    }

    let api_key = match raw.api_key {
        Some(key) => resolve_api_key(&key, lookup)?,
        None => None,
    };

    let model = match raw.model {
        Some(m) => resolve_with(&m, lookup)?,
        None => DEFAULT_MODEL.to_string(),
    };
    if model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "upstream.model must not be empty".to_string(),
        ));
    }

    let system_prompt = match raw.system_prompt {
        Some(p) => resolve_with(&p, lookup)?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    let timeout_ms = match raw.timeout_ms {
        Some(0) => None,
        Some(ms) => Some(ms),
        None => Some(DEFAULT_UPSTREAM_TIMEOUT_MS),
    };

    Ok(UpstreamConfig {
        base_url,
        api_key,
        model,
        system_prompt,
        timeout_ms,
    })
}

/// An unset variable or blank value means "no credential", not a load failure.
/// The relay reports the absence per request instead.
fn resolve_api_key<F>(raw: &str, lookup: &F) -> Result<Option<ApiKey>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match resolve_with(raw, lookup) {
        Ok(key) if key.trim().is_empty() => Ok(None),
        Ok(key) => Ok(Some(ApiKey::new(key.trim()))),
        Err(ConfigError::UndefinedVariable { name }) => {
            tracing::warn!(variable = %name, "upstream.api_key references an unset variable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn build_stream_config(raw: Option<raw::RawStreamConfig>) -> Result<StreamConfig, ConfigError> {
    let Some(raw) = raw else {
        return Ok(StreamConfig::default());
    };

    let idle_timeout = match raw.idle_timeout_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => Some(Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS)),
    };

    let channel_capacity = raw.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
    if channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "stream.channel_capacity must be greater than 0".to_string(),
        ));
    }

    let max_line_bytes = raw.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES);
    if max_line_bytes == 0 {
        return Err(ConfigError::Validation(
            "stream.max_line_bytes must be greater than 0".to_string(),
        ));
    }

    Ok(StreamConfig {
        idle_timeout,
        channel_capacity,
        max_line_bytes,
    })
}

fn build_server_config(raw: Option<raw::RawServerConfig>) -> Result<ServerConfig, ConfigError> {
    let max_request_bytes = raw
        .and_then(|s| s.max_request_bytes)
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    if max_request_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.max_request_bytes must be greater than 0".to_string(),
        ));
    }
    Ok(ServerConfig { max_request_bytes })
}

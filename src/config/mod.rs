// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads chatrelay.yaml, validates structure, resolves variable interpolation,
// and computes a deterministic config hash for startup logging.

pub mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use interpolation::{resolve_variables, resolve_with};
pub use loader::{compute_hash, load_config, load_config_with};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{ApiKey, Config, ServerConfig, StreamConfig, UpstreamConfig};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

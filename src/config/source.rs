// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Where chatrelay.yaml comes from. The binary reads a file named on the
// command line (or CHATRELAY_CONFIG); tests hand YAML in directly.

use std::path::PathBuf;

use super::error::ConfigError;

pub trait ConfigSource {
    /// Raw YAML text, exactly as hashed into `config_hash`.
    fn read_yaml(&self) -> Result<String, ConfigError>;

    /// Human-readable origin for logs and error messages.
    fn origin(&self) -> String;
}

/// A chatrelay.yaml on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl ConfigSource for FileSource {
    fn read_yaml(&self) -> Result<String, ConfigError> {
        std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Unreadable {
            origin: self.origin(),
            source,
        })
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

/// Inline YAML.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn read_yaml(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }

    fn origin(&self) -> String {
        "<inline>".to_string()
    }
}

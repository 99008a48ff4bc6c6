// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

/// OpenAI-compatible chat completions host.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Path appended to `upstream.base_url`.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Respond in Korean.";

/// Upstream response-head timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 30_000;

/// Maximum silence between two upstream chunks before the session is closed.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Downstream frames queued before the relay waits on the client.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on an unterminated upstream line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1_048_576; // 1 MB

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Parsed upstream events, relay session states, termination reasons,
// and mid-stream errors.

use std::fmt;

// ---------------------------------------------------------------------------
// Upstream events
// ---------------------------------------------------------------------------

/// One interpreted upstream line. Noise lines produce no event at all.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// `data:` line carrying a JSON payload.
    Data(serde_json::Value),
    /// `data: [DONE]`: the provider finished generating.
    Sentinel,
    /// `data:` line whose payload is not JSON. Skipped.
    Malformed,
}

/// The literal payload marking the end of generation.
pub const SENTINEL: &str = "[DONE]";

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// Relay session state machine.
///
/// `Idle -> UpstreamPending -> Streaming -> Closing -> Closed`; error and
/// cancellation paths go straight to `Closing`. `Closed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    UpstreamPending,
    Streaming,
    Closing,
    Closed,
}

/// Why a streaming session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Upstream sent the sentinel.
    Sentinel,
    /// Upstream closed the body without a sentinel.
    UpstreamEof,
    /// The downstream consumer went away.
    ClientDisconnected,
    /// The session failed; the client is told if still connected.
    Failed(StreamError),
}

impl Termination {
    /// Error to surface downstream, if any.
    pub fn error(&self) -> Option<&StreamError> {
        match self {
            Termination::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Termination::Sentinel => "sentinel",
            Termination::UpstreamEof => "upstream_eof",
            Termination::ClientDisconnected => "client_disconnected",
            Termination::Failed(StreamError::Transport(_)) => "transport_failure",
            Termination::Failed(StreamError::IdleTimeout { .. }) => "idle_timeout",
            Termination::Failed(StreamError::LineTooLong { .. }) => "line_too_long",
            Termination::Failed(StreamError::Encode(_)) => "encode_failure",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Failed(e) => write!(f, "{}: {e}", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures after the downstream stream has been opened. Delivered to the
/// client as the error item of the response body, which aborts it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StreamError {
    #[error("upstream read failed: {0}")]
    Transport(String),

    #[error("upstream sent nothing for {millis}ms")]
    IdleTimeout { millis: u128 },

    #[error("upstream line exceeded {limit} bytes without a terminator")]
    LineTooLong { limit: usize },

    #[error("failed to encode downstream frame: {0}")]
    Encode(String),
}

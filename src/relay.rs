// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Relay controller
//
// Owns the upstream side of a turn: builds the completion request from
// config, sends it through the injected `HttpSender`, and either hands the
// body to a `RelaySession` (streaming) or extracts the reply (basic).
// A non-2xx upstream status ends the turn before any stream is opened.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;

use crate::config::{Config, ConfigError, StreamConfig, UpstreamConfig};
use crate::message::{completion_content, CompletionRequest};
use crate::stream::{FrameStream, RelaySession, SessionState};
use crate::upstream::{HttpError, HttpRequest, HttpResponse, HttpSender};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that end a turn before any downstream stream is opened.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("message is missing")]
    MissingMessage,

    #[error("upstream API key is not configured")]
    NotConfigured,

    #[error("upstream rejected the request with status {0}")]
    UpstreamRejected(StatusCode),

    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("upstream response was malformed: {0}")]
    MalformedUpstreamResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Status the turn is answered with. Upstream rejections keep the
    /// upstream's own code.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidBody(_) | RelayError::MissingMessage => StatusCode::BAD_REQUEST,
            RelayError::NotConfigured | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::UpstreamRejected(status) => *status,
            RelayError::UpstreamFailure(_) | RelayError::MalformedUpstreamResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct RelayController {
    upstream: UpstreamConfig,
    stream: StreamConfig,
    /// Pre-built `Bearer` header; marked sensitive.
    authorization: HeaderValue,
    http: Arc<dyn HttpSender>,
}

impl std::fmt::Debug for RelayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayController")
            .field("upstream", &self.upstream)
            .field("stream", &self.stream)
            .finish_non_exhaustive()
    }
}

impl RelayController {
    /// Build a controller from validated config.
    ///
    /// Fails with `ConfigError::MissingCredential` when no API key is
    /// configured.
    pub fn new(config: &Config, http: Arc<dyn HttpSender>) -> Result<Self, ConfigError> {
        let key = config
            .upstream
            .api_key
            .as_ref()
            .ok_or(ConfigError::MissingCredential)?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", key.expose()))
            .map_err(|_| {
                ConfigError::Validation(
                    "upstream.api_key contains characters not allowed in an HTTP header"
                        .to_string(),
                )
            })?;
        authorization.set_sensitive(true);

        Ok(Self {
            upstream: config.upstream.clone(),
            stream: config.stream.clone(),
            authorization,
            http,
        })
    }

    /// Start a streaming turn.
    ///
    /// Returns the downstream frame stream once the upstream has answered
    /// with a success status. The session itself runs on its own task and
    /// logs under `request_id`.
    pub async fn open_stream(
        &self,
        request_id: &str,
        message: &str,
    ) -> Result<FrameStream, RelayError> {
        tracing::debug!(request_id = %request_id, state = ?SessionState::Idle, "turn received");

        let request = self.build_request(message, true)?;
        tracing::debug!(
            request_id = %request_id,
            state = ?SessionState::UpstreamPending,
            model = %self.upstream.model,
            "opening upstream stream"
        );

        let response = self.send(request_id, request).await?;
        let body = response.body.into_stream();

        tracing::info!(
            request_id = %request_id,
            state = ?SessionState::Streaming,
            "upstream stream open"
        );

        let (frames, _task) = RelaySession::spawn(request_id, body, &self.stream);
        Ok(frames)
    }

    /// Run a non-streaming turn and return the assistant's reply.
    pub async fn complete(&self, request_id: &str, message: &str) -> Result<String, RelayError> {
        let request = self.build_request(message, false)?;

        let response = self.send(request_id, request).await?;
        let body = response.body.collect().await.map_err(upstream_error)?;

        let json: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
            RelayError::MalformedUpstreamResponse(format!("body is not JSON: {e}"))
        })?;
        let content = completion_content(&json).ok_or_else(|| {
            RelayError::MalformedUpstreamResponse(
                "missing choices[0].message.content".to_string(),
            )
        })?;

        tracing::info!(
            request_id = %request_id,
            reply_chars = content.chars().count(),
            "completion relayed"
        );
        Ok(content.to_string())
    }

    fn build_request(&self, message: &str, stream: bool) -> Result<HttpRequest, RelayError> {
        let body = serde_json::to_vec(&CompletionRequest::for_turn(&self.upstream, message, stream))
            .map_err(|e| RelayError::Internal(format!("failed to encode upstream request: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.authorization.clone());

        Ok(HttpRequest {
            url: self.upstream.completions_url(),
            headers,
            body: Bytes::from(body),
            timeout_ms: self.upstream.timeout_ms,
            stream,
        })
    }

    /// Send and reject non-success statuses with the upstream's own code.
    async fn send(&self, request_id: &str, request: HttpRequest) -> Result<HttpResponse, RelayError> {
        let response = self.http.send(request).await.map_err(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "upstream request failed");
            upstream_error(e)
        })?;

        if !response.status.is_success() {
            tracing::warn!(
                request_id = %request_id,
                status = response.status.as_u16(),
                upstream_request_id = upstream_request_id(&response.headers).unwrap_or("-"),
                "upstream rejected request"
            );
            return Err(RelayError::UpstreamRejected(response.status));
        }
        Ok(response)
    }
}

/// Provider-assigned id of the upstream exchange, for support tickets.
fn upstream_request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn upstream_error(e: HttpError) -> RelayError {
    match e {
        HttpError::Timeout(msg) => RelayError::UpstreamTimeout(msg),
        HttpError::Transport(msg) => RelayError::UpstreamFailure(msg),
    }
}

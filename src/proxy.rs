// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// HTTP surface
//
// Responsibilities:
// - Chat endpoints (streaming and basic) and heartbeat
// - Request body validation before any upstream work
// - Mapping relay errors to `{"error": ...}` responses
// - Tagging every turn's response with its `x-request-id`
// - 404 for unknown paths

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, ConfigError};
use crate::message::{BasicReply, ErrorBody, TurnRequest};
use crate::relay::{RelayController, RelayError};
use crate::stream::FrameStream;
use crate::upstream::HttpSender;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Client-facing message. Upstream and internal detail stays in logs.
fn public_message(err: &RelayError) -> &'static str {
    match err {
        RelayError::InvalidBody(_) => "request body must be a JSON object",
        RelayError::MissingMessage => "message is required",
        RelayError::NotConfigured => "server is not configured with an upstream API key",
        RelayError::UpstreamRejected(_) => "upstream API returned an error",
        RelayError::UpstreamFailure(_) => "upstream request failed",
        RelayError::UpstreamTimeout(_) => "upstream request timed out",
        RelayError::MalformedUpstreamResponse(_) => "upstream response was malformed",
        RelayError::Internal(_) => "internal server error",
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: public_message(&self).to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Header carrying the turn's request id back to the client.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log a rejected turn and answer it, tagged with the turn's request id.
fn reject(request_id: &str, err: RelayError) -> Response {
    tracing::warn!(
        request_id = %request_id,
        status = err.status().as_u16(),
        error = %err,
        "request rejected"
    );
    tag_request_id(err.into_response(), request_id)
}

fn tag_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no credential is configured; chat turns then answer 500.
    pub relay: Option<Arc<RelayController>>,
    pub max_request_bytes: usize,
}

impl AppState {
    /// Build state from config. A missing credential degrades to serving
    /// 500s; any other config problem is returned.
    pub fn from_config(config: &Config, http: Arc<dyn HttpSender>) -> Result<Self, ConfigError> {
        let relay = match RelayController::new(config, http) {
            Ok(relay) => Some(Arc::new(relay)),
            Err(ConfigError::MissingCredential) => {
                tracing::warn!("no upstream API key configured; chat endpoints will return 500");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            relay,
            max_request_bytes: config.server.max_request_bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /api/heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Streaming turn: POST /api/chat/stream
///
/// Validates the body, opens the upstream stream, and answers with an
/// event stream whose frames are produced by the relay session.
pub async fn chat_stream(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let frames = match open_turn(&state, &request_id, request).await {
        Ok(frames) => frames,
        Err(e) => return reject(&request_id, e),
    };

    let response = (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response();
    tag_request_id(response, &request_id)
}

async fn open_turn(
    state: &AppState,
    request_id: &str,
    request: Request<Body>,
) -> Result<FrameStream, RelayError> {
    let message = read_message(state, request).await?;
    let relay = state.relay.as_ref().ok_or(RelayError::NotConfigured)?;
    relay.open_stream(request_id, &message).await
}

/// Non-streaming turn: POST /api/chat/basic
pub async fn chat_basic(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = Uuid::new_v4().to_string();

    match complete_turn(&state, &request_id, request).await {
        Ok(reply) => tag_request_id(
            Json(BasicReply {
                success: true,
                message: reply,
            })
            .into_response(),
            &request_id,
        ),
        Err(e) => reject(&request_id, e),
    }
}

async fn complete_turn(
    state: &AppState,
    request_id: &str,
    request: Request<Body>,
) -> Result<String, RelayError> {
    let message = read_message(state, request).await?;
    let relay = state.relay.as_ref().ok_or(RelayError::NotConfigured)?;
    relay.complete(request_id, &message).await
}

/// Read and validate the inbound body, returning the user's message.
async fn read_message(state: &AppState, request: Request<Body>) -> Result<String, RelayError> {
    let body = axum::body::to_bytes(request.into_body(), state.max_request_bytes)
        .await
        .map_err(|e| RelayError::InvalidBody(format!("failed to read request body: {e}")))?;

    if body.is_empty() {
        return Err(RelayError::InvalidBody("request body is empty".into()));
    }
    let turn: TurnRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::InvalidBody(e.to_string()))?;

    turn.message()
        .map(str::to_string)
        .ok_or(RelayError::MissingMessage)
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the chat routes and the heartbeat endpoint.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/heartbeat", get(heartbeat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/chat/basic", post(chat_basic))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ServerConfig, StreamConfig, UpstreamConfig};
    use crate::upstream::{HttpBody, HttpError, HttpRequest, HttpResponse};
    use axum::http::HeaderMap;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt; // for oneshot

    // -----------------------------------------------------------------------
    // Mock upstream
    // -----------------------------------------------------------------------

    /// Upstream that answers every request with the same status and a body
    /// delivered in the given chunks. Counts calls.
    struct ScriptedSender {
        status: StatusCode,
        chunks: Vec<&'static [u8]>,
        calls: AtomicUsize,
    }

    impl ScriptedSender {
        fn new(status: StatusCode, chunks: Vec<&'static [u8]>) -> Arc<Self> {
            Arc::new(Self {
                status,
                chunks,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl HttpSender for ScriptedSender {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<Bytes, HttpError>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect();
            Ok(HttpResponse {
                status: self.status,
                headers: HeaderMap::new(),
                body: HttpBody::Stream(Box::pin(futures_util::stream::iter(items))),
            })
        }
    }

    struct FailingSender(HttpError);

    #[async_trait::async_trait]
    impl HttpSender for FailingSender {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
            Err(self.0.clone())
        }
    }

    fn config(api_key: Option<&str>) -> Config {
        Config {
            version: "v1".to_string(),
            environment: "test".to_string(),
            upstream: UpstreamConfig {
                base_url: "https://upstream.test".to_string(),
                api_key: api_key.map(ApiKey::new),
                model: "gpt-test".to_string(),
                system_prompt: "Be brief.".to_string(),
                timeout_ms: None,
            },
            stream: StreamConfig::default(),
            server: ServerConfig {
                max_request_bytes: 1024,
            },
            config_hash: "sha256:test".to_string(),
        }
    }

    fn app(api_key: Option<&str>, http: Arc<dyn HttpSender>) -> Router {
        build_router(AppState::from_config(&config(api_key), http).unwrap())
    }

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn error_of(resp: Response) -> String {
        let body: ErrorBody = serde_json::from_str(&body_string(resp).await).unwrap();
        body.error
    }

    const TWO_FRAGMENTS: &[&[u8]] = &[
        b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
    ];

    // -----------------------------------------------------------------------
    // Streaming endpoint
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stream_returns_event_stream_headers_and_frames() {
        let sender = ScriptedSender::new(StatusCode::OK, TWO_FRAGMENTS.to_vec());
        let resp = app(Some("sk-test"), sender.clone())
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/event-stream");
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(CONNECTION).unwrap(), "keep-alive");

        assert_eq!(
            body_string(resp).await,
            "data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\n"
        );
        assert_eq!(sender.calls(), 1);
    }

    #[tokio::test]
    async fn missing_message_is_400_without_upstream_call() {
        let sender = ScriptedSender::new(StatusCode::OK, TWO_FRAGMENTS.to_vec());
        let router = app(Some("sk-test"), sender.clone());

        for body in [r#"{}"#, r#"{"message":""}"#, r#"{"message":"   "}"#, r#"{"message":42}"#] {
            let resp = router
                .clone()
                .oneshot(post_json("/api/chat/stream", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(error_of(resp).await, "message is required");
        }
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_body_is_400() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let router = app(Some("sk-test"), sender.clone());

        for body in ["", "not json", "[1,2]", "null"] {
            let resp = router
                .clone()
                .oneshot(post_json("/api/chat/stream", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body:?}");
        }
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let big = format!(r#"{{"message":"{}"}}"#, "x".repeat(2048));
        let resp = app(Some("sk-test"), sender.clone())
            .oneshot(post_json("/api/chat/stream", &big))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_500_after_validation() {
        let sender = ScriptedSender::new(StatusCode::OK, TWO_FRAGMENTS.to_vec());
        let router = app(None, sender.clone());

        let resp = router
            .clone()
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_of(resp).await.contains("API key"));

        // Input errors still win over configuration errors.
        let resp = router
            .oneshot(post_json("/api/chat/stream", r#"{}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through_with_generic_body() {
        let sender = ScriptedSender::new(
            StatusCode::TOO_MANY_REQUESTS,
            vec![&b"{\"error\":{\"message\":\"Rate limit reached for org-secret\"}}"[..]],
        );
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_ne!(resp.headers().get(CONTENT_TYPE).unwrap(), "text/event-stream");
        let error = error_of(resp).await;
        assert!(!error.contains("org-secret"));
    }

    #[tokio::test]
    async fn upstream_timeout_returns_504() {
        let sender = Arc::new(FailingSender(HttpError::Timeout("after 5000ms".into())));
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn upstream_connect_failure_returns_502() {
        let sender = Arc::new(FailingSender(HttpError::Transport("refused".into())));
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/basic", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    // -----------------------------------------------------------------------
    // Basic endpoint
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn basic_returns_success_envelope() {
        let sender = ScriptedSender::new(
            StatusCode::OK,
            vec![&br#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#[..]],
        );
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/basic", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let reply: BasicReply = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(
            reply,
            BasicReply {
                success: true,
                message: "Hello".to_string()
            }
        );
    }

    #[tokio::test]
    async fn basic_with_unexpected_upstream_body_is_502() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![&br#"{"id":"x"}"#[..]]);
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/basic", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn basic_shares_validation_contract() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let resp = app(None, sender.clone())
            .oneshot(post_json("/api/chat/basic", r#"{"message":""}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(sender.calls(), 0);
    }

    // -----------------------------------------------------------------------
    // Misc routes and error mapping
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn heartbeat_returns_200() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let req = Request::builder()
            .method("GET")
            .uri("/api/heartbeat")
            .body(Body::empty())
            .unwrap();
        let resp = app(None, sender).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/v1/chat/completions", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn concurrent_turns_are_independent() {
        let sender = ScriptedSender::new(StatusCode::OK, TWO_FRAGMENTS.to_vec());
        let router = app(Some("sk-test"), sender.clone());

        let mut handles = Vec::new();
        for i in 0..10 {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let resp = router
                    .oneshot(post_json("/api/chat/stream", &format!(r#"{{"message":"turn {i}"}}"#)))
                    .await
                    .unwrap();
                body_string(resp).await
            }));
        }
        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                "data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\n"
            );
        }
        assert_eq!(sender.calls(), 10);
    }

    #[test]
    fn relay_error_renders_generic_body() {
        let resp = RelayError::UpstreamFailure("connection refused to 10.0.0.7".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn rejection_and_stream_carry_request_id() {
        let sender = ScriptedSender::new(StatusCode::OK, TWO_FRAGMENTS.to_vec());
        let router = app(Some("sk-test"), sender);

        let rejected = router
            .clone()
            .oneshot(post_json("/api/chat/stream", r#"{}"#))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let rejected_id = rejected.headers().get(REQUEST_ID_HEADER).unwrap().clone();
        assert!(Uuid::parse_str(rejected_id.to_str().unwrap()).is_ok());

        let streamed = router
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(streamed.status(), StatusCode::OK);
        let streamed_id = streamed.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(Uuid::parse_str(streamed_id.to_str().unwrap()).is_ok());
        assert_ne!(streamed_id, &rejected_id);
    }

    #[tokio::test]
    async fn upstream_rejection_carries_request_id() {
        let sender = ScriptedSender::new(StatusCode::UNAUTHORIZED, vec![&b"{}"[..]]);
        let resp = app(Some("sk-test"), sender)
            .oneshot(post_json("/api/chat/basic", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn invalid_credential_is_a_hard_config_error() {
        let sender = ScriptedSender::new(StatusCode::OK, vec![]);
        let err = AppState::from_config(&config(Some("bad\u{7f}key")), sender);
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }
}

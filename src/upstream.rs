// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// Upstream transport
//
// The relay never touches reqwest directly: it goes through `HttpSender`,
// so handlers and sessions can be exercised against in-memory senders.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};

// ---------------------------------------------------------------------------
// Transport types
// ---------------------------------------------------------------------------

/// Upstream body chunks as delivered by the transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// A POST to the upstream completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// For streaming requests this bounds the wait for the response head only;
    /// otherwise it bounds the whole exchange.
    pub timeout_ms: Option<u64>,
    pub stream: bool,
}

pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl HttpBody {
    /// Normalize either shape into a chunk stream.
    pub fn into_stream(self) -> ByteStream {
        match self {
            HttpBody::Full(bytes) => Box::pin(futures_util::stream::once(async move { Ok(bytes) })),
            HttpBody::Stream(s) => s,
        }
    }

    /// Collect the whole body.
    pub async fn collect(self) -> Result<Bytes, HttpError> {
        match self {
            HttpBody::Full(bytes) => Ok(bytes),
            HttpBody::Stream(s) => {
                let chunks: Vec<Bytes> = s.try_collect().await?;
                Ok(Bytes::from(chunks.concat()))
            }
        }
    }
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Sends HTTP requests to the upstream provider.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

// ---------------------------------------------------------------------------
// Reqwest HTTP sender
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttpSender {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut req = self
            .client
            .post(&request.url)
            .headers(request.headers)
            .body(request.body);

        let timeout = request.timeout_ms.map(Duration::from_millis);

        // A reqwest timeout also covers body reads, which would cut long
        // streams short; streaming requests only bound the response head.
        let resp = if request.stream {
            let pending = req.send();
            match timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| {
                        HttpError::Timeout(format!("no response head after {}ms", limit.as_millis()))
                    })?,
                None => pending.await,
            }
        } else {
            if let Some(limit) = timeout {
                req = req.timeout(limit);
            }
            req.send().await
        }
        .map_err(map_reqwest_error)?;

        let status = resp.status();
        let headers = resp.headers().clone();

        if request.stream {
            let stream = resp.bytes_stream().map_err(map_reqwest_error);
            Ok(HttpResponse {
                status,
                headers,
                body: HttpBody::Stream(Box::pin(stream)),
            })
        } else {
            let body = resp.bytes().await.map_err(map_reqwest_error)?;
            Ok(HttpResponse {
                status,
                headers,
                body: HttpBody::Full(body),
            })
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        HttpError::Timeout(e.to_string())
    } else {
        HttpError::Transport(e.to_string())
    }
}

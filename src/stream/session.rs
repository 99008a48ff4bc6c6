// Relay session
//
// Drives one streaming turn once the upstream has answered 2xx:
// read chunk -> decode lines -> parse events -> extract fragments ->
// encode frames -> push downstream. Runs as its own task and pushes into a
// bounded channel whose receiver is the HTTP response body, so a slow
// client suspends the loop instead of growing a queue.
//
// Every exit path funnels through `close`, which releases the upstream body
// exactly once. Dropping the body aborts the upstream fetch.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::StreamConfig;
use crate::upstream::ByteStream;

use super::decoder::FrameDecoder;
use super::delta::extract_delta;
use super::encoder::encode_frame;
use super::parser::parse_line;
use super::types::{SessionState, StreamError, Termination, UpstreamEvent};

/// Downstream items: encoded frames, or a final error that aborts the body.
pub type FrameItem = Result<Bytes, StreamError>;

/// Receiving side of a session, suitable for `Body::from_stream`.
pub type FrameStream = ReceiverStream<FrameItem>;

pub struct RelaySession {
    request_id: String,
    state: SessionState,
    upstream: Option<ByteStream>,
    decoder: FrameDecoder,
    tx: mpsc::Sender<FrameItem>,
    idle_timeout: Option<Duration>,
    frames_sent: usize,
    malformed_lines: usize,
    started: Instant,
}

impl RelaySession {
    pub fn new(
        request_id: impl Into<String>,
        upstream: ByteStream,
        tx: mpsc::Sender<FrameItem>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            state: SessionState::Streaming,
            upstream: Some(upstream),
            decoder: FrameDecoder::new(config.max_line_bytes),
            tx,
            idle_timeout: config.idle_timeout,
            frames_sent: 0,
            malformed_lines: 0,
            started: Instant::now(),
        }
    }

    /// Spawn a session over `upstream` and return the downstream frame stream
    /// together with the task handle, which resolves to the termination reason.
    pub fn spawn(
        request_id: impl Into<String>,
        upstream: ByteStream,
        config: &StreamConfig,
    ) -> (FrameStream, JoinHandle<Termination>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let session = RelaySession::new(request_id, upstream, tx, config);
        let handle = tokio::spawn(session.run());
        (ReceiverStream::new(rx), handle)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pump until a termination condition, then close.
    pub async fn run(mut self) -> Termination {
        let termination = self.pump().await;
        self.close(&termination).await;
        termination
    }

    async fn pump(&mut self) -> Termination {
        loop {
            let chunk = match self.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return self.finish_input().await,
                Err(termination) => return termination,
            };

            for line in self.decoder.feed(&chunk) {
                if let Some(termination) = self.dispatch(&line).await {
                    return termination;
                }
            }

            // Only after the chunk's complete lines, so a sentinel ahead of
            // an oversized tail still ends the session cleanly.
            if let Err(e) = self.decoder.check_tail() {
                return Termination::Failed(e);
            }
        }
    }

    /// Wait for the next upstream chunk, the idle deadline, or the client
    /// going away, whichever comes first.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Termination> {
        let idle_timeout = self.idle_timeout;
        let tx = &self.tx;
        let Some(upstream) = self.upstream.as_mut() else {
            return Ok(None);
        };

        let read = async move {
            match idle_timeout {
                Some(limit) => tokio::time::timeout(limit, upstream.next())
                    .await
                    .map_err(|_| limit),
                None => Ok(upstream.next().await),
            }
        };

        tokio::select! {
            biased;
            _ = tx.closed() => Err(Termination::ClientDisconnected),
            result = read => match result {
                Ok(Some(Ok(bytes))) => Ok(Some(bytes)),
                Ok(Some(Err(e))) => Err(Termination::Failed(StreamError::Transport(e.to_string()))),
                Ok(None) => Ok(None),
                Err(limit) => Err(Termination::Failed(StreamError::IdleTimeout {
                    millis: limit.as_millis(),
                })),
            },
        }
    }

    /// Upstream EOF: the unterminated tail still counts as a line.
    async fn finish_input(&mut self) -> Termination {
        if let Some(line) = self.decoder.flush() {
            if let Some(termination) = self.dispatch(&line).await {
                return termination;
            }
        }
        Termination::UpstreamEof
    }

    /// Handle one logical line. Returns a termination when the line ends
    /// the session.
    async fn dispatch(&mut self, line: &str) -> Option<Termination> {
        match parse_line(line)? {
            UpstreamEvent::Sentinel => Some(Termination::Sentinel),
            UpstreamEvent::Malformed => {
                self.malformed_lines += 1;
                tracing::debug!(
                    request_id = %self.request_id,
                    line_len = line.len(),
                    "skipping malformed upstream line"
                );
                None
            }
            UpstreamEvent::Data(payload) => {
                let fragment = extract_delta(&payload);
                if fragment.is_empty() {
                    return None;
                }
                let frame = match encode_frame(fragment) {
                    Ok(frame) => frame,
                    Err(e) => return Some(Termination::Failed(e)),
                };
                // Suspends while the channel is full.
                if self.tx.send(Ok(frame)).await.is_err() {
                    return Some(Termination::ClientDisconnected);
                }
                self.frames_sent += 1;
                None
            }
        }
    }

    /// Release the upstream body and report the outcome. Safe to call more
    /// than once; only the first call has any effect.
    async fn close(&mut self, termination: &Termination) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;

        self.upstream.take();

        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match termination.error() {
            Some(err) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    termination = termination.label(),
                    frames = self.frames_sent,
                    malformed_lines = self.malformed_lines,
                    elapsed_ms,
                    error = %err,
                    "relay session failed"
                );
                if !self.tx.is_closed() {
                    let _ = self.tx.send(Err(err.clone())).await;
                }
            }
            None => {
                tracing::info!(
                    request_id = %self.request_id,
                    termination = termination.label(),
                    frames = self.frames_sent,
                    malformed_lines = self.malformed_lines,
                    elapsed_ms,
                    "relay session closed"
                );
            }
        }

        self.state = SessionState::Closed;
    }
}

// Copyright 2026 The Chatrelay Project
// SPDX-License-Identifier: Apache-2.0

// SSE relay pipeline
//
// Responsibilities:
// - Reassemble upstream lines across arbitrary chunk boundaries
// - Interpret `data:` lines: JSON payload, `[DONE]` sentinel, or noise
// - Extract the incremental text fragment from each payload
// - Re-emit each non-empty fragment as one downstream SSE frame, in order
// - Terminate exactly once on sentinel, EOF, client disconnect, idle
//   timeout or transport failure, releasing the upstream body

mod decoder;
mod delta;
mod encoder;
mod parser;
mod session;
mod types;

pub use decoder::FrameDecoder;
pub use delta::extract_delta;
pub use encoder::encode_frame;
pub use parser::parse_line;
pub use session::{FrameItem, FrameStream, RelaySession};
pub use types::{SessionState, StreamError, Termination, UpstreamEvent, SENTINEL};

//! Protocol modules (WebSocket wire + Phoenix channel layer).
//!
//! Two layers live here:
//! - WebSocket: URL parsing, the opening handshake, and frame encode/decode.
//! - Channel: Phoenix envelopes and the transcript payloads they carry.
//!
//! All parsers are panic-free: malformed input is reported as `EnteiError` or
//! skipped with a log line instead of panicking or indexing raw buffers.

pub mod frame;
pub mod handshake;
pub mod phoenix;
pub mod transcript;
pub mod url;

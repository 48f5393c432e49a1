//! Transport layer (WebSocket client over plain TCP).
//!
//! `handshake` opens the TCP stream and performs the HTTP upgrade;
//! `client` owns the connection state, callbacks, and the background worker
//! that reads frames and writes queued outbound frames.

pub mod client;
pub mod handshake;

pub use client::{ConnectionState, TransportOptions, WebSocketClient};

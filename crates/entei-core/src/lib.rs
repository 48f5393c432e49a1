//! Entei core: wire-level primitives for the caption client.
//!
//! This crate defines the WebSocket framing, opening handshake, Phoenix channel
//! envelopes, and transcript payload shapes, plus the error surface shared by
//! the client crate. It performs no I/O and carries no runtime dependencies so
//! every parser can be exercised directly from tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed bytes from the network surface as `EnteiError`, never as a crash
//! of the host process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{EnteiError, Result};

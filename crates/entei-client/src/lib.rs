//! Entei caption client library entry.
//!
//! Wires the WebSocket transport, the Phoenix channel session and the caption
//! sink into a runtime driven by host lifecycle signals. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod config;
pub mod runtime;
pub mod session;
pub mod sink;
pub mod transport;

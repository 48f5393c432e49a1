//! Caption output seam.
//!
//! The host's caption output is modelled as a capability: the pacing tick
//! calls `emit` at most once per tick, and skips the call entirely while
//! `is_active` reports false (no stream or recording running).

use std::time::Duration;

pub trait CaptionSink: Send {
    /// Whether the host output currently accepts captions.
    fn is_active(&self) -> bool {
        true
    }

    fn emit(&mut self, text: &str, duration: Duration);
}

/// Writes captions to the log. Used by the standalone binary.
#[derive(Debug, Default)]
pub struct TracingSink;

impl CaptionSink for TracingSink {
    fn emit(&mut self, text: &str, duration: Duration) {
        tracing::info!(
            target: "entei::caption",
            duration_ms = duration.as_millis() as u64,
            %text,
            "caption"
        );
    }
}

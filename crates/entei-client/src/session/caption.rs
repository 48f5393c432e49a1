//! Caption session state machine.
//!
//! States: `Idle -> Joining -> Joined`, back to `Idle` on disconnect or a
//! failed join. The session never does I/O itself: outgoing envelopes go
//! through `Outbound`, captions through `CaptionSink`, and the owner drives
//! `heartbeat()` and `pacing_tick()` from its timers.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use entei_core::error::Result;
use entei_core::protocol::phoenix::{self, Envelope, RefCounter, TOPIC_PHOENIX};
use entei_core::protocol::transcript::TranscriptEvent;

use crate::session::store::{CaptionModel, CaptionStore};
use crate::sink::CaptionSink;
use crate::transport::WebSocketClient;

/// Where the session's outgoing envelopes go. Fire-and-forget.
pub trait Outbound {
    fn send_text(&self, text: &str) -> Result<()>;
}

impl Outbound for WebSocketClient {
    fn send_text(&self, text: &str) -> Result<()> {
        self.send(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Joining,
    Joined,
}

/// Session knobs (derived from config; fixed for the session's lifetime).
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub channel: String,
    pub join_params: Map<String, Value>,
    pub join_timeout: Duration,
    pub model: CaptionModel,
    pub show_partial: bool,
    pub max_caption_len: usize,
    /// Duration handed to the sink; longer than the pacing interval so
    /// consecutive ticks overlap.
    pub caption_duration: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            channel: "transcription:live".to_string(),
            join_params: Map::new(),
            join_timeout: Duration::from_secs(10),
            model: CaptionModel::Segments,
            show_partial: false,
            max_caption_len: 96,
            caption_duration: Duration::from_secs(3),
        }
    }
}

pub struct CaptionSession<S> {
    settings: SessionSettings,
    sink: S,
    state: SessionState,
    connected: bool,
    refs: RefCounter,
    join_ref: Option<String>,
    join_started: Option<Instant>,
    store: CaptionStore,
    last_truncated: Option<String>,
}

impl<S: CaptionSink> CaptionSession<S> {
    pub fn new(settings: SessionSettings, sink: S) -> Self {
        let store = CaptionStore::new(settings.model);
        Self {
            settings,
            sink,
            state: SessionState::Idle,
            connected: false,
            refs: RefCounter::new(),
            join_ref: None,
            join_started: None,
            store,
            last_truncated: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Heartbeat and pacing timers run only while this is true.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Caption text as the next tick would compute it, before truncation.
    pub fn composed(&self) -> String {
        self.store.compose(self.settings.show_partial)
    }

    /// Transport connection callback.
    pub fn on_connection<O: Outbound + ?Sized>(&mut self, connected: bool, out: &O) {
        if connected {
            self.connected = true;
            tracing::info!(channel = %self.settings.channel, "session connected");
            self.heartbeat(out);
            self.join(out);
        } else {
            if self.connected {
                tracing::info!("session disconnected; captions cleared");
            }
            self.connected = false;
            self.reset();
        }
    }

    fn join<O: Outbound + ?Sized>(&mut self, out: &O) {
        if self.settings.channel.is_empty() {
            return;
        }
        let join_ref = self.refs.next_ref();
        let msg_ref = join_ref.clone();
        let text = match phoenix::encode_join(
            &join_ref,
            &msg_ref,
            &self.settings.channel,
            Some(self.settings.join_params.clone()),
        ) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "join encode failed");
                return;
            }
        };

        self.send(out, &text);
        self.join_ref = Some(join_ref);
        self.join_started = Some(Instant::now());
        self.state = SessionState::Joining;
    }

    /// Send one heartbeat; skipped while not connected.
    pub fn heartbeat<O: Outbound + ?Sized>(&mut self, out: &O) {
        if !self.connected {
            return;
        }
        let msg_ref = self.refs.next_ref();
        match phoenix::encode_heartbeat(&msg_ref) {
            Ok(text) => self.send(out, &text),
            Err(e) => tracing::warn!(error = %e, "heartbeat encode failed"),
        }
    }

    fn send<O: Outbound + ?Sized>(&self, out: &O, text: &str) {
        tracing::debug!(%text, "envelope out");
        if let Err(e) = out.send_text(text) {
            tracing::warn!(error = %e, code = e.code().as_str(), "envelope send failed");
        }
    }

    /// Transport message callback: decode and route one inbound text message.
    /// Malformed envelopes are dropped.
    pub fn on_text(&mut self, text: &str) {
        match phoenix::decode(text) {
            Ok(env) => self.on_envelope(env),
            Err(e) => tracing::warn!(error = %e, "dropping malformed envelope"),
        }
    }

    pub fn on_envelope(&mut self, env: Envelope) {
        tracing::debug!(topic = %env.topic, event = %env.event, msg_ref = ?env.msg_ref, "envelope in");

        if env.is_heartbeat_reply() {
            tracing::trace!("heartbeat acknowledged");
            return;
        }
        if env.is_join_reply() {
            self.on_join_reply(&env);
            return;
        }
        if env.is_reply() || env.topic == TOPIC_PHOENIX {
            return;
        }
        if env.topic == self.settings.channel
            && matches!(env.event.as_str(), "phx_error" | "phx_close")
        {
            tracing::warn!(topic = %env.topic, event = %env.event, "channel closed by server");
            self.state = SessionState::Idle;
            self.join_ref = None;
            self.join_started = None;
            return;
        }

        if !self.connected || env.topic != self.settings.channel {
            return;
        }
        let Some(event) = TranscriptEvent::from_payload(&env.payload) else {
            return;
        };
        if !event.is_transcription() {
            return;
        }
        self.store.apply(event, Instant::now());
    }

    fn on_join_reply(&mut self, env: &Envelope) {
        if env.topic != self.settings.channel {
            tracing::debug!(topic = %env.topic, "reply for a channel we did not join");
            return;
        }
        if self.state != SessionState::Joining {
            return;
        }
        self.join_started = None;

        match env.reply_status() {
            Some("ok") => {
                self.state = SessionState::Joined;
                tracing::info!(channel = %env.topic, "joined channel");
            }
            status => {
                self.state = SessionState::Idle;
                self.join_ref = None;
                tracing::warn!(
                    channel = %env.topic,
                    status = status.unwrap_or("unknown"),
                    response = ?env.reply_response(),
                    "channel join failed"
                );
            }
        }
    }

    /// Give up on a join that has gone unanswered past the join timeout.
    pub fn check_join_timeout(&mut self, now: Instant) {
        if self.state != SessionState::Joining {
            return;
        }
        let Some(started) = self.join_started else {
            return;
        };
        if now.saturating_duration_since(started) >= self.settings.join_timeout {
            tracing::warn!(
                channel = %self.settings.channel,
                timeout_ms = self.settings.join_timeout.as_millis() as u64,
                "channel join timed out"
            );
            self.state = SessionState::Idle;
            self.join_ref = None;
            self.join_started = None;
        }
    }

    /// Emit the current caption to the sink, at most once. Returns the text
    /// emitted, if any.
    pub fn pacing_tick(&mut self) -> Option<String> {
        if !self.connected || !self.sink.is_active() {
            return None;
        }
        let composed = self.composed();
        if composed.is_empty() {
            return None;
        }

        let max = self.settings.max_caption_len;
        let text = match truncate_chars(&composed, max) {
            Some(cut) => {
                if self.last_truncated.as_deref() != Some(cut) {
                    tracing::warn!(
                        len = composed.chars().count(),
                        max,
                        "caption too long; truncated"
                    );
                    self.last_truncated = Some(cut.to_string());
                }
                cut.to_string()
            }
            None => composed.clone(),
        };

        self.sink.emit(&text, self.settings.caption_duration);
        Some(text)
    }

    /// Drop transcript state and return to `Idle`.
    pub fn reset(&mut self) {
        self.store.clear();
        self.state = SessionState::Idle;
        self.join_ref = None;
        self.join_started = None;
        self.last_truncated = None;
    }

    /// Leave the channel if joined. The transport stays up.
    pub fn leave<O: Outbound + ?Sized>(&mut self, out: &O) {
        if self.state == SessionState::Joined && self.connected {
            let msg_ref = self.refs.next_ref();
            match phoenix::encode_leave(&msg_ref, &self.settings.channel) {
                Ok(text) => self.send(out, &text),
                Err(e) => tracing::warn!(error = %e, "leave encode failed"),
            }
        }
        self.reset();
    }

    /// Leave if joined, then clear everything. Safe from any state.
    pub fn shutdown<O: Outbound + ?Sized>(&mut self, out: &O) {
        self.leave(out);
        self.connected = false;
        tracing::debug!("session shut down");
    }
}

/// First `max` characters of `s` when it is longer, `None` otherwise.
pub fn truncate_chars(s: &str, max: usize) -> Option<&str> {
    s.char_indices().nth(max).map(|(idx, _)| &s[..idx])
}

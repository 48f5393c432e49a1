//! Caption runtime: the single event loop that owns the session.
//!
//! Transport callbacks only forward into an mpsc channel; this loop is the one
//! consumer and the only code that touches `CaptionSession`. Heartbeat and
//! pacing intervals live here too and are gated on the session being
//! connected. Connect attempts run on a spawned task so the loop never waits
//! on the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use entei_core::error::Result;

use crate::config::EnteiConfig;
use crate::session::{CaptionSession, SessionState};
use crate::sink::CaptionSink;
use crate::transport::WebSocketClient;

/// Host lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeControl {
    /// Output started: connect and join.
    Start,
    /// Output stopped: leave, disconnect, clear captions.
    Stop,
    /// Tear everything down and return from `run`.
    Shutdown,
}

#[derive(Debug)]
enum TransportEvent {
    Message(String),
    Connection(bool),
}

pub struct CaptionRuntime<S> {
    client: Arc<WebSocketClient>,
    session: CaptionSession<S>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    heartbeat_interval: Duration,
    pacing_interval: Duration,
}

impl<S: CaptionSink> CaptionRuntime<S> {
    /// Build transport and session from config. Fails only on an invalid URL.
    pub fn new(cfg: &EnteiConfig, sink: S) -> Result<Self> {
        let client = Arc::new(WebSocketClient::create(
            &cfg.connection.url,
            cfg.transport_options(),
        )?);

        let (tx, events) = mpsc::unbounded_channel();
        let msg_tx = tx.clone();
        client.set_message_callback(move |text| {
            let _ = msg_tx.send(TransportEvent::Message(text));
        });
        client.set_connection_callback(move |up| {
            let _ = tx.send(TransportEvent::Connection(up));
        });
        client.set_error_callback(|e| {
            tracing::warn!(error = %e, code = e.code().as_str(), "transport error");
        });

        Ok(Self {
            client,
            session: CaptionSession::new(cfg.session_settings(), sink),
            events,
            heartbeat_interval: cfg.heartbeat_interval(),
            pacing_interval: cfg.pacing_interval(),
        })
    }

    pub fn client(&self) -> &WebSocketClient {
        &self.client
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Drive the session until `Shutdown` arrives or the control channel closes.
    pub async fn run(mut self, mut control: mpsc::Receiver<RuntimeControl>) {
        let mut heartbeat = time::interval_at(
            Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pacing = time::interval(self.pacing_interval);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            host = %self.client.endpoint().host,
            heartbeat_ms = self.heartbeat_interval.as_millis() as u64,
            pacing_ms = self.pacing_interval.as_millis() as u64,
            "caption runtime started"
        );

        loop {
            tokio::select! {
                ctl = control.recv() => match ctl {
                    Some(RuntimeControl::Start) => self.start(),
                    Some(RuntimeControl::Stop) => self.stop(),
                    Some(RuntimeControl::Shutdown) | None => break,
                },

                Some(ev) = self.events.recv() => match ev {
                    TransportEvent::Message(text) => self.session.on_text(&text),
                    TransportEvent::Connection(up) => {
                        self.session.on_connection(up, self.client.as_ref());
                        if up {
                            heartbeat.reset();
                            pacing.reset();
                        }
                    }
                },

                _ = heartbeat.tick(), if self.session.is_connected() => {
                    self.session.heartbeat(self.client.as_ref());
                }

                _ = pacing.tick(), if self.session.is_connected() => {
                    self.session.check_join_timeout(std::time::Instant::now());
                    self.session.pacing_tick();
                }
            }
        }

        self.session.shutdown(self.client.as_ref());
        self.client.destroy().await;
        tracing::info!("caption runtime stopped");
    }

    fn start(&self) {
        if self.client.is_connected() {
            return;
        }
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            if let Err(e) = client.connect().await {
                tracing::debug!(error = %e, "initial connect did not succeed");
            }
        });
    }

    fn stop(&mut self) {
        self.session.leave(self.client.as_ref());
        self.client.disconnect();
    }
}

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use entei_core::error::{EnteiError, Result};
use entei_core::protocol::phoenix::TOPIC_PHOENIX;
use entei_core::protocol::url::Endpoint;

use crate::session::{CaptionModel, SessionSettings};
use crate::transport::TransportOptions;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnteiConfig {
    pub version: u32,

    pub connection: ConnectionSection,

    #[serde(default)]
    pub captions: CaptionSection,
}

impl EnteiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(EnteiError::UnsupportedVersion);
        }
        self.connection.validate()?;
        self.captions.validate()?;
        Ok(())
    }

    pub fn transport_options(&self) -> TransportOptions {
        let c = &self.connection;
        TransportOptions {
            auto_reconnect: c.auto_reconnect,
            reconnect_interval: Duration::from_secs(c.reconnect_interval_secs),
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            connect_timeout: Duration::from_millis(c.connect_timeout_ms),
            max_message_bytes: c.max_message_bytes,
            subprotocol: c.subprotocol.clone(),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            channel: self.connection.channel.trim().to_string(),
            join_params: self.connection.join_params.clone(),
            join_timeout: Duration::from_millis(self.connection.join_timeout_ms),
            model: self.captions.model,
            show_partial: self.captions.show_partial,
            max_caption_len: self.captions.max_caption_len,
            caption_duration: Duration::from_millis(self.captions.caption_duration_ms),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.connection.heartbeat_interval_ms)
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.captions.pacing_interval_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    pub url: String,

    pub channel: String,

    #[serde(default)]
    pub subprotocol: Option<String>,

    #[serde(default)]
    pub join_params: Map<String, Value>,

    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl ConnectionSection {
    pub fn validate(&self) -> Result<()> {
        Endpoint::parse(&self.url)
            .map_err(|e| EnteiError::BadConfig(format!("connection.url: {e}")))?;

        let channel = self.channel.trim();
        if channel.is_empty() {
            return Err(EnteiError::BadConfig(
                "connection.channel must not be empty".into(),
            ));
        }
        if channel == TOPIC_PHOENIX {
            return Err(EnteiError::BadConfig(
                "connection.channel must not be the reserved \"phoenix\" topic".into(),
            ));
        }
        if !(1000..=120_000).contains(&self.join_timeout_ms) {
            return Err(EnteiError::BadConfig(
                "connection.join_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(1000..=300_000).contains(&self.heartbeat_interval_ms) {
            return Err(EnteiError::BadConfig(
                "connection.heartbeat_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(1..=60).contains(&self.reconnect_interval_secs) {
            return Err(EnteiError::BadConfig(
                "connection.reconnect_interval_secs must be between 1 and 60".into(),
            ));
        }
        if !(10..=1000).contains(&self.poll_interval_ms) {
            return Err(EnteiError::BadConfig(
                "connection.poll_interval_ms must be between 10 and 1000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.connect_timeout_ms) {
            return Err(EnteiError::BadConfig(
                "connection.connect_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1024..=16 * 1024 * 1024).contains(&self.max_message_bytes) {
            return Err(EnteiError::BadConfig(
                "connection.max_message_bytes must be between 1024 and 16777216".into(),
            ));
        }
        Ok(())
    }
}

fn default_join_timeout_ms() -> u64 {
    10_000
}
fn default_heartbeat_interval_ms() -> u64 {
    30_000
}
fn default_true() -> bool {
    true
}
fn default_reconnect_interval_secs() -> u64 {
    5
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_max_message_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptionSection {
    #[serde(default)]
    pub model: CaptionModel,

    #[serde(default)]
    pub show_partial: bool,

    #[serde(default = "default_pacing_interval_ms")]
    pub pacing_interval_ms: u64,

    #[serde(default = "default_caption_duration_ms")]
    pub caption_duration_ms: u64,

    #[serde(default = "default_max_caption_len")]
    pub max_caption_len: usize,
}

impl Default for CaptionSection {
    fn default() -> Self {
        Self {
            model: CaptionModel::default(),
            show_partial: false,
            pacing_interval_ms: default_pacing_interval_ms(),
            caption_duration_ms: default_caption_duration_ms(),
            max_caption_len: default_max_caption_len(),
        }
    }
}

impl CaptionSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=10_000).contains(&self.pacing_interval_ms) {
            return Err(EnteiError::BadConfig(
                "captions.pacing_interval_ms must be between 100 and 10000".into(),
            ));
        }
        if self.caption_duration_ms <= self.pacing_interval_ms {
            return Err(EnteiError::BadConfig(
                "captions.caption_duration_ms must be greater than pacing_interval_ms".into(),
            ));
        }
        if self.caption_duration_ms > 60_000 {
            return Err(EnteiError::BadConfig(
                "captions.caption_duration_ms must be at most 60000".into(),
            ));
        }
        if !(1..=1024).contains(&self.max_caption_len) {
            return Err(EnteiError::BadConfig(
                "captions.max_caption_len must be between 1 and 1024".into(),
            ));
        }
        Ok(())
    }
}

fn default_pacing_interval_ms() -> u64 {
    1500
}
fn default_caption_duration_ms() -> u64 {
    3000
}
fn default_max_caption_len() -> usize {
    96
}

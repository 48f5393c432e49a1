//! Phoenix channel envelopes.
//!
//! Wire forms:
//! - object (canonical, always used for encoding):
//!   `{"join_ref":null,"ref":"1","topic":"t","event":"e","payload":{}}`
//! - array (accepted on decode for older senders):
//!   `[join_ref, ref, topic, event, payload]`
//!
//! Everything here is pure; refs are produced by a caller-owned `RefCounter`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EnteiError, Result};

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_REPLY: &str = "phx_reply";

/// Topic reserved for heartbeats.
pub const TOPIC_PHOENIX: &str = "phoenix";

/// One channel message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub join_ref: Option<String>,
    #[serde(rename = "ref")]
    pub msg_ref: Option<String>,
    pub topic: String,
    pub event: String,
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Serialize in the canonical object form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| EnteiError::Internal(format!("envelope encode failed: {e}")))
    }

    pub fn is_reply(&self) -> bool {
        self.event == EVENT_REPLY
    }

    pub fn is_heartbeat_reply(&self) -> bool {
        self.is_reply() && self.topic == TOPIC_PHOENIX
    }

    pub fn is_join_reply(&self) -> bool {
        self.is_reply() && self.topic != TOPIC_PHOENIX
    }

    /// `payload.status` of a reply.
    pub fn reply_status(&self) -> Option<&str> {
        if !self.is_reply() {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// `payload.response` of a reply.
    pub fn reply_response(&self) -> Option<&Value> {
        if !self.is_reply() {
            return None;
        }
        self.payload.get("response")
    }
}

/// `phx_join` for `topic`.
pub fn encode_join(
    join_ref: &str,
    msg_ref: &str,
    topic: &str,
    payload: Option<Map<String, Value>>,
) -> Result<String> {
    Envelope {
        join_ref: Some(join_ref.to_string()),
        msg_ref: Some(msg_ref.to_string()),
        topic: topic.to_string(),
        event: EVENT_JOIN.to_string(),
        payload: payload.unwrap_or_default(),
    }
    .to_json()
}

/// `phx_leave` for `topic`.
pub fn encode_leave(msg_ref: &str, topic: &str) -> Result<String> {
    Envelope {
        join_ref: None,
        msg_ref: Some(msg_ref.to_string()),
        topic: topic.to_string(),
        event: EVENT_LEAVE.to_string(),
        payload: Map::new(),
    }
    .to_json()
}

/// `heartbeat` on the `phoenix` topic.
pub fn encode_heartbeat(msg_ref: &str) -> Result<String> {
    Envelope {
        join_ref: None,
        msg_ref: Some(msg_ref.to_string()),
        topic: TOPIC_PHOENIX.to_string(),
        event: EVENT_HEARTBEAT.to_string(),
        payload: Map::new(),
    }
    .to_json()
}

/// Decode either wire form.
pub fn decode(text: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| EnteiError::MalformedEnvelope(format!("invalid json: {e}")))?;

    match value {
        Value::Object(mut obj) => Ok(Envelope {
            join_ref: opt_ref(obj.remove("join_ref"), "join_ref")?,
            msg_ref: opt_ref(obj.remove("ref"), "ref")?,
            topic: req_str(obj.remove("topic"), "topic")?,
            event: req_event(obj.remove("event"))?,
            payload: payload_map(obj.remove("payload"))?,
        }),
        Value::Array(items) => {
            let Ok([join_ref, msg_ref, topic, event, payload]) = <[Value; 5]>::try_from(items)
            else {
                return Err(EnteiError::MalformedEnvelope(
                    "array envelope must have 5 elements".into(),
                ));
            };
            Ok(Envelope {
                join_ref: opt_ref(Some(join_ref), "join_ref")?,
                msg_ref: opt_ref(Some(msg_ref), "ref")?,
                topic: req_str(Some(topic), "topic")?,
                event: req_event(Some(event))?,
                payload: payload_map(Some(payload))?,
            })
        }
        _ => Err(EnteiError::MalformedEnvelope(
            "envelope must be an object or array".into(),
        )),
    }
}

fn opt_ref(v: Option<Value>, field: &str) -> Result<Option<String>> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(EnteiError::MalformedEnvelope(format!(
            "{field} must be a string"
        ))),
    }
}

fn req_str(v: Option<Value>, field: &str) -> Result<String> {
    match v {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(EnteiError::MalformedEnvelope(format!(
            "{field} must be a string"
        ))),
        None => Err(EnteiError::MalformedEnvelope(format!("missing {field}"))),
    }
}

fn req_event(v: Option<Value>) -> Result<String> {
    let event = req_str(v, "event")?;
    if event.is_empty() {
        return Err(EnteiError::MalformedEnvelope("event must not be empty".into()));
    }
    Ok(event)
}

fn payload_map(v: Option<Value>) -> Result<Map<String, Value>> {
    match v {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(m)) => Ok(m),
        Some(_) => Err(EnteiError::MalformedEnvelope(
            "payload must be an object".into(),
        )),
    }
}

/// Monotonic message reference source, one per session.
#[derive(Debug, Default)]
pub struct RefCounter {
    last: u64,
}

impl RefCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next reference as text. Starts at "1".
    pub fn next_ref(&mut self) -> String {
        self.last += 1;
        self.last.to_string()
    }
}

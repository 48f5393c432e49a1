//! Transcript payloads carried inside channel envelopes.
//!
//! Three shapes are in circulation, resolved by field presence:
//! - segment: `{"id": 3, "text": "...", "is_revision": false, "is_final": true}`
//! - typed:   `{"type": "audio:transcription", "text": "...", "is_final": true}`
//! - plain:   `{"text": "...", "is_final": true}`
//!
//! `is_final` defaults to `true` when absent.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

/// `type` value of transcription events in the typed shape.
pub const TYPE_TRANSCRIPTION: &str = "audio:transcription";

/// Segment identity. Senders emit integers or floats, so ordering is total
/// over `f64`.
#[derive(Debug, Clone, Copy)]
pub struct SegmentId(pub f64);

impl PartialEq for SegmentId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SegmentId {}

impl PartialOrd for SegmentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SegmentId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    Segment {
        id: SegmentId,
        text: String,
        is_final: bool,
        is_revision: bool,
    },
    Typed {
        kind: String,
        text: String,
        is_final: bool,
    },
    Plain {
        text: String,
        is_final: bool,
    },
}

impl TranscriptEvent {
    /// Classify a payload. `None` when it carries no string `text`.
    pub fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        let text = payload.get("text").and_then(Value::as_str)?.to_string();
        let is_final = payload
            .get("is_final")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        if let Some(id) = payload.get("id").and_then(segment_id) {
            let is_revision = payload
                .get("is_revision")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            return Some(TranscriptEvent::Segment {
                id,
                text,
                is_final,
                is_revision,
            });
        }

        if let Some(kind) = payload.get("type").and_then(Value::as_str) {
            return Some(TranscriptEvent::Typed {
                kind: kind.to_string(),
                text,
                is_final,
            });
        }

        Some(TranscriptEvent::Plain { text, is_final })
    }

    pub fn text(&self) -> &str {
        match self {
            TranscriptEvent::Segment { text, .. }
            | TranscriptEvent::Typed { text, .. }
            | TranscriptEvent::Plain { text, .. } => text,
        }
    }

    pub fn is_final(&self) -> bool {
        match self {
            TranscriptEvent::Segment { is_final, .. }
            | TranscriptEvent::Typed { is_final, .. }
            | TranscriptEvent::Plain { is_final, .. } => *is_final,
        }
    }

    /// Typed events with another `type` (status pings, audio levels) carry no
    /// caption text.
    pub fn is_transcription(&self) -> bool {
        match self {
            TranscriptEvent::Typed { kind, .. } => kind == TYPE_TRANSCRIPTION,
            _ => true,
        }
    }
}

fn segment_id(v: &Value) -> Option<SegmentId> {
    match v {
        Value::Number(n) => n.as_f64().map(SegmentId),
        Value::String(s) => s.trim().parse::<f64>().ok().map(SegmentId),
        _ => None,
    }
    .filter(|id| id.0.is_finite())
}

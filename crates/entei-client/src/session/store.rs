//! Transcript state behind the composed caption.
//!
//! Two models, chosen per deployment:
//! - `Segments`: identified segments keyed by id; a repeated id overwrites the
//!   earlier text in place. Composition walks ids in ascending order. Events
//!   without an id still follow final/partial rules.
//! - `FinalPartial`: one "current" caption replaced by each final event and a
//!   "pending" buffer fed by partials, surfaced only with `show_partial`.
//!   Segment ids are ignored.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Deserialize;

use entei_core::protocol::transcript::{SegmentId, TranscriptEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionModel {
    #[default]
    Segments,
    FinalPartial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: SegmentId,
    pub text: String,
    pub is_final: bool,
    pub is_revision: bool,
    pub received_at: Instant,
}

#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: BTreeMap<SegmentId, Segment>,
}

impl SegmentStore {
    pub fn upsert(&mut self, segment: Segment) {
        match self.segments.get_mut(&segment.id) {
            Some(existing) => {
                if !segment.is_revision {
                    tracing::debug!(id = %segment.id, "segment id repeated without revision flag");
                }
                existing.text = segment.text;
                existing.is_final = segment.is_final;
                existing.is_revision = segment.is_revision;
                existing.received_at = segment.received_at;
            }
            None => {
                self.segments.insert(segment.id, segment);
            }
        }
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Segment texts in ascending id order, trimmed and space separated.
    pub fn compose(&self) -> String {
        let mut out = String::new();
        for seg in self.segments.values() {
            let text = seg.text.trim();
            if text.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(text);
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct FinalPartial {
    current: String,
    current_at: Option<Instant>,
    pending: String,
    pending_at: Option<Instant>,
}

impl FinalPartial {
    pub fn apply_final(&mut self, text: &str, now: Instant) {
        self.current = text.to_string();
        self.current_at = Some(now);
        self.pending.clear();
        self.pending_at = None;
    }

    pub fn apply_partial(&mut self, text: &str, now: Instant) {
        self.pending = text.to_string();
        self.pending_at = Some(now);
    }

    /// Text to show: the pending partial when allowed and newer than the
    /// current final, otherwise the current final.
    pub fn display(&self, show_partial: bool) -> &str {
        let pending_newer = match (self.pending_at, self.current_at) {
            (Some(p), Some(c)) => p >= c,
            (Some(_), None) => true,
            _ => false,
        };
        if show_partial && pending_newer && !self.pending.is_empty() {
            &self.pending
        } else {
            &self.current
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Composed caption state. Identified segments always land in the segment
/// map; id-less final/partial events always go through `FinalPartial`, so a
/// partial never stacks up as a segment of its own.
#[derive(Debug)]
pub struct CaptionStore {
    model: CaptionModel,
    segments: SegmentStore,
    live: FinalPartial,
}

impl CaptionStore {
    pub fn new(model: CaptionModel) -> Self {
        Self {
            model,
            segments: SegmentStore::default(),
            live: FinalPartial::default(),
        }
    }

    /// Fold one transcript event into the store.
    pub fn apply(&mut self, event: TranscriptEvent, now: Instant) {
        match (self.model, event) {
            (
                CaptionModel::Segments,
                TranscriptEvent::Segment {
                    id,
                    text,
                    is_final,
                    is_revision,
                },
            ) => self.segments.upsert(Segment {
                id,
                text,
                is_final,
                is_revision,
                received_at: now,
            }),
            (_, event) => {
                if event.is_final() {
                    self.live.apply_final(event.text(), now);
                } else {
                    self.live.apply_partial(event.text(), now);
                }
            }
        }
    }

    /// Full caption text before length limiting.
    pub fn compose(&self, show_partial: bool) -> String {
        let live = self.live.display(show_partial).trim();
        let mut out = self.segments.compose();
        if !live.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(live);
        }
        out
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.live.clear();
    }
}

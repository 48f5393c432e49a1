//! Caption session: channel join lifecycle plus transcript merging and pacing.

pub mod caption;
pub mod store;

pub use caption::{CaptionSession, Outbound, SessionSettings, SessionState};
pub use store::{CaptionModel, CaptionStore, Segment};

//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use entei_core::error::{EnteiError, Result};

pub use schema::{CaptionSection, ConnectionSection, EnteiConfig};

pub fn load_from_file(path: &str) -> Result<EnteiConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| EnteiError::BadConfig(format!("read {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<EnteiConfig> {
    let cfg: EnteiConfig = serde_yaml::from_str(s)
        .map_err(|e| EnteiError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

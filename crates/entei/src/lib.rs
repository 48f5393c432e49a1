//! Top-level facade crate for Entei.
//!
//! Re-exports the protocol core and the client library so users can depend on a single crate.

pub mod core {
    pub use entei_core::*;
}

pub mod client {
    pub use entei_client::*;
}

//! Entei caption client
//!
//! - Loads `entei.yaml` (or the path given as the first argument)
//! - Connects, joins the transcription channel and paces captions
//! - Captions go to the log via `TracingSink`
//! - Ctrl-C leaves the channel and shuts down cleanly

use std::process::ExitCode;

use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use entei_client::config;
use entei_client::runtime::{CaptionRuntime, RuntimeControl};
use entei_client::sink::TracingSink;

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "entei.yaml".to_string());

    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, error = %e, code = e.code().as_str(), "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match CaptionRuntime::new(&cfg, TracingSink::default()) {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "runtime init failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%path, channel = %cfg.connection.channel, "entei-client starting");

    let (control_tx, control_rx) = mpsc::channel(8);
    let task = tokio::spawn(runtime.run(control_rx));

    let _ = control_tx.send(RuntimeControl::Start).await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
    let _ = control_tx.send(RuntimeControl::Shutdown).await;

    match task.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "runtime task failed");
            ExitCode::FAILURE
        }
    }
}

//! End-to-end: runtime + transport + session against an in-process Phoenix-like server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use entei_client::config::load_from_str;
use entei_client::runtime::{CaptionRuntime, RuntimeControl};
use entei_client::sink::CaptionSink;
use entei_core::protocol::phoenix;

use fake_server::{listen, Peer, WAIT};

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<String>>>);

impl CaptionSink for SharedSink {
    fn emit(&mut self, text: &str, _duration: Duration) {
        self.0.lock().unwrap().push(text.to_string());
    }
}

fn config(url: &str) -> String {
    format!(
        r#"
version: 1
connection:
  url: "{url}"
  channel: "transcription:live"
  auto_reconnect: false
captions:
  pacing_interval_ms: 100
  caption_duration_ms: 300
"#
    )
}

#[tokio::test]
async fn start_join_caption_shutdown() {
    let (listener, url) = listen().await;
    let cfg = load_from_str(&config(&url)).unwrap();
    let sink = SharedSink::default();
    let runtime = CaptionRuntime::new(&cfg, sink.clone()).unwrap();

    let (control_tx, control_rx) = mpsc::channel(4);
    let task = tokio::spawn(runtime.run(control_rx));
    control_tx.send(RuntimeControl::Start).await.unwrap();

    let mut peer = Peer::accept(&listener).await;

    let hb = phoenix::decode(&peer.recv_text().await).unwrap();
    assert_eq!(hb.event, "heartbeat");
    let join = phoenix::decode(&peer.recv_text().await).unwrap();
    assert_eq!(join.event, "phx_join");
    assert_eq!(join.topic, "transcription:live");

    let join_ref = join.join_ref.clone().unwrap();
    peer.send_text(
        &json!([join_ref, join.msg_ref, "transcription:live", "phx_reply",
                {"status": "ok", "response": {}}])
        .to_string(),
    )
    .await;
    peer.send_text(
        &json!({"join_ref": join_ref, "ref": null, "topic": "transcription:live",
                "event": "transcription", "payload": {"id": 1, "text": "hello world"}})
        .to_string(),
    )
    .await;

    timeout(WAIT, async {
        while sink.0.lock().unwrap().is_empty() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("caption never emitted");
    assert_eq!(sink.0.lock().unwrap()[0], "hello world");

    control_tx.send(RuntimeControl::Shutdown).await.unwrap();
    let leave = phoenix::decode(&peer.recv_text().await).unwrap();
    assert_eq!(leave.event, "phx_leave");

    timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_server_keeps_runtime_alive() {
    let (listener, url) = listen().await;
    drop(listener);
    let cfg = load_from_str(&config(&url)).unwrap();
    let sink = SharedSink::default();
    let runtime = CaptionRuntime::new(&cfg, sink.clone()).unwrap();

    let (control_tx, control_rx) = mpsc::channel(4);
    let task = tokio::spawn(runtime.run(control_rx));
    control_tx.send(RuntimeControl::Start).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(!task.is_finished());

    drop(control_tx);
    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(sink.0.lock().unwrap().is_empty());
}

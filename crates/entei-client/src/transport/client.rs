//! WebSocket client with a background worker.
//!
//! Responsibilities:
//! - Own the connection state (`Disconnected -> Connecting -> Open -> Closing`)
//! - Run one worker task per client: read frames, answer pings, write queued
//!   outbound frames, reconnect at a fixed interval when the link drops
//! - Surface everything through three callbacks (message, error, connection)
//!
//! Locking: callbacks, state, and the reconnect intent share one
//! `std::sync::Mutex`. It is never held across an `.await`, and callbacks are
//! cloned out and invoked after the guard is dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use entei_core::error::{EnteiError, Result};
use entei_core::protocol::frame::{self, FrameDecoder, Inbound, PONG_FRAME};
use entei_core::protocol::url::Endpoint;

use super::handshake;

const READ_CHUNK: usize = 16 * 1024;

pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&EnteiError) + Send + Sync>;
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Transport knobs (derived from the `connection` config section).
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub auto_reconnect: bool,
    pub reconnect_interval: Duration,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub max_message_bytes: usize,
    pub subprotocol: Option<String>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
            max_message_bytes: 1024 * 1024,
            subprotocol: None,
        }
    }
}

/// Work handed to the worker. Frames carry the generation of the link they
/// were produced for so a stale frame never reaches a newer connection.
enum Command {
    Attach(Link),
    Frame { generation: u64, bytes: Bytes },
    Close { generation: u64 },
}

struct Link {
    stream: TcpStream,
    decoder: FrameDecoder,
    generation: u64,
}

struct Inner {
    state: ConnectionState,
    /// Set by `connect()`, cleared by `disconnect()`; gates reconnects and
    /// discards connects that finish after a disconnect request.
    wanted: bool,
    generation: u64,
    on_message: Option<MessageCallback>,
    on_error: Option<ErrorCallback>,
    on_connection: Option<ConnectionCallback>,
}

struct Shared {
    endpoint: Endpoint,
    opts: TransportOptions,
    inner: Mutex<Inner>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    stop_tx: watch::Sender<bool>,
}

pub struct WebSocketClient {
    shared: Arc<Shared>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketClient {
    /// Validate the URL. No socket is opened here.
    pub fn create(url: &str, opts: TransportOptions) -> Result<Self> {
        let endpoint = Endpoint::parse(url)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (stop_tx, _) = watch::channel(false);

        tracing::info!(
            host = %endpoint.host,
            port = endpoint.port,
            path = %endpoint.path,
            "websocket client created"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                endpoint,
                opts,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    wanted: false,
                    generation: 0,
                    on_message: None,
                    on_error: None,
                    on_connection: None,
                }),
                cmd_tx,
                stop_tx,
            }),
            cmd_rx: Mutex::new(Some(cmd_rx)),
            worker: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn set_message_callback<F>(&self, f: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.shared.lock().on_message = Some(Arc::new(f));
    }

    pub fn set_error_callback<F>(&self, f: F)
    where
        F: Fn(&EnteiError) + Send + Sync + 'static,
    {
        self.shared.lock().on_error = Some(Arc::new(f));
    }

    pub fn set_connection_callback<F>(&self, f: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.shared.lock().on_connection = Some(Arc::new(f));
    }

    /// Resolve, connect, and upgrade. Failures are returned and also reported
    /// through the error callback; the state stays `Disconnected`.
    pub async fn connect(&self) -> Result<()> {
        if *self.shared.stop_tx.borrow() {
            return Err(EnteiError::Cancelled);
        }
        {
            let mut inner = self.shared.lock();
            inner.wanted = true;
            match inner.state {
                ConnectionState::Open | ConnectionState::Connecting => return Ok(()),
                ConnectionState::Disconnected | ConnectionState::Closing => {
                    inner.state = ConnectionState::Connecting;
                }
            }
        }
        self.ensure_worker();
        self.shared.connect_once().await
    }

    /// Close the link if open. Idempotent; also cancels an in-flight connect
    /// and disarms auto-reconnect until the next `connect()`.
    pub fn disconnect(&self) {
        let cb = {
            let mut inner = self.shared.lock();
            inner.wanted = false;
            if inner.state != ConnectionState::Open {
                return;
            }
            inner.state = ConnectionState::Closing;
            let _ = self.shared.cmd_tx.send(Command::Close {
                generation: inner.generation,
            });
            inner.state = ConnectionState::Disconnected;
            inner.on_connection.clone()
        };

        tracing::info!("websocket disconnected");
        if let Some(cb) = cb {
            cb(false);
        }
    }

    /// Queue one masked text frame. Never blocks on the socket.
    pub fn send(&self, text: &str) -> Result<()> {
        let bytes = frame::encode_text(text);
        let inner = self.shared.lock();
        if inner.state != ConnectionState::Open {
            return Err(EnteiError::NotConnected);
        }
        self.shared
            .cmd_tx
            .send(Command::Frame {
                generation: inner.generation,
                bytes,
            })
            .map_err(|_| EnteiError::Internal("transport worker stopped".into()))
    }

    /// Disconnect, stop the worker, and wait for it to exit.
    pub async fn destroy(&self) {
        self.disconnect();
        self.shared.stop_tx.send_replace(true);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "transport worker ended abnormally");
            }
        }
        tracing::debug!("websocket client destroyed");
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return;
        }
        let Some(cmd_rx) = self
            .cmd_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let stop_rx = self.shared.stop_tx.subscribe();
        *worker = Some(tokio::spawn(run_worker(shared, cmd_rx, stop_rx)));
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        // Worker observes this within one poll interval and drops the link.
        self.shared.stop_tx.send_replace(true);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// One attempt. The caller has already moved the state to `Connecting`.
    async fn connect_once(&self) -> Result<()> {
        let result = match handshake::open(
            &self.endpoint,
            self.opts.subprotocol.as_deref(),
            self.opts.connect_timeout,
        )
        .await
        {
            Ok(upgraded) => {
                let mut decoder = FrameDecoder::new(self.opts.max_message_bytes);
                decoder.feed(&upgraded.leftover);
                self.open(upgraded.stream, decoder)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            let cb = {
                let mut inner = self.lock();
                if inner.state == ConnectionState::Connecting {
                    inner.state = ConnectionState::Disconnected;
                }
                inner.on_error.clone()
            };
            if matches!(e, EnteiError::Cancelled) {
                tracing::debug!("connect attempt cancelled");
            } else {
                tracing::debug!(error = %e, code = e.code().as_str(), "websocket connect failed");
                if let Some(cb) = cb {
                    cb(e);
                }
            }
        }
        result
    }

    /// Publish a freshly upgraded stream unless a disconnect or shutdown got
    /// there first.
    fn open(&self, stream: TcpStream, decoder: FrameDecoder) -> Result<()> {
        let cb = {
            let mut inner = self.lock();
            if !inner.wanted || self.stopped() {
                return Err(EnteiError::Cancelled);
            }
            inner.generation += 1;
            let link = Link {
                stream,
                decoder,
                generation: inner.generation,
            };
            // Queued under the lock so it precedes any frame sent once Open.
            self.cmd_tx
                .send(Command::Attach(link))
                .map_err(|_| EnteiError::Internal("transport worker stopped".into()))?;
            inner.state = ConnectionState::Open;
            inner.on_connection.clone()
        };

        tracing::info!(
            host = %self.endpoint.host,
            port = self.endpoint.port,
            "websocket connected"
        );
        if let Some(cb) = cb {
            cb(true);
        }
        Ok(())
    }

    /// A worker-driven attempt was dropped mid-flight.
    fn abandon_connect(&self) {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Connecting {
            inner.state = ConnectionState::Disconnected;
        }
    }

    /// The link of `generation` is gone (peer close, read error, close frame).
    fn link_lost(&self, generation: u64, reason: &str) {
        let cb = {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != ConnectionState::Open {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.on_connection.clone()
        };

        tracing::info!(reason, "websocket connection closed");
        if let Some(cb) = cb {
            cb(false);
        }
    }

    fn dispatch_message(&self, text: String) {
        let cb = self.lock().on_message.clone();
        if let Some(cb) = cb {
            cb(text);
        }
    }

    /// Returns true when the worker should schedule a reconnect attempt.
    fn wants_reconnect(&self) -> bool {
        if !self.opts.auto_reconnect || self.stopped() {
            return false;
        }
        let inner = self.lock();
        inner.wanted && inner.state == ConnectionState::Disconnected
    }

    /// Move to `Connecting` for a worker-driven attempt; false if someone else
    /// is already connecting or the intent was withdrawn.
    fn begin_reconnect(&self) -> bool {
        let mut inner = self.lock();
        if !inner.wanted || inner.state != ConnectionState::Disconnected {
            return false;
        }
        inner.state = ConnectionState::Connecting;
        true
    }
}

enum Wake {
    Stop,
    Command(Option<Command>),
    Read(std::io::Result<usize>),
    Poll,
    Reconnect,
}

async fn run_worker(
    shared: Arc<Shared>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let poll = shared.opts.poll_interval;
    let mut link: Option<Link> = None;
    let mut read_buf = vec![0u8; READ_CHUNK];

    tracing::debug!("transport worker started");

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let wake = match link.as_mut() {
            Some(l) => tokio::select! {
                _ = stop_rx.changed() => Wake::Stop,
                cmd = cmd_rx.recv() => Wake::Command(cmd),
                res = timeout(poll, l.stream.read(&mut read_buf)) => match res {
                    Ok(r) => Wake::Read(r),
                    Err(_) => Wake::Poll,
                },
            },
            None => {
                let reconnect = shared.wants_reconnect();
                tokio::select! {
                    _ = stop_rx.changed() => Wake::Stop,
                    cmd = cmd_rx.recv() => Wake::Command(cmd),
                    _ = sleep(shared.opts.reconnect_interval), if reconnect => Wake::Reconnect,
                    _ = sleep(poll), if !reconnect => Wake::Poll,
                }
            }
        };

        match wake {
            Wake::Stop | Wake::Command(None) => break,
            Wake::Poll => {}
            Wake::Command(Some(cmd)) => handle_command(&shared, &mut link, cmd).await,
            Wake::Read(res) => handle_read(&shared, &mut link, res, &read_buf).await,
            Wake::Reconnect => {
                if shared.begin_reconnect() {
                    tracing::info!(
                        interval_ms = shared.opts.reconnect_interval.as_millis() as u64,
                        "websocket reconnecting"
                    );
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            shared.abandon_connect();
                            tracing::debug!("reconnect attempt abandoned on stop");
                            break;
                        }
                        _ = shared.connect_once() => {}
                    }
                }
            }
        }
    }

    // Frames queued before the stop (a final leave, the close) still go out.
    while let Ok(cmd) = cmd_rx.try_recv() {
        handle_command(&shared, &mut link, cmd).await;
    }
    if let Some(mut l) = link.take() {
        let _ = l.stream.shutdown().await;
    }
    tracing::debug!("transport worker stopped");
}

async fn handle_command(shared: &Shared, link: &mut Option<Link>, cmd: Command) {
    match cmd {
        Command::Attach(new) => {
            if let Some(mut old) = link.replace(new) {
                let _ = old.stream.shutdown().await;
            }
        }
        Command::Frame { generation, bytes } => {
            let Some(l) = link.as_mut().filter(|l| l.generation == generation) else {
                tracing::debug!(generation, "dropping frame for a closed connection");
                return;
            };
            if let Err(e) = l.stream.write_all(&bytes).await {
                tracing::warn!(error = %e, "websocket write failed");
                drop_link(shared, link, "write failed").await;
            }
        }
        Command::Close { generation } => {
            let Some(l) = link.as_mut().filter(|l| l.generation == generation) else {
                return;
            };
            let _ = l.stream.write_all(&frame::encode_close()).await;
            if let Some(mut l) = link.take() {
                let _ = l.stream.shutdown().await;
            }
        }
    }
}

async fn handle_read(
    shared: &Shared,
    link: &mut Option<Link>,
    res: std::io::Result<usize>,
    read_buf: &[u8],
) {
    let n = match res {
        Ok(0) => return drop_link(shared, link, "peer closed").await,
        Ok(n) => n,
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
            ) =>
        {
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "websocket read failed");
            return drop_link(shared, link, "read error").await;
        }
    };

    let Some(l) = link.as_mut() else {
        return;
    };
    l.decoder.feed(read_buf.get(..n).unwrap_or_default());

    loop {
        match l.decoder.next_message() {
            Ok(None) => break,
            Ok(Some(Inbound::Text(text))) => shared.dispatch_message(text),
            Ok(Some(Inbound::Binary(b))) => {
                tracing::debug!(len = b.len(), "ignoring binary message");
            }
            Ok(Some(Inbound::Ping(_))) => {
                if let Err(e) = l.stream.write_all(&PONG_FRAME).await {
                    tracing::warn!(error = %e, "pong write failed");
                    return drop_link(shared, link, "write failed").await;
                }
            }
            Ok(Some(Inbound::Pong(_))) => {}
            Ok(Some(Inbound::Close)) => {
                let _ = l.stream.write_all(&frame::encode_close()).await;
                return drop_link(shared, link, "close frame received").await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "websocket framing error");
                return drop_link(shared, link, "framing error").await;
            }
        }
    }
}

async fn drop_link(shared: &Shared, link: &mut Option<Link>, reason: &str) {
    if let Some(mut l) = link.take() {
        let _ = l.stream.shutdown().await;
        shared.link_lost(l.generation, reason);
    }
}

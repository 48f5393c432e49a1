//! Stream setup: resolve, TCP connect, HTTP upgrade.
//!
//! Each failure class maps to its own error variant so the error callback can
//! tell "host does not resolve" apart from "server refused" and "not a
//! WebSocket endpoint".

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;

use entei_core::error::{EnteiError, Result};
use entei_core::protocol::handshake::{
    build_request, check_response, find_head_end, generate_key, MAX_RESPONSE_HEAD,
};
use entei_core::protocol::url::Endpoint;

/// An upgraded stream plus any frame bytes that arrived with the response head.
pub struct Upgraded {
    pub stream: TcpStream,
    pub leftover: Vec<u8>,
}

pub async fn open(
    endpoint: &Endpoint,
    subprotocol: Option<&str>,
    connect_timeout: Duration,
) -> Result<Upgraded> {
    let addrs: Vec<SocketAddr> = lookup_host(endpoint.socket_addr())
        .await
        .map_err(|e| EnteiError::ResolveFailed(format!("{}: {e}", endpoint.host)))?
        .collect();
    if addrs.is_empty() {
        return Err(EnteiError::ResolveFailed(format!(
            "{}: no addresses",
            endpoint.host
        )));
    }

    let mut stream = None;
    let mut last_err = String::new();
    for addr in addrs {
        match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => {
                stream = Some(s);
                break;
            }
            Ok(Err(e)) => last_err = format!("{addr}: {e}"),
            Err(_) => last_err = format!("{addr}: timed out"),
        }
    }
    let mut stream = stream.ok_or(EnteiError::ConnectFailed(last_err))?;
    let _ = stream.set_nodelay(true);

    let request = build_request(endpoint, &generate_key(), subprotocol);
    let leftover = timeout(connect_timeout, upgrade(&mut stream, &request))
        .await
        .map_err(|_| EnteiError::HandshakeFailed("timed out waiting for response".into()))??;

    Ok(Upgraded { stream, leftover })
}

async fn upgrade(stream: &mut TcpStream, request: &str) -> Result<Vec<u8>> {
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| EnteiError::HandshakeFailed(format!("request write failed: {e}")))?;

    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| EnteiError::HandshakeFailed(format!("response read failed: {e}")))?;
        if n == 0 {
            return Err(EnteiError::HandshakeFailed(
                "connection closed during handshake".into(),
            ));
        }
        buf.extend_from_slice(chunk.get(..n).unwrap_or_default());

        if let Some(end) = find_head_end(&buf) {
            let leftover = buf.split_off(end);
            check_response(&buf)?;
            return Ok(leftover);
        }
        if buf.len() > MAX_RESPONSE_HEAD {
            return Err(EnteiError::HandshakeFailed("response head too large".into()));
        }
    }
}

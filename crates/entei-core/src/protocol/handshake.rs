//! WebSocket opening handshake (client side).
//!
//! The request carries a fresh random `Sec-WebSocket-Key` per attempt. The
//! response is accepted on a `101` status line alone; `Sec-WebSocket-Accept`
//! is not checked.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{EnteiError, Result};
use crate::protocol::url::Endpoint;

/// Upper bound for the response head before the handshake is abandoned.
pub const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Generate a `Sec-WebSocket-Key`: 16 random bytes, base64 encoded.
pub fn generate_key() -> String {
    let nonce: [u8; 16] = rand::random();
    BASE64.encode(nonce)
}

/// Render the HTTP/1.1 upgrade request.
pub fn build_request(endpoint: &Endpoint, key: &str, subprotocol: Option<&str>) -> String {
    let mut req = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n",
        path = endpoint.path,
        host = endpoint.host_header(),
    );
    if let Some(proto) = subprotocol {
        req.push_str("Sec-WebSocket-Protocol: ");
        req.push_str(proto);
        req.push_str("\r\n");
    }
    req.push_str("\r\n");
    req
}

/// Length of the response head including the terminating blank line, once
/// the full head is buffered.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Validate the status line of a response head.
pub fn check_response(head: &[u8]) -> Result<()> {
    let text = String::from_utf8_lossy(head);
    let status_line = text.lines().next().unwrap_or_default();

    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let status = parts.next().unwrap_or_default();

    if !version.starts_with("HTTP/1.") {
        return Err(EnteiError::HandshakeFailed(format!(
            "not an http response: {status_line:?}"
        )));
    }
    if status != "101" {
        return Err(EnteiError::HandshakeFailed(format!(
            "unexpected status line: {status_line:?}"
        )));
    }
    Ok(())
}

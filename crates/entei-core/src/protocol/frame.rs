//! WebSocket frame encode/decode (panic-free).
//!
//! Parsing rules:
//! - Never index past what is buffered; an incomplete frame means "wait for
//!   more bytes", not an error.
//! - The declared length is checked against `max_message_bytes` before any
//!   payload is buffered.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{EnteiError, Result};

pub const OP_CONTINUATION: u8 = 0x0;
pub const OP_TEXT: u8 = 0x1;
pub const OP_BINARY: u8 = 0x2;
pub const OP_CLOSE: u8 = 0x8;
pub const OP_PING: u8 = 0x9;
pub const OP_PONG: u8 = 0xA;

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;

/// Reply to a ping: FIN + pong, zero length, unmasked.
pub const PONG_FRAME: [u8; 2] = [FIN_BIT | OP_PONG, 0x00];

/// One frame as it appeared on the wire, payload already unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: u8,
    pub payload: Bytes,
}

/// Parse one frame from the front of `buf`.
///
/// Returns `Ok(None)` while the frame is incomplete, otherwise the frame and
/// the number of bytes it occupied.
pub fn parse_frame(buf: &[u8], max_payload: usize) -> Result<Option<(Frame, usize)>> {
    let mut cur = buf;
    if cur.remaining() < 2 {
        return Ok(None);
    }

    let b0 = cur.get_u8();
    let b1 = cur.get_u8();
    let fin = (b0 & FIN_BIT) != 0;
    let opcode = b0 & 0x0F;
    let masked = (b1 & MASK_BIT) != 0;

    let declared = match b1 & 0x7F {
        126 => {
            if cur.remaining() < 2 {
                return Ok(None);
            }
            cur.get_u16() as u64
        }
        127 => {
            if cur.remaining() < 8 {
                return Ok(None);
            }
            cur.get_u64()
        }
        n => n as u64,
    };

    if declared > max_payload as u64 {
        return Err(EnteiError::MalformedFrame(format!(
            "frame declares {declared} bytes, limit is {max_payload}"
        )));
    }
    let len = declared as usize;

    let mask = if masked {
        if cur.remaining() < 4 {
            return Ok(None);
        }
        let mut key = [0u8; 4];
        cur.copy_to_slice(&mut key);
        Some(key)
    } else {
        None
    };

    let Some(body) = cur.get(..len) else {
        return Ok(None);
    };
    let header_len = buf.len() - cur.remaining();

    let mut payload = body.to_vec();
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Some((
        Frame {
            fin,
            opcode,
            payload: Bytes::from(payload),
        },
        header_len + len,
    )))
}

fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (b, m) in payload.iter_mut().zip(key.iter().cycle()) {
        *b ^= m;
    }
}

/// Encode a single FIN frame. `mask` must be `Some` for client-to-server frames.
pub fn encode_frame(opcode: u8, payload: &[u8], mask: Option<[u8; 4]>) -> Bytes {
    let len = payload.len();
    let mut out = BytesMut::with_capacity(len + 14);
    out.put_u8(FIN_BIT | (opcode & 0x0F));

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if len < 126 {
        out.put_u8(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.put_u8(mask_bit | 126);
        out.put_u16(len as u16);
    } else {
        out.put_u8(mask_bit | 127);
        out.put_u64(len as u64);
    }

    match mask {
        Some(key) => {
            out.put_slice(&key);
            let start = out.len();
            out.put_slice(payload);
            if let Some(body) = out.get_mut(start..) {
                apply_mask(body, key);
            }
        }
        None => out.put_slice(payload),
    }
    out.freeze()
}

/// Client text frame with a fresh random mask.
pub fn encode_text(text: &str) -> Bytes {
    encode_frame(OP_TEXT, text.as_bytes(), Some(rand::random()))
}

/// Client close frame (no status code) with a fresh random mask.
pub fn encode_close() -> Bytes {
    encode_frame(OP_CLOSE, &[], Some(rand::random()))
}

/// A complete inbound message after reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

#[derive(Debug)]
struct Partial {
    opcode: u8,
    data: Vec<u8>,
}

/// Incremental decoder: feed raw socket bytes, pull complete messages.
///
/// Fragmented data messages are reassembled; control frames may interleave
/// with fragments without disturbing them. Unknown opcodes are skipped.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    partial: Option<Partial>,
    max_message_bytes: usize,
}

impl FrameDecoder {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            partial: None,
            max_message_bytes,
        }
    }

    /// Append bytes read from the socket.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop buffered bytes and any half-assembled message.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.partial = None;
    }

    /// Next complete message, or `None` until more bytes arrive.
    ///
    /// The only error is a frame or reassembled message over the size limit,
    /// after which the stream cannot be resynchronized.
    pub fn next_message(&mut self) -> Result<Option<Inbound>> {
        loop {
            let Some((frame, used)) = parse_frame(&self.buf, self.max_message_bytes)? else {
                return Ok(None);
            };
            self.buf.advance(used);

            match frame.opcode {
                OP_TEXT | OP_BINARY => {
                    if self.partial.take().is_some() {
                        tracing::warn!("data frame interrupted a fragmented message; partial discarded");
                    }
                    if frame.fin {
                        if let Some(msg) = complete(frame.opcode, frame.payload.to_vec()) {
                            return Ok(Some(msg));
                        }
                    } else {
                        self.partial = Some(Partial {
                            opcode: frame.opcode,
                            data: frame.payload.to_vec(),
                        });
                    }
                }
                OP_CONTINUATION => {
                    let Some(mut partial) = self.partial.take() else {
                        tracing::debug!("continuation frame without a started message");
                        continue;
                    };
                    if partial.data.len() + frame.payload.len() > self.max_message_bytes {
                        return Err(EnteiError::MalformedFrame(format!(
                            "fragmented message exceeds {} bytes",
                            self.max_message_bytes
                        )));
                    }
                    partial.data.extend_from_slice(&frame.payload);
                    if frame.fin {
                        if let Some(msg) = complete(partial.opcode, partial.data) {
                            return Ok(Some(msg));
                        }
                    } else {
                        self.partial = Some(partial);
                    }
                }
                OP_CLOSE => return Ok(Some(Inbound::Close)),
                OP_PING => return Ok(Some(Inbound::Ping(frame.payload))),
                OP_PONG => return Ok(Some(Inbound::Pong(frame.payload))),
                other => {
                    tracing::debug!(opcode = other, "ignoring frame with unknown opcode");
                }
            }
        }
    }
}

fn complete(opcode: u8, data: Vec<u8>) -> Option<Inbound> {
    if opcode == OP_BINARY {
        return Some(Inbound::Binary(Bytes::from(data)));
    }
    match String::from_utf8(data) {
        Ok(s) => Some(Inbound::Text(s)),
        Err(e) => {
            tracing::warn!(error = %e, "dropping text message with invalid utf-8");
            None
        }
    }
}

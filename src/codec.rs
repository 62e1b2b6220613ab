//! Binary frame codec for the legacy gateway.
//!
//! ```text
//! frame := TYPE(1) LEN(4) item*
//! item  := TAG(1) ITEMLEN(2) VALUE(ITEMLEN)
//! ```
//!
//! Every integer is big-endian. A frame always carries the five items in tag
//! order: device token, payload, identifier, expiration, priority.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::CodecError,
    models::{
        apns::Priority,
        message::Message,
        validation::{DEVICE_TOKEN_BYTES, decode_device_token},
    },
};

pub const FRAME_TYPE: u8 = 2;
pub const ERROR_REPLY_LEN: usize = 6;
pub const ERROR_REPLY_COMMAND: u8 = 8;

const ITEM_DEVICE_TOKEN: u8 = 1;
const ITEM_PAYLOAD: u8 = 2;
const ITEM_IDENTIFIER: u8 = 3;
const ITEM_EXPIRATION: u8 = 4;
const ITEM_PRIORITY: u8 = 5;

const FRAME_HEADER_LEN: usize = 5;
const ITEM_HEADER_LEN: usize = 3;

/// Absolute expiry in epoch seconds: 0 when no positive ttl is set.
pub fn expiration_for(time_to_live: Option<i64>, now: i64) -> u32 {
    match time_to_live {
        Some(ttl) if ttl > 0 => now.saturating_add(ttl).clamp(0, u32::MAX as i64) as u32,
        _ => 0,
    }
}

/// Encodes `message` for `device_token` into one frame.
///
/// The message must already carry an identifier; `now` is the current epoch
/// second used to compute the expiration item.
pub fn encode_frame(message: &Message, device_token: &str, now: i64) -> Result<Bytes, CodecError> {
    let token = decode_device_token(device_token)?;
    let payload = serde_json::to_vec(message.payload())?;
    if payload.len() > u16::MAX as usize {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }

    let identifier = message.identifier().unwrap_or_default();
    let expiration = expiration_for(message.time_to_live(), now);
    let priority = Priority::for_payload(message.payload());

    let items_len = 5 * ITEM_HEADER_LEN + DEVICE_TOKEN_BYTES + payload.len() + 4 + 4 + 1;
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + items_len);

    frame.put_u8(FRAME_TYPE);
    frame.put_u32(items_len as u32);

    put_item(&mut frame, ITEM_DEVICE_TOKEN, &token);
    put_item(&mut frame, ITEM_PAYLOAD, &payload);
    put_item(&mut frame, ITEM_IDENTIFIER, &identifier.to_be_bytes());
    put_item(&mut frame, ITEM_EXPIRATION, &expiration.to_be_bytes());
    put_item(&mut frame, ITEM_PRIORITY, &[priority.as_byte()]);

    Ok(frame.freeze())
}

fn put_item(frame: &mut BytesMut, tag: u8, value: &[u8]) {
    frame.put_u8(tag);
    frame.put_u16(value.len() as u16);
    frame.put_slice(value);
}

/// A frame read back from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub device_token: [u8; DEVICE_TOKEN_BYTES],
    pub payload: Bytes,
    pub identifier: u32,
    pub expiration: u32,
    pub priority: u8,
}

/// Splits a concatenated stream of frames.
pub fn decode_frames(stream: &[u8]) -> Result<Vec<DecodedFrame>, CodecError> {
    let mut buf = stream;
    let mut frames = Vec::new();

    while buf.has_remaining() {
        if buf.remaining() < FRAME_HEADER_LEN {
            return Err(CodecError::MalformedFrame("truncated frame header"));
        }
        if buf.get_u8() != FRAME_TYPE {
            return Err(CodecError::MalformedFrame("unexpected frame type"));
        }
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(CodecError::MalformedFrame("truncated frame body"));
        }

        frames.push(decode_items(&buf[..len])?);
        buf.advance(len);
    }

    Ok(frames)
}

fn decode_items(mut body: &[u8]) -> Result<DecodedFrame, CodecError> {
    let mut device_token = None;
    let mut payload = None;
    let mut identifier = None;
    let mut expiration = None;
    let mut priority = None;

    while body.has_remaining() {
        if body.remaining() < ITEM_HEADER_LEN {
            return Err(CodecError::MalformedFrame("truncated item header"));
        }
        let tag = body.get_u8();
        let len = body.get_u16() as usize;
        if body.remaining() < len {
            return Err(CodecError::MalformedFrame("truncated item value"));
        }
        let mut value = &body[..len];

        match (tag, len) {
            (ITEM_DEVICE_TOKEN, DEVICE_TOKEN_BYTES) => {
                let mut token = [0u8; DEVICE_TOKEN_BYTES];
                value.copy_to_slice(&mut token);
                device_token = Some(token);
            }
            (ITEM_PAYLOAD, _) => payload = Some(Bytes::copy_from_slice(value)),
            (ITEM_IDENTIFIER, 4) => identifier = Some(value.get_u32()),
            (ITEM_EXPIRATION, 4) => expiration = Some(value.get_u32()),
            (ITEM_PRIORITY, 1) => priority = Some(value.get_u8()),
            _ => return Err(CodecError::MalformedFrame("unknown item or bad item length")),
        }
        body.advance(len);
    }

    Ok(DecodedFrame {
        device_token: device_token.ok_or(CodecError::MalformedFrame("missing device token"))?,
        payload: payload.ok_or(CodecError::MalformedFrame("missing payload"))?,
        identifier: identifier.ok_or(CodecError::MalformedFrame("missing identifier"))?,
        expiration: expiration.ok_or(CodecError::MalformedFrame("missing expiration"))?,
        priority: priority.ok_or(CodecError::MalformedFrame("missing priority"))?,
    })
}

/// Reply sent by the gateway when it rejects a frame. The connection is
/// closed by the gateway right after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReply {
    pub command: u8,
    pub status: u8,
    pub identifier: u32,
}

impl ErrorReply {
    pub fn decode(reply: [u8; ERROR_REPLY_LEN]) -> Self {
        let mut buf = &reply[..];
        Self {
            command: buf.get_u8(),
            status: buf.get_u8(),
            identifier: buf.get_u32(),
        }
    }

    pub fn encode(&self) -> [u8; ERROR_REPLY_LEN] {
        let mut reply = [0u8; ERROR_REPLY_LEN];
        let mut buf = &mut reply[..];
        buf.put_u8(self.command);
        buf.put_u8(self.status);
        buf.put_u32(self.identifier);
        reply
    }
}

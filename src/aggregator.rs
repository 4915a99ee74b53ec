//! The stack-based token aggregator.
//!
//! [`Aggregator`] consumes the flat [`Token`] stream the byte decoder
//! produces and reconstructs fully-formed, possibly-nested array messages,
//! emitting exactly one top-level [`RedisMessage`] per complete RESP frame.
//!
//! [`FrameCodec`] composes [`crate::decoder::ByteDecoder`] with an
//! `Aggregator` and implements both halves of
//! [`tokio_util::codec`] (`Decoder<Item = RedisMessage>` and
//! `Encoder<RedisMessage>`), so a single value drives a `Framed` transport
//! end to end.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::decoder::{ByteDecoder, MAX_ARRAY_LEN};
use crate::error::CodecError;
use crate::message::{RedisMessage, Token};

/// One still-open array frame: the declared remaining child count and the
/// children received so far.
#[derive(Debug)]
struct OpenFrame {
    remaining: i64,
    children: Vec<RedisMessage>,
}

impl OpenFrame {
    fn new(declared_len: i64) -> Self {
        Self {
            remaining: declared_len,
            children: Vec::with_capacity(declared_len.max(0) as usize),
        }
    }

    fn push(&mut self, child: RedisMessage) {
        self.children.push(child);
        self.remaining -= 1;
    }

    fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Reconstructs nested array messages from a flat token stream.
///
/// A consumer that wants the raw token stream instead of assembled arrays
/// simply drives [`crate::decoder::ByteDecoder`] directly instead of
/// routing tokens through this type.
#[derive(Debug, Default)]
pub struct Aggregator {
    stack: Vec<OpenFrame>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one token through the aggregator. Returns `Some(message)` when
    /// a complete top-level frame has just closed, `None` if the token was
    /// absorbed into a still-open array.
    pub fn push(&mut self, token: Token) -> Result<Option<RedisMessage>, CodecError> {
        match token {
            Token::ArrayHeader(len) if len == -1 => self.push_leaf(RedisMessage::null_array()),
            Token::ArrayHeader(0) => self.push_leaf(RedisMessage::empty_array()),
            Token::ArrayHeader(len) if len > 0 && len <= MAX_ARRAY_LEN => {
                self.stack.push(OpenFrame::new(len));
                Ok(None)
            }
            Token::ArrayHeader(len) if len > MAX_ARRAY_LEN => {
                Err(CodecError::LengthOutOfRange(len))
            }
            Token::ArrayHeader(_) => Err(CodecError::MalformedLength),
            Token::Message(msg) => self.push_leaf(msg),
        }
    }

    fn push_leaf(&mut self, mut msg: RedisMessage) -> Result<Option<RedisMessage>, CodecError> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(Some(msg));
            };
            frame.push(msg);
            if !self.stack.last().unwrap().is_complete() {
                return Ok(None);
            }
            let frame = self.stack.pop().unwrap();
            msg = RedisMessage::array(frame.children);
        }
    }

    /// Best-effort cancellation: releases every child accumulated in any
    /// still-open frame. Leaves the aggregator ready to start a fresh
    /// frame.
    pub fn release(&mut self) -> Result<(), CodecError> {
        for frame in self.stack.drain(..) {
            for child in &frame.children {
                child.release()?;
            }
        }
        Ok(())
    }
}

/// The combined decoder/encoder: wires [`ByteDecoder`] and [`Aggregator`]
/// together for hosts that want whole frames, and implements
/// [`tokio_util::codec::Encoder`] for the outbound direction.
#[derive(Debug, Default)]
pub struct FrameCodec {
    decoder: ByteDecoder,
    aggregator: Aggregator,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases any state left over from a mid-frame cancellation.
    pub fn release(&mut self) -> Result<(), CodecError> {
        self.aggregator.release()
    }
}

impl Decoder for FrameCodec {
    type Item = RedisMessage;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RedisMessage>, CodecError> {
        while let Some(token) = self.decoder.decode(buf)? {
            if let Some(msg) = self.aggregator.push(token)? {
                return Ok(Some(msg));
            }
        }
        Ok(None)
    }
}

impl Encoder<RedisMessage> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: RedisMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        crate::encoder::encode(&item, dst)
    }
}

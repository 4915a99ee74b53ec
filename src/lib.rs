//! A streaming codec for the REdis Serialization Protocol (RESP v2).
//!
//! This crate is a bidirectional translator between a byte stream and a
//! typed tree of [`RedisMessage`]s. The hard part is decoding: RESP is
//! framed but length-prefixed and self-nested, so a single logical message
//! (a possibly-nested array) can arrive as an arbitrary number of wire
//! fragments. [`decoder::ByteDecoder`] makes progress on each fragment
//! without buffering more than one frame at a time and without copying
//! payload bytes; [`aggregator::Aggregator`] composes its flat token stream
//! into fully-formed, possibly-nested array messages; [`encoder`]
//! serializes a message tree back to wire bytes.
//!
//! Most hosts want [`aggregator::FrameCodec`], which wires the decoder and
//! aggregator together and implements both halves of
//! [`tokio_util::codec`] so it drops directly into a `Framed` transport:
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use resp_codec::aggregator::FrameCodec;
//! use resp_codec::message::RedisMessage;
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut codec = FrameCodec::new();
//! let mut wire = BytesMut::new();
//! codec
//!     .encode(
//!         RedisMessage::array(vec![RedisMessage::bulk_string(Bytes::from_static(b"PING"))]),
//!         &mut wire,
//!     )
//!     .unwrap();
//! let decoded = codec.decode(&mut wire).unwrap().unwrap();
//! assert_eq!(
//!     decoded,
//!     RedisMessage::array(vec![RedisMessage::bulk_string(Bytes::from_static(b"PING"))])
//! );
//! ```
//!
//! Out of scope, by design: command semantics, connection management,
//! authentication, pipelining policy, and clustering. RESP itself is
//! oblivious to all of these, and so is this crate.

pub mod aggregator;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod message;

pub use error::CodecError;
pub use message::RedisMessage;

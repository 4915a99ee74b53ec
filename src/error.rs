//! Error kinds for the RESP codec.
//!
//! Every fatal condition the decoder, aggregator, or encoder can hit is a
//! variant of [`CodecError`]. "Not enough bytes" is deliberately *not* a
//! variant here — it's represented as `Ok(None)` from
//! [`tokio_util::codec::Decoder::decode`], keeping real errors separate
//! from the resumable "need more data" case.
//!
//! `tokio_util::codec::{Decoder, Encoder}` both require `Error:
//! From<std::io::Error>` so that I/O failures on the underlying transport
//! can be threaded through the same error type; the `Io` variant exists
//! for that alone and is never constructed by this crate's own parsing
//! logic.

use thiserror::Error;

/// A fatal error raised by any stage of the codec.
///
/// All variants are fatal for the connection: the decoder resets to its
/// initial state and the host is expected to close the connection rather
/// than attempt resynchronization.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The first byte of a frame did not match any of `+`, `-`, `:`, `$`, `*`.
    #[error("unknown RESP type byte {0:#04x}")]
    UnknownType(u8),

    /// A decimal length (bulk-string or array) failed to parse, or was a
    /// negative value other than the `-1` null marker.
    #[error("malformed length")]
    MalformedLength,

    /// A declared array length exceeded the supported native index range.
    #[error("array length {0} exceeds the supported range")]
    LengthOutOfRange(i64),

    /// CRLF framing was violated: an LF without a preceding CR, a CR/LF
    /// byte inside inline content, or more than one `-` sign in an integer.
    #[error("framing error: {0}")]
    Framing(&'static str),

    /// A reference-counted node (bulk string or array) was released more
    /// times than it was retained.
    #[error("node released more times than it was retained")]
    DoubleRelease,

    /// An I/O failure on the underlying transport, surfaced through the
    /// same error type `Decoder`/`Encoder` already return.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// `std::io::Error` implements neither `Clone` nor `PartialEq`, so these
// are written by hand rather than derived; every variant besides `Io`
// compares and clones structurally, and `Io` falls back to comparing and
// reconstructing from its `ErrorKind`.
impl Clone for CodecError {
    fn clone(&self) -> Self {
        match self {
            CodecError::UnknownType(b) => CodecError::UnknownType(*b),
            CodecError::MalformedLength => CodecError::MalformedLength,
            CodecError::LengthOutOfRange(n) => CodecError::LengthOutOfRange(*n),
            CodecError::Framing(s) => CodecError::Framing(s),
            CodecError::DoubleRelease => CodecError::DoubleRelease,
            CodecError::Io(e) => CodecError::Io(std::io::Error::from(e.kind())),
        }
    }
}

impl PartialEq for CodecError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CodecError::UnknownType(a), CodecError::UnknownType(b)) => a == b,
            (CodecError::MalformedLength, CodecError::MalformedLength) => true,
            (CodecError::LengthOutOfRange(a), CodecError::LengthOutOfRange(b)) => a == b,
            (CodecError::Framing(a), CodecError::Framing(b)) => a == b,
            (CodecError::DoubleRelease, CodecError::DoubleRelease) => true,
            (CodecError::Io(a), CodecError::Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl Eq for CodecError {}

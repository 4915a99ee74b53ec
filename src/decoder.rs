//! The resumable byte-to-token decoder.
//!
//! [`ByteDecoder`] parses one RESP [`Token`] at a time out of a growing
//! `BytesMut`, suspending (returning `Ok(None)`) whenever it needs bytes
//! that haven't arrived yet. The state plus two scalars (`state`,
//! `type_tag`, `bulk_len`) are the decoder's entire memory between calls —
//! there is no buffered backlog of partially-parsed tokens.

use bytes::{Buf, Bytes, BytesMut};
use memchr::memchr;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::error::CodecError;
use crate::message::{
    is_inline, RedisMessage, Token, TAG_ARRAY, TAG_BULK_STRING, TAG_ERROR, TAG_INTEGER,
    TAG_SIMPLE_STRING,
};

/// The maximum array length this implementation will accept: declared
/// lengths must fit in a native signed 32-bit index.
pub const MAX_ARRAY_LEN: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for the next frame's type byte.
    Type,
    /// Mid-line for an inline type (`+`, `-`, `:`).
    Inline(u8),
    /// Mid-line for a length-prefixed type (`$`, `*`).
    Length(u8),
    /// Type byte was `$` and the declared length has been read; waiting for
    /// `bulk_len` payload bytes plus the trailing CRLF.
    BulkString,
}

/// A resumable, allocation-free-on-the-hot-path RESP token decoder.
///
/// Implements [`tokio_util::codec::Decoder`] with `Item = Token`, so it
/// drops directly into a `Framed` transport for hosts that want raw
/// tokens rather than assembled arrays. Most hosts will instead want
/// [`crate::aggregator::FrameCodec`], which wraps this decoder and the
/// aggregator together to emit whole [`RedisMessage`] frames.
#[derive(Debug, Default)]
pub struct ByteDecoder {
    state: DecodeStateHolder,
}

#[derive(Debug, Clone, Copy)]
struct DecodeStateHolder {
    state: DecodeState,
    bulk_len: i64,
}

impl Default for DecodeStateHolder {
    fn default() -> Self {
        Self {
            state: DecodeState::Type,
            bulk_len: 0,
        }
    }
}

impl ByteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the decoder to its initial state, discarding any in-progress
    /// frame. Called automatically after any fatal error, since this codec
    /// does not attempt mid-stream resynchronization.
    fn reset(&mut self) {
        self.state = DecodeStateHolder::default();
    }

    fn fail(&mut self, err: CodecError) -> Result<Option<Token>, CodecError> {
        warn!(error = %err, "resetting decoder after fatal error");
        self.reset();
        Err(err)
    }
}

/// Finds the CRLF-terminated line starting at the front of `buf`, returning
/// the content (excluding CRLF) and advancing `buf` past it. Returns `Ok(None)`
/// if no LF has arrived yet.
fn take_line(buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
    let Some(lf_pos) = memchr(b'\n', buf) else {
        return Ok(None);
    };
    if lf_pos == 0 || buf[lf_pos - 1] != b'\r' {
        return Err(CodecError::Framing("LF without preceding CR"));
    }
    let mut line = buf.split_to(lf_pos + 1);
    line.truncate(line.len() - 2); // drop the trailing CRLF
    Ok(Some(line.freeze()))
}

/// Parses a signed 64-bit decimal integer using the conventional
/// multiply-subtract idiom (accumulate a non-positive magnitude, negate at
/// the end) so that `i64::MIN` is representable without overflow.
fn parse_integer(line: &[u8]) -> Result<i64, CodecError> {
    let (negative, digits) = match line.first() {
        Some(b'-') => (true, &line[1..]),
        _ => (false, line),
    };
    if digits.is_empty() {
        return Err(CodecError::MalformedLength);
    }
    if digits.contains(&b'-') {
        return Err(CodecError::Framing(
            "more than one '-' sign in a decimal integer",
        ));
    }
    let mut magnitude: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(CodecError::MalformedLength);
        }
        let digit = (byte - b'0') as i64;
        magnitude = magnitude
            .checked_mul(10)
            .and_then(|m| m.checked_sub(digit))
            .ok_or(CodecError::MalformedLength)?;
    }
    if negative {
        Ok(magnitude)
    } else {
        magnitude.checked_neg().ok_or(CodecError::MalformedLength)
    }
}

fn leaf_from_inline(tag: u8, line: Bytes) -> Result<RedisMessage, CodecError> {
    if line.contains(&b'\r') || line.contains(&b'\n') {
        return Err(CodecError::Framing(
            "simple string or error content contains CR/LF",
        ));
    }
    match tag {
        TAG_SIMPLE_STRING => Ok(RedisMessage::simple_string(line)),
        TAG_ERROR => Ok(RedisMessage::error(line)),
        TAG_INTEGER => {
            let value = parse_integer(&line)?;
            Ok(RedisMessage::integer(value))
        }
        other => Err(CodecError::UnknownType(other)),
    }
}

impl Decoder for ByteDecoder {
    type Item = Token;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Token>, CodecError> {
        loop {
            match self.state.state {
                DecodeState::Type => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let tag = buf[0];
                    if !matches!(
                        tag,
                        TAG_SIMPLE_STRING | TAG_ERROR | TAG_INTEGER | TAG_BULK_STRING | TAG_ARRAY
                    ) {
                        return self.fail(CodecError::UnknownType(tag));
                    }
                    buf.advance(1);
                    self.state.state = if is_inline(tag) {
                        DecodeState::Inline(tag)
                    } else {
                        DecodeState::Length(tag)
                    };
                }
                DecodeState::Inline(tag) => {
                    let Some(line) = take_line(buf)? else {
                        return Ok(None);
                    };
                    let msg = match leaf_from_inline(tag, line) {
                        Ok(msg) => msg,
                        Err(err) => return self.fail(err),
                    };
                    trace!(%msg, "decoded inline frame");
                    self.state.state = DecodeState::Type;
                    return Ok(Some(Token::Message(msg)));
                }
                DecodeState::Length(tag) => {
                    let Some(line) = take_line(buf)? else {
                        return Ok(None);
                    };
                    let len = match parse_integer(&line) {
                        Ok(len) => len,
                        Err(err) => return self.fail(err),
                    };
                    if tag == TAG_ARRAY {
                        self.state.state = DecodeState::Type;
                        if len < -1 {
                            return self.fail(CodecError::MalformedLength);
                        }
                        if len > MAX_ARRAY_LEN {
                            return self.fail(CodecError::LengthOutOfRange(len));
                        }
                        return Ok(Some(Token::ArrayHeader(len)));
                    } else {
                        if len < -1 {
                            return self.fail(CodecError::MalformedLength);
                        }
                        self.state.bulk_len = len;
                        self.state.state = DecodeState::BulkString;
                    }
                }
                DecodeState::BulkString => {
                    let len = self.state.bulk_len;
                    if len == -1 {
                        self.state.state = DecodeState::Type;
                        return Ok(Some(Token::Message(RedisMessage::null_bulk_string())));
                    }
                    let needed = len as usize + 2;
                    if buf.len() < needed {
                        return Ok(None);
                    }
                    let mut payload = buf.split_to(needed);
                    let crlf = payload.split_off(len as usize);
                    if crlf.as_ref() != b"\r\n" {
                        return self.fail(CodecError::Framing(
                            "bulk string payload not followed by CRLF",
                        ));
                    }
                    self.state.state = DecodeState::Type;
                    let msg = RedisMessage::bulk_string(payload.freeze());
                    return Ok(Some(Token::Message(msg)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut ByteDecoder, buf: &mut BytesMut) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = decoder.decode(buf).unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn simple_string_fragmented() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::new();
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"+");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"OK");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\r\n");
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::Message(RedisMessage::simple_string(
                Bytes::from_static(b"OK")
            )))
        );
    }

    #[test]
    fn error_with_split_crlf() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"-");
        buf.extend_from_slice(b"ERROR sample message");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\r");
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\n");
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::Message(RedisMessage::error(Bytes::from_static(
                b"ERROR sample message"
            ))))
        );
    }

    #[test]
    fn integer_decodes() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b":1234\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::Message(RedisMessage::integer(1234)))
        );
    }

    #[test]
    fn bulk_string_split_across_payload() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::new();
        for chunk in [
            "$".as_bytes(),
            "21".as_bytes(),
            "\r\n".as_bytes(),
            "bulk\nst".as_bytes(),
            "ring\ntest\n1234".as_bytes(),
            "\r\n".as_bytes(),
        ] {
            buf.extend_from_slice(chunk);
        }
        let tokens = decode_all(&mut decoder, &mut buf);
        assert_eq!(
            tokens,
            vec![Token::Message(RedisMessage::bulk_string(Bytes::from_static(
                b"bulk\nstring\ntest\n1234"
            )))]
        );
    }

    #[test]
    fn null_bulk_string() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"$-1\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::Message(RedisMessage::null_bulk_string()))
        );
    }

    #[test]
    fn empty_bulk_string() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"$0\r\n\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::Message(RedisMessage::empty_bulk_string()))
        );
    }

    #[test]
    fn array_header_emitted_for_positive_length() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"*2\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::ArrayHeader(2))
        );
    }

    #[test]
    fn array_header_null_marker() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"*-1\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Token::ArrayHeader(-1))
        );
    }

    #[test]
    fn unknown_type_byte_is_fatal() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"#-1\r\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf),
            Err(CodecError::UnknownType(b'#'))
        );
    }

    #[test]
    fn negative_bulk_length_other_than_null_is_fatal() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"$-5\r\nhello\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf), Err(CodecError::MalformedLength));
    }

    #[test]
    fn array_length_over_supported_range_is_fatal() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(format!("*{}\r\n", MAX_ARRAY_LEN + 1).as_bytes());
        assert_eq!(
            decoder.decode(&mut buf),
            Err(CodecError::LengthOutOfRange(MAX_ARRAY_LEN + 1))
        );
    }

    #[test]
    fn lf_without_preceding_cr_is_fatal() {
        let mut decoder = ByteDecoder::new();
        let mut buf = BytesMut::from(&b"+OK\n"[..]);
        assert_eq!(
            decoder.decode(&mut buf),
            Err(CodecError::Framing("LF without preceding CR"))
        );
    }

    #[test]
    fn min_i64_round_trips_through_integer_parsing() {
        assert_eq!(parse_integer(b"-9223372036854775808").unwrap(), i64::MIN);
    }

    #[test]
    fn multiple_minus_signs_are_a_framing_error() {
        assert_eq!(
            parse_integer(b"-12-3"),
            Err(CodecError::Framing(
                "more than one '-' sign in a decimal integer"
            ))
        );
    }

    #[test]
    fn fragmentation_independence_byte_at_a_time() {
        let whole = b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Foo\r\n-Bar\r\n";

        let mut one_shot_decoder = ByteDecoder::new();
        let mut one_shot_buf = BytesMut::from(&whole[..]);
        let one_shot_tokens = decode_all(&mut one_shot_decoder, &mut one_shot_buf);

        let mut fragmented_decoder = ByteDecoder::new();
        let mut fragmented_buf = BytesMut::new();
        let mut fragmented_tokens = Vec::new();
        for &byte in whole {
            fragmented_buf.extend_from_slice(&[byte]);
            while let Some(token) = fragmented_decoder.decode(&mut fragmented_buf).unwrap() {
                fragmented_tokens.push(token);
            }
        }

        assert_eq!(one_shot_tokens, fragmented_tokens);
    }
}

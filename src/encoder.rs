//! The two-phase RESP encoder.
//!
//! [`encode`] walks a [`RedisMessage`] tree once to compute its exact wire
//! size, allocates a buffer of exactly that size, then walks the tree again
//! to emit it. This avoids `BytesMut`'s amortized-growth reallocation path
//! entirely, which matters for large nested arrays.

use bytes::{BufMut, BytesMut};

use crate::error::CodecError;
use crate::message::{ArrayValue, BulkStringValue, RedisMessage};

const CRLF: &[u8] = b"\r\n";

fn ascii_len(value: i64) -> usize {
    itoa_bytes(value).len()
}

/// Renders `value` as ASCII decimal without allocating a `String`.
fn itoa_bytes(value: i64) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Phase 1: the exact number of wire bytes `msg` will occupy.
fn size_of(msg: &RedisMessage) -> usize {
    match msg {
        RedisMessage::SimpleString(s) | RedisMessage::Error(s) => 1 + s.len() + 2,
        RedisMessage::Integer(i) => 1 + ascii_len(*i) + 2,
        RedisMessage::BulkString(BulkStringValue::Null) => 5, // "$-1\r\n"
        RedisMessage::BulkString(BulkStringValue::Empty) => 6, // "$0\r\n\r\n"
        RedisMessage::BulkString(BulkStringValue::Owned(node)) => {
            let len = node.data().len();
            1 + ascii_len(len as i64) + 2 + len + 2
        }
        RedisMessage::Array(ArrayValue::Null) => 5, // "*-1\r\n"
        RedisMessage::Array(ArrayValue::Empty) => 4, // "*0\r\n"
        RedisMessage::Array(ArrayValue::Owned(node)) => {
            let children = node
                .children()
                .expect("encoding a released array is a programmer error");
            let count = children.len();
            let mut total = 1 + ascii_len(count as i64) + 2;
            for child in children.iter() {
                total += size_of(child);
            }
            total
        }
    }
}

/// Phase 2: emits `msg` into `dst`, which must already have at least
/// `size_of(msg)` spare capacity.
fn write_into(msg: &RedisMessage, dst: &mut BytesMut) {
    match msg {
        RedisMessage::SimpleString(s) => {
            dst.put_u8(b'+');
            dst.put_slice(s);
            dst.put_slice(CRLF);
        }
        RedisMessage::Error(s) => {
            dst.put_u8(b'-');
            dst.put_slice(s);
            dst.put_slice(CRLF);
        }
        RedisMessage::Integer(i) => {
            dst.put_u8(b':');
            dst.put_slice(&itoa_bytes(*i));
            dst.put_slice(CRLF);
        }
        RedisMessage::BulkString(BulkStringValue::Null) => dst.put_slice(b"$-1\r\n"),
        RedisMessage::BulkString(BulkStringValue::Empty) => dst.put_slice(b"$0\r\n\r\n"),
        RedisMessage::BulkString(BulkStringValue::Owned(node)) => {
            let data = node.data();
            dst.put_u8(b'$');
            dst.put_slice(&itoa_bytes(data.len() as i64));
            dst.put_slice(CRLF);
            dst.put_slice(data);
            dst.put_slice(CRLF);
        }
        RedisMessage::Array(ArrayValue::Null) => dst.put_slice(b"*-1\r\n"),
        RedisMessage::Array(ArrayValue::Empty) => dst.put_slice(b"*0\r\n"),
        RedisMessage::Array(ArrayValue::Owned(node)) => {
            let children = node
                .children()
                .expect("encoding a released array is a programmer error");
            dst.put_u8(b'*');
            dst.put_slice(&itoa_bytes(children.len() as i64));
            dst.put_slice(CRLF);
            for child in children.iter() {
                write_into(child, dst);
            }
        }
    }
}

/// Encodes `msg` into `dst`, reserving exactly the bytes required in one
/// pass before writing in a second. The companion to
/// [`crate::decoder::ByteDecoder`] / [`crate::aggregator::Aggregator`]:
/// `decode(encode(m))` is structurally equal to `m` for every well-formed
/// `m`.
pub fn encode(msg: &RedisMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
    let size = size_of(msg);
    dst.reserve(size);
    let before = dst.len();
    write_into(msg, dst);
    debug_assert_eq!(dst.len() - before, size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn encode_to_vec(msg: &RedisMessage) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode(msg, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn encodes_nested_array() {
        let msg = RedisMessage::array(vec![
            RedisMessage::simple_string(Bytes::from_static(b"foo")),
            RedisMessage::array(vec![
                RedisMessage::bulk_string(Bytes::from_static(b"bar")),
                RedisMessage::integer(-1234),
            ]),
        ]);
        assert_eq!(
            encode_to_vec(&msg),
            b"*2\r\n+foo\r\n*2\r\n$3\r\nbar\r\n:-1234\r\n".to_vec()
        );
    }

    #[test]
    fn encodes_null_and_empty_arrays() {
        assert_eq!(encode_to_vec(&RedisMessage::null_array()), b"*-1\r\n");
        assert_eq!(encode_to_vec(&RedisMessage::empty_array()), b"*0\r\n");
    }

    #[test]
    fn encodes_null_and_empty_bulk_strings() {
        assert_eq!(encode_to_vec(&RedisMessage::null_bulk_string()), b"$-1\r\n");
        assert_eq!(
            encode_to_vec(&RedisMessage::empty_bulk_string()),
            b"$0\r\n\r\n"
        );
    }

    #[test]
    fn min_i64_encodes_without_overflow() {
        assert_eq!(
            encode_to_vec(&RedisMessage::integer(i64::MIN)),
            b":-9223372036854775808\r\n".to_vec()
        );
    }

    #[test]
    fn round_trip_through_decoder() {
        use crate::aggregator::FrameCodec;
        use tokio_util::codec::Decoder;

        let original = RedisMessage::array(vec![
            RedisMessage::simple_string(Bytes::from_static(b"OK")),
            RedisMessage::bulk_string(Bytes::from_static(b"payload")),
            RedisMessage::integer(i64::MAX),
            RedisMessage::null_bulk_string(),
            RedisMessage::empty_array(),
        ]);

        let mut buf = BytesMut::new();
        encode(&original, &mut buf).unwrap();

        let mut codec = FrameCodec::new();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, original);
    }
}

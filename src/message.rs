//! The RESP message model.
//!
//! See [the module overview](crate) for how this fits into the decoder /
//! aggregator / encoder pipeline. This module owns the tagged-variant
//! `RedisMessage` tree and the manual reference-count discipline its
//! bulk-string and array variants carry.
//!
//! In RESP, the type of some data depends on the first byte:
//! * For Simple Strings the first byte of the reply is `+`
//! * For Errors the first byte of the reply is `-`
//! * For Integers the first byte of the reply is `:`
//! * For Bulk Strings the first byte of the reply is `$`
//! * For Arrays the first byte of the reply is `*`

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;

use crate::error::CodecError;

/// Type-tag bytes, bit-exact per the wire format.
pub const TAG_SIMPLE_STRING: u8 = b'+';
pub const TAG_ERROR: u8 = b'-';
pub const TAG_INTEGER: u8 = b':';
pub const TAG_BULK_STRING: u8 = b'$';
pub const TAG_ARRAY: u8 = b'*';

/// True for the three line-terminated scalar types (`+`, `-`, `:`); false
/// for the two length-prefixed types (`$`, `*`).
pub fn is_inline(tag: u8) -> bool {
    matches!(tag, TAG_SIMPLE_STRING | TAG_ERROR | TAG_INTEGER)
}

/// Predefined simple strings, interned on construction. Interning only
/// affects decoder-side reuse; it has no wire effect.
const INTERNED_SIMPLE_STRINGS: &[&str] = &["OK", "QUEUED", "PONG"];

/// Predefined errors, interned on construction.
const INTERNED_ERRORS: &[&str] = &["ERR", "WRONGTYPE", "NOAUTH"];

/// A reference-counted array node: the declared children plus a logical
/// refcount layered on top of the `Rc`'s own memory management.
#[derive(Debug)]
pub struct ArrayNode {
    children: RefCell<Option<Vec<RedisMessage>>>,
    refs: Cell<u32>,
}

impl ArrayNode {
    fn new(children: Vec<RedisMessage>) -> Rc<Self> {
        Rc::new(Self {
            children: RefCell::new(Some(children)),
            refs: Cell::new(1),
        })
    }

    /// Borrow the children, if this node has not yet been fully released.
    pub fn children(&self) -> Option<std::cell::Ref<'_, Vec<RedisMessage>>> {
        let borrow = self.children.borrow();
        if borrow.is_some() {
            Some(std::cell::Ref::map(borrow, |o| o.as_ref().unwrap()))
        } else {
            None
        }
    }

    fn retain(&self) -> Result<(), CodecError> {
        if self.refs.get() == 0 {
            return Err(CodecError::DoubleRelease);
        }
        self.refs.set(self.refs.get() + 1);
        Ok(())
    }

    fn release(&self) -> Result<(), CodecError> {
        if self.refs.get() == 0 {
            return Err(CodecError::DoubleRelease);
        }
        self.refs.set(self.refs.get() - 1);
        if self.refs.get() == 0 {
            if let Some(children) = self.children.borrow_mut().take() {
                for child in &children {
                    child.release()?;
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for ArrayNode {
    fn eq(&self, other: &Self) -> bool {
        *self.children.borrow() == *other.children.borrow()
    }
}

/// A reference-counted bulk-string node: an owned zero-copy slice plus the
/// same logical refcount as [`ArrayNode`].
#[derive(Debug)]
pub struct BulkStringNode {
    data: Bytes,
    refs: Cell<u32>,
}

impl BulkStringNode {
    fn new(data: Bytes) -> Rc<Self> {
        Rc::new(Self {
            data,
            refs: Cell::new(1),
        })
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn retain(&self) -> Result<(), CodecError> {
        if self.refs.get() == 0 {
            return Err(CodecError::DoubleRelease);
        }
        self.refs.set(self.refs.get() + 1);
        Ok(())
    }

    fn release(&self) -> Result<(), CodecError> {
        if self.refs.get() == 0 {
            return Err(CodecError::DoubleRelease);
        }
        self.refs.set(self.refs.get() - 1);
        Ok(())
    }
}

impl PartialEq for BulkStringNode {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

/// The RESP data type: a tagged union of the five observable variants.
///
/// `BulkString` and `Array` distinguish null, empty, and owned forms
/// directly in their payload rather than via a sentinel length, since that
/// is the distinction Rust's type system expresses naturally.
#[derive(Debug, Clone, PartialEq)]
pub enum RedisMessage {
    /// `+content\r\n`. Content may not contain CR or LF.
    SimpleString(Bytes),
    /// `-content\r\n`. Content may not contain CR or LF.
    Error(Bytes),
    /// `:<ascii-signed-int>\r\n`.
    Integer(i64),
    /// `$-1\r\n`, `$0\r\n\r\n`, or `$<len>\r\n<len bytes>\r\n`.
    BulkString(BulkStringValue),
    /// `*-1\r\n`, `*0\r\n`, or `*<count>\r\n<count messages>`.
    Array(ArrayValue),
}

/// The three forms a bulk string may take.
#[derive(Debug, Clone)]
pub enum BulkStringValue {
    Null,
    Empty,
    Owned(Rc<BulkStringNode>),
}

impl PartialEq for BulkStringValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BulkStringValue::Null, BulkStringValue::Null) => true,
            (BulkStringValue::Empty, BulkStringValue::Empty) => true,
            (BulkStringValue::Owned(a), BulkStringValue::Owned(b)) => a == b || **a == **b,
            _ => false,
        }
    }
}

/// The three forms an array may take.
#[derive(Debug, Clone)]
pub enum ArrayValue {
    Null,
    Empty,
    Owned(Rc<ArrayNode>),
}

impl PartialEq for ArrayValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArrayValue::Null, ArrayValue::Null) => true,
            (ArrayValue::Empty, ArrayValue::Empty) => true,
            (ArrayValue::Owned(a), ArrayValue::Owned(b)) => a == b || **a == **b,
            _ => false,
        }
    }
}

/// A unit emitted by the byte decoder: either a complete leaf message, or
/// the header of an array whose children are still to come.
///
/// `ArrayHeader` is not itself a valid terminal message; the aggregator (or
/// a streaming consumer that bypasses it) must consume it before the next
/// frame can be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Message(RedisMessage),
    /// Declared child count; negative values encode null (`-1`).
    ArrayHeader(i64),
}

impl RedisMessage {
    /// Builds a simple string, interning exact matches against a small
    /// table of common replies (`OK`, `QUEUED`, `PONG`).
    pub fn simple_string(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        for candidate in INTERNED_SIMPLE_STRINGS {
            if bytes.as_ref() == candidate.as_bytes() {
                return RedisMessage::SimpleString(Bytes::from_static(candidate.as_bytes()));
            }
        }
        RedisMessage::SimpleString(bytes)
    }

    /// Builds an error, interning exact matches against a small table of
    /// common error strings (`ERR`, `WRONGTYPE`, `NOAUTH`).
    pub fn error(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        for candidate in INTERNED_ERRORS {
            if bytes.as_ref() == candidate.as_bytes() {
                return RedisMessage::Error(Bytes::from_static(candidate.as_bytes()));
            }
        }
        RedisMessage::Error(bytes)
    }

    /// Builds an integer.
    pub fn integer(value: i64) -> Self {
        RedisMessage::Integer(value)
    }

    /// The null bulk string singleton (`$-1\r\n`).
    pub fn null_bulk_string() -> Self {
        RedisMessage::BulkString(BulkStringValue::Null)
    }

    /// The empty bulk string singleton (`$0\r\n\r\n`).
    pub fn empty_bulk_string() -> Self {
        RedisMessage::BulkString(BulkStringValue::Empty)
    }

    /// Builds a non-null, non-empty bulk string from a zero-copy slice.
    /// Empty input yields the empty singleton, per the null/empty
    /// distinction this protocol requires even on the construction path.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return RedisMessage::empty_bulk_string();
        }
        RedisMessage::BulkString(BulkStringValue::Owned(BulkStringNode::new(data)))
    }

    /// The null array singleton (`*-1\r\n`).
    pub fn null_array() -> Self {
        RedisMessage::Array(ArrayValue::Null)
    }

    /// The empty array singleton (`*0\r\n`).
    pub fn empty_array() -> Self {
        RedisMessage::Array(ArrayValue::Empty)
    }

    /// Builds a non-null, non-empty array owning the given children.
    /// Empty input yields the empty singleton.
    pub fn array(children: Vec<RedisMessage>) -> Self {
        if children.is_empty() {
            return RedisMessage::empty_array();
        }
        RedisMessage::Array(ArrayValue::Owned(ArrayNode::new(children)))
    }

    /// Takes an extra logical reference on this node. A no-op for variants
    /// without a release obligation (integer, null/empty singletons,
    /// simple string, error).
    pub fn retain(&self) -> Result<(), CodecError> {
        match self {
            RedisMessage::BulkString(BulkStringValue::Owned(node)) => node.retain(),
            RedisMessage::Array(ArrayValue::Owned(node)) => node.retain(),
            _ => Ok(()),
        }
    }

    /// Releases a logical reference on this node. For arrays, releasing the
    /// last reference recursively releases each child exactly once.
    /// Releasing an already-fully-released node surfaces
    /// [`CodecError::DoubleRelease`].
    pub fn release(&self) -> Result<(), CodecError> {
        match self {
            RedisMessage::BulkString(BulkStringValue::Owned(node)) => node.release(),
            RedisMessage::Array(ArrayValue::Owned(node)) => node.release(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for RedisMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedisMessage::SimpleString(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            RedisMessage::Error(e) => write!(f, "(error) {}", String::from_utf8_lossy(e)),
            RedisMessage::Integer(i) => write!(f, "{}", i),
            RedisMessage::BulkString(BulkStringValue::Null) => write!(f, "(nil)"),
            RedisMessage::BulkString(BulkStringValue::Empty) => write!(f, "\"\""),
            RedisMessage::BulkString(BulkStringValue::Owned(node)) => {
                write!(f, "{:?}", String::from_utf8_lossy(&node.data))
            }
            RedisMessage::Array(ArrayValue::Null) => write!(f, "(nil)"),
            RedisMessage::Array(ArrayValue::Empty) => write!(f, "(empty array)"),
            RedisMessage::Array(ArrayValue::Owned(node)) => {
                let children = node.children();
                match children {
                    Some(children) => {
                        write!(f, "[")?;
                        for (i, child) in children.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", child)?;
                        }
                        write!(f, "]")
                    }
                    None => write!(f, "[released]"),
                }
            }
        }
    }
}

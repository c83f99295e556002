//! # Key Module
//!
//! User-key ordering, value kinds, sequence numbers, and the internal-key
//! wire codec shared by every other module.
//!
//! ## Wire format
//!
//! An encoded internal key is the user key followed by a packed 8-byte
//! trailer:
//!
//! ```text
//! [USER_KEY_BYTES][fixed64_be(sequence << 8 | kind)]
//! ```
//!
//! The sequence number occupies the upper 56 bits of the trailer, the
//! value kind the lowest byte. All multi-byte integers are **big-endian**.
//!
//! ## Ordering invariants
//!
//! - User keys are ordered by a caller-chosen [`UserKeyOrder`]; the core
//!   never interprets key bytes beyond ordering.
//! - Internal keys order by user key ascending, then sequence
//!   **descending**, then kind descending. Newer versions of a key sort
//!   before older ones.
//! - Sequence `0` is reserved system-wide as the "no tombstone" sentinel;
//!   [`MAX_SEQUENCE_NUMBER`] is reserved as "newer than any snapshot".

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::cmp::Ordering;

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Sequence numbers
// ------------------------------------------------------------------------------------------------

/// Monotonic version number assigned by the storage engine.
pub type SequenceNumber = u64;

/// Largest representable sequence number (56 bits).
///
/// Reserved for keys that must sort before every real version of the same
/// user key, e.g. untruncated tombstone endpoints and seek targets.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors produced when decoding an internal key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The encoded key is shorter than the 8-byte packed trailer.
    #[error("internal key too short: {0} bytes")]
    TooShort(usize),

    /// The kind byte does not name a known [`ValueKind`].
    #[error("unknown value kind byte: 0x{0:02x}")]
    UnknownKind(u8),
}

// ------------------------------------------------------------------------------------------------
// Value kinds
// ------------------------------------------------------------------------------------------------

/// The operation a record represents, packed into the low byte of the
/// internal-key trailer.
///
/// Discriminants are part of the wire format and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueKind {
    /// Point tombstone.
    Deletion = 0,

    /// Concrete key-value pair.
    Value = 1,

    /// Range tombstone; the record's value carries the end user key.
    RangeDeletion = 15,

    /// Sorts before every real kind at the same `(user_key, sequence)`.
    /// Only appears in synthesized keys (partial-tombstone endpoints),
    /// never on disk.
    Max = 255,
}

impl ValueKind {
    /// Decode a kind byte.
    pub fn from_byte(byte: u8) -> Result<Self, ParseError> {
        match byte {
            0 => Ok(ValueKind::Deletion),
            1 => Ok(ValueKind::Value),
            15 => Ok(ValueKind::RangeDeletion),
            255 => Ok(ValueKind::Max),
            other => Err(ParseError::UnknownKind(other)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// User-key ordering
// ------------------------------------------------------------------------------------------------

/// Total order on user keys.
///
/// The engine supplies one order per column family; both directions of
/// plain bytewise comparison are supported. All maps, stripes and
/// iterators built from one aggregator share the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserKeyOrder {
    /// Lexicographic byte order.
    #[default]
    Bytewise,

    /// Reversed lexicographic byte order.
    ReverseBytewise,
}

impl UserKeyOrder {
    /// Compare two user keys under this order.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            UserKeyOrder::Bytewise => a.cmp(b),
            UserKeyOrder::ReverseBytewise => b.cmp(a),
        }
    }

    /// Compare two parsed internal keys: user key ascending, then
    /// sequence descending, then kind descending.
    pub fn compare_internal(
        &self,
        a: (&[u8], SequenceNumber, ValueKind),
        b: (&[u8], SequenceNumber, ValueKind),
    ) -> Ordering {
        self.compare(a.0, b.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| (b.2 as u8).cmp(&(a.2 as u8)))
    }
}

// ------------------------------------------------------------------------------------------------
// Parsed internal key (borrowed view)
// ------------------------------------------------------------------------------------------------

/// A decoded internal key borrowing the user-key bytes from the encoded
/// form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    /// The user-key portion.
    pub user_key: &'a [u8],

    /// Version of this record.
    pub sequence: SequenceNumber,

    /// Operation kind.
    pub kind: ValueKind,
}

impl<'a> ParsedInternalKey<'a> {
    /// Decode an encoded internal key.
    ///
    /// Fails if the buffer is shorter than the packed trailer or the kind
    /// byte is unknown.
    pub fn parse(encoded: &'a [u8]) -> Result<Self, ParseError> {
        if encoded.len() < 8 {
            return Err(ParseError::TooShort(encoded.len()));
        }
        let (user_key, trailer) = encoded.split_at(encoded.len() - 8);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(trailer);
        let packed = u64::from_be_bytes(raw);
        Ok(Self {
            user_key,
            sequence: packed >> 8,
            kind: ValueKind::from_byte((packed & 0xff) as u8)?,
        })
    }

    /// Materialize an owned [`InternalKey`] with the same contents.
    pub fn to_owned(&self) -> InternalKey {
        InternalKey::new(self.user_key.to_vec(), self.sequence, self.kind)
    }
}

// ------------------------------------------------------------------------------------------------
// Internal key (owned)
// ------------------------------------------------------------------------------------------------

/// An owned internal key, stored decoded.
///
/// Used for file boundary keys and output-file metadata, where the key
/// outlives the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    user_key: Vec<u8>,
    sequence: SequenceNumber,
    kind: ValueKind,
}

impl InternalKey {
    pub fn new(user_key: Vec<u8>, sequence: SequenceNumber, kind: ValueKind) -> Self {
        Self {
            user_key,
            sequence,
            kind,
        }
    }

    /// Decode from wire form.
    pub fn decode(encoded: &[u8]) -> Result<Self, ParseError> {
        Ok(ParsedInternalKey::parse(encoded)?.to_owned())
    }

    /// Encode to wire form.
    pub fn encode(&self) -> Vec<u8> {
        encode_internal_key(&self.user_key, self.sequence, self.kind)
    }

    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Borrow as a [`ParsedInternalKey`].
    pub fn as_parsed(&self) -> ParsedInternalKey<'_> {
        ParsedInternalKey {
            user_key: &self.user_key,
            sequence: self.sequence,
            kind: self.kind,
        }
    }

    /// Full internal-key comparison under `order`.
    pub fn compare(&self, other: &InternalKey, order: UserKeyOrder) -> Ordering {
        order.compare_internal(
            (&self.user_key, self.sequence, self.kind),
            (&other.user_key, other.sequence, other.kind),
        )
    }
}

/// Encode `user_key || fixed64_be(sequence << 8 | kind)`.
pub fn encode_internal_key(user_key: &[u8], sequence: SequenceNumber, kind: ValueKind) -> Vec<u8> {
    let mut buf = Vec::with_capacity(user_key.len() + 8);
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(&((sequence << 8) | kind as u64).to_be_bytes());
    buf
}

// ------------------------------------------------------------------------------------------------
// Tracing Helper
// ------------------------------------------------------------------------------------------------

/// Renders a key as hex for tracing output, eliding long keys.
pub(crate) struct HexKey<'a>(pub &'a [u8]);

impl<'a> std::fmt::Display for HexKey<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() <= 32 {
            for byte in self.0 {
                write!(f, "{:02x}", byte)?;
            }
        } else {
            for byte in &self.0[..16] {
                write!(f, "{:02x}", byte)?;
            }
            write!(f, "...[{} bytes]", self.0.len())?;
        }
        Ok(())
    }
}

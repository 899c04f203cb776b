//! Typed method arguments for contract calls.

use sbor::prelude::*;
use std::fmt;

/// A typed argument passed to or returned from a contract method.
///
/// The argument array is the only value surface between callers and
/// contracts: transaction inputs, method outputs, and SDK call payloads all
/// travel as `Vec<Argument>`.
#[derive(Clone, PartialEq, Eq, BasicSbor)]
pub enum Argument {
    /// 32-bit unsigned integer.
    Uint32(u32),
    /// 64-bit unsigned integer.
    Uint64(u64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Argument {
    /// The u32 value, if this argument is one.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Argument::Uint32(v) => Some(*v),
            _ => None,
        }
    }

    /// The u64 value, if this argument is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Argument::Uint64(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this argument is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes value, if this argument is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Argument::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Encoded size estimate used for block byte budgeting.
    pub fn size_bytes(&self) -> usize {
        match self {
            Argument::Uint32(_) => 4,
            Argument::Uint64(_) => 8,
            Argument::String(s) => s.len(),
            Argument::Bytes(b) => b.len(),
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Uint32(v) => write!(f, "u32:{v}"),
            Argument::Uint64(v) => write!(f, "u64:{v}"),
            Argument::String(v) => write!(f, "str:{v:?}"),
            Argument::Bytes(v) => write!(f, "bytes:{}", hex::encode(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Argument::Uint32(7).as_u32(), Some(7));
        assert_eq!(Argument::Uint64(7).as_u64(), Some(7));
        assert_eq!(Argument::String("x".into()).as_str(), Some("x"));
        assert_eq!(Argument::Bytes(vec![1]).as_bytes(), Some(&[1u8][..]));
        assert_eq!(Argument::Uint32(7).as_u64(), None);
    }

    #[test]
    fn test_sbor_roundtrip() {
        let args = vec![
            Argument::Uint32(1),
            Argument::Uint64(2),
            Argument::String("hello".into()),
            Argument::Bytes(vec![0xde, 0xad]),
        ];
        let encoded = basic_encode(&args).unwrap();
        let decoded: Vec<Argument> = sbor::basic_decode(&encoded).unwrap();
        assert_eq!(args, decoded);
    }
}

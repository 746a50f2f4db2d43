//! Fixed-size datum encodings
//!
//! Every datum encodes to exactly `SIZE` bytes so position `p` lives at byte
//! `p * SIZE` of the persisted list, with no offset table.
//!
//! Ordering is total (`Ord`) so views can use `BTreeMap` and iterate
//! deterministically.

use std::fmt;

use crc32fast::Hasher;

use super::errors::{IndexError, IndexResult};

/// A value stored once per container position
pub trait FixedDatum: Clone + Ord + fmt::Debug + Send + 'static {
    /// Encoded length in bytes
    const SIZE: usize;

    /// Encode into `buf`, which is exactly `SIZE` bytes long
    fn encode(&self, buf: &mut [u8]);

    /// Decode from exactly `SIZE` bytes; `None` if the bytes are not a valid datum
    fn decode(bytes: &[u8]) -> Option<Self>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE];
        self.encode(&mut buf);
        buf
    }
}

impl FixedDatum for u32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }
}

impl FixedDatum for u64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }
}

impl FixedDatum for i64 {
    const SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        Some(i64::from_le_bytes(bytes.try_into().ok()?))
    }
}

/// CRC32 (IEEE) of an item's serialized content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Crc32(pub u32);

impl Crc32 {
    /// Checksum of `data`
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(data);
        Crc32(hasher.finalize())
    }

    /// Whether `data` still hashes to this checksum
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }

    /// Raw checksum value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Crc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FixedDatum for Crc32 {
    const SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        self.0.encode(buf);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        u32::decode(bytes).map(Crc32)
    }
}

/// UTF-8 string key, zero padded to `N` bytes
///
/// Keys may not contain NUL, so trailing zeros always mark padding.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedKey<const N: usize> {
    key: String,
}

impl<const N: usize> FixedKey<N> {
    /// Validate and wrap `key`
    pub fn new(key: impl Into<String>) -> IndexResult<Self> {
        let key = key.into();
        if key.len() > N {
            return Err(IndexError::contract_violation(format!(
                "Key '{}' is {} bytes, limit is {}",
                key,
                key.len(),
                N
            )));
        }
        if key.contains('\0') {
            return Err(IndexError::contract_violation(
                "Key may not contain NUL bytes",
            ));
        }
        Ok(Self { key })
    }

    /// Key text
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl<const N: usize> fmt::Debug for FixedKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.key)
    }
}

impl<const N: usize> fmt::Display for FixedKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl<const N: usize> FixedDatum for FixedKey<N> {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        let bytes = self.key.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf[bytes.len()..].fill(0);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != N {
            return None;
        }
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(N);
        if bytes[end..].iter().any(|b| *b != 0) {
            return None;
        }
        let key = std::str::from_utf8(&bytes[..end]).ok()?;
        Some(Self {
            key: key.to_string(),
        })
    }
}

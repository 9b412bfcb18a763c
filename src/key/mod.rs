//! Composite key byte sequences.

mod builder;

pub use builder::{FieldValue, KeyBuilder};
pub(crate) use builder::{encode_cell, PRESENT};

use std::{borrow::Borrow, cmp::Ordering, fmt, hash::Hash, sync::Arc};

/// An immutable, order-preserving composite key.
///
/// Comparison, equality and hashing are defined on the bytes alone; the
/// field count and null bitmap are carried as metadata for readers that
/// decode the key.
#[derive(Clone)]
pub struct EncodedKey {
    bytes: Arc<[u8]>,
    field_count: u16,
    null_bitmap: u64,
}

impl EncodedKey {
    /// Wraps raw key bytes together with decode metadata.
    pub fn new(bytes: Vec<u8>, field_count: u16, null_bitmap: u64) -> Self {
        EncodedKey {
            bytes: bytes.into(),
            field_count,
            null_bitmap,
        }
    }

    /// Wraps raw key bytes without field metadata, e.g. a key read back
    /// from storage or received as a resume token.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        EncodedKey::new(bytes, 0, 0)
    }

    /// The key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of fields encoded into this key, when known.
    pub fn field_count(&self) -> u16 {
        self.field_count
    }

    /// Whether the field at `position` was NULL when the key was built.
    pub fn is_null(&self, position: usize) -> bool {
        position < 64 && self.null_bitmap & (1 << position) != 0
    }

    /// The smallest key strictly greater than this key and every extension
    /// of it. `None` means unbounded (all bytes were 0xFF).
    pub fn next_up(&self) -> Option<EncodedKey> {
        next_up(&self.bytes).map(EncodedKey::from_bytes)
    }

    pub(crate) fn concat(&self, suffix: &[u8]) -> EncodedKey {
        let mut bytes = self.bytes.to_vec();
        bytes.extend_from_slice(suffix);
        EncodedKey::new(bytes, self.field_count, self.null_bitmap)
    }
}

/// Computes the prefix successor of `bytes`: the smallest byte string
/// strictly greater than `bytes` and every string prefixed by it.
///
/// Per-field encodings are prefix-free, so no valid encoding of the same
/// type lies strictly between `bytes` and the successor, which makes it the
/// correct exclusive bound even when further fields or a record-key suffix
/// follow. Returns `None` when every byte is 0xFF (unbounded above).
pub fn next_up(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = bytes.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().unwrap() = last + 1;
            return Some(out);
        }
    }
    None
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedKey({:02x?})", &self.bytes[..])
    }
}

impl PartialEq for EncodedKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for EncodedKey {}

impl PartialOrd for EncodedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EncodedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl Hash for EncodedKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl AsRef<[u8]> for EncodedKey {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Borrow<[u8]> for EncodedKey {
    fn borrow(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_up_increments_and_carries() {
        assert_eq!(next_up(&[0x01, 0x02]), Some(vec![0x01, 0x03]));
        assert_eq!(next_up(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(next_up(&[0x01, 0xFF, 0xFF]), Some(vec![0x02]));
        assert_eq!(next_up(&[0xFF, 0xFF]), None);
        assert_eq!(next_up(&[]), None);
    }

    #[test]
    fn next_up_bounds_all_extensions() {
        let base = [0x10u8, 0x20];
        let successor = next_up(&base).unwrap();
        assert!(successor.as_slice() > &base[..]);
        for extension in [vec![0x10, 0x20, 0x00], vec![0x10, 0x20, 0xFF, 0xFF]] {
            assert!(extension.as_slice() > &base[..]);
            assert!(extension < successor);
        }
    }

    #[test]
    fn key_order_is_byte_order() {
        let a = EncodedKey::from_bytes(vec![0x01]);
        let b = EncodedKey::from_bytes(vec![0x01, 0x00]);
        let c = EncodedKey::from_bytes(vec![0x02]);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, EncodedKey::new(vec![0x01], 3, 1));
    }
}

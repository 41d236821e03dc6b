//! Immutable Byte Views
//!
//! The value type every cache tier stores. A `ByteView` owns its payload and
//! never hands out a mutable alias to it: bytes are copied in on construction
//! and copied out by [`ByteView::to_vec`].

use std::fmt;

use bytes::Bytes;

use super::lru::Weighted;

/// Read-only view over a cached payload
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Create a view by copying `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Defensive copy of the payload
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Payload as text, replacing invalid UTF-8 sequences
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<Vec<u8>> for ByteView {
    /// Takes ownership of `data`; nothing else can alias it afterwards.
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl Weighted for ByteView {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_copies_on_construction() {
        let mut source = b"hello".to_vec();
        let view = ByteView::copy_from_slice(&source);
        source[0] = b'j';

        assert_eq!(view.to_string(), "hello");
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn test_view_copies_on_read() {
        let view = ByteView::from("value");
        let mut out = view.to_vec();
        out.clear();

        assert_eq!(view.to_vec(), b"value");
    }

    #[test]
    fn test_view_string_forms() {
        let view = ByteView::from(vec![0x66, 0x6f, 0xff]);
        assert_eq!(view.to_string_lossy(), "fo\u{fffd}");
        assert_eq!(format!("{:?}", view), "ByteView { len: 3 }");
    }

    #[test]
    fn test_view_weight_is_payload_length() {
        let view = ByteView::from("v1");
        assert_eq!(view.weight(), 2);
        assert!(ByteView::default().is_empty());
    }
}

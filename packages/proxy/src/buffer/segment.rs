//! Single contiguous byte segment
//!
//! A `Segment` owns its storage and tracks a logical length that never exceeds
//! its capacity. Reads fill the spare capacity in place; a filled segment can be
//! frozen and pushed onto a [`BufferChain`](super::BufferChain) without copying.

use std::fmt;
use std::ops::Deref;

use bytes::{Bytes, BytesMut};

use super::DEFAULT_SEGMENT_CAPACITY;

/// Owned, growable byte storage with a logical length and a capacity.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Segment {
    buf: BytesMut,
}

impl Segment {
    /// Creates an empty segment with at least `capacity` bytes pre-allocated.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Creates a segment holding a copy of `data`.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
        }
    }

    /// Logical length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Allocated capacity in bytes, always `>= len()`.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Bytes that can be filled without reallocating.
    #[inline]
    #[must_use]
    pub fn spare_capacity(&self) -> usize {
        self.buf.capacity() - self.buf.len()
    }

    /// Copies `data` onto the end of the segment, growing it if needed.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Drops the content but keeps the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Ensures at least `additional` bytes of spare capacity.
    pub fn reserve(&mut self, additional: usize) {
        self.buf.reserve(additional);
    }

    /// Removes and returns the filled bytes, leaving the spare capacity behind
    /// for the next read.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Converts the segment into immutable, reference-counted storage.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Mutable access for readers filling the spare capacity.
    pub(crate) fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Deref for Segment {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl AsRef<[u8]> for Segment {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl From<BytesMut> for Segment {
    fn from(buf: BytesMut) -> Self {
        Self { buf }
    }
}

impl From<&[u8]> for Segment {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}

impl From<&str> for Segment {
    fn from(data: &str) -> Self {
        Self::from_slice(data.as_bytes())
    }
}

impl From<Segment> for Bytes {
    fn from(segment: Segment) -> Self {
        segment.freeze()
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A read segment with the default capacity.
pub fn read_segment() -> Segment {
    Segment::with_capacity(DEFAULT_SEGMENT_CAPACITY)
}

//! Chains of shared byte segments
//!
//! A [`BufferChain`] presents independently allocated segments as one logical
//! byte stream. Writers hand the whole chain to a vectored write; callers that
//! need contiguous memory pay for an explicit [`BufferChain::amalgamate`].
//!
//! Segments are reference counted. Cloning a chain copies the segment list, not
//! the bytes. A segment is only ever grown in place while the chain holding it is
//! its sole owner, so content visible through one chain can never change
//! underneath another.

use std::fmt;
use std::io::IoSlice;

use bytes::{Bytes, BytesMut};

use super::Segment;

/// Ordered, append-only sequence of byte segments.
#[derive(Clone, Default)]
pub struct BufferChain {
    segments: Vec<Bytes>,
    len: usize,
}

impl BufferChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain whose first segment pre-allocates `size_hint` bytes.
    #[must_use]
    pub fn with_capacity(size_hint: usize) -> Self {
        let mut chain = Self::new();
        if size_hint > 0 {
            chain.segments.push(BytesMut::with_capacity(size_hint).freeze());
        }
        chain
    }

    /// Copies `data` onto the end of the chain.
    ///
    /// The tail segment is extended when this chain owns it exclusively;
    /// otherwise the bytes go into a new segment.
    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.len += data.len();

        if let Some(tail) = self.segments.pop() {
            match tail.try_into_mut() {
                Ok(mut owned) => {
                    owned.extend_from_slice(data);
                    self.segments.push(owned.freeze());
                }
                Err(shared) => {
                    if !shared.is_empty() {
                        self.segments.push(shared);
                    }
                    self.segments.push(Bytes::copy_from_slice(data));
                }
            }
        } else {
            self.segments.push(Bytes::copy_from_slice(data));
        }
    }

    /// Adds an already-built segment to the tail in O(1), without copying.
    pub fn push_segment(&mut self, segment: impl Into<Bytes>) {
        let segment = segment.into();
        self.len += segment.len();
        self.segments.push(segment);
    }

    /// Appends every segment of `other`, sharing its storage.
    pub fn extend_from_chain(&mut self, other: &BufferChain) {
        self.len += other.len;
        self.segments.extend(other.segments.iter().cloned());
    }

    /// Borrowed scatter/gather view over the non-empty segments, in order.
    ///
    /// The view borrows the chain, so it cannot outlive a later mutation.
    #[must_use]
    pub fn to_vectored_view(&self) -> Vec<IoSlice<'_>> {
        self.segments
            .iter()
            .filter(|segment| !segment.is_empty())
            .map(|segment| IoSlice::new(segment))
            .collect()
    }

    /// Copies the logical content into one new contiguous segment.
    #[must_use]
    pub fn amalgamate(&self) -> Segment {
        let mut out = BytesMut::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        Segment::from(out)
    }

    /// Total logical length across all segments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Bytes> {
        self.segments.iter()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }

    fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments.iter().flat_map(|segment| segment.iter().copied())
    }
}

impl PartialEq for BufferChain {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bytes().eq(other.bytes())
    }
}

impl Eq for BufferChain {}

impl fmt::Display for BufferChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let contiguous = self.amalgamate();
        f.write_str(&String::from_utf8_lossy(&contiguous))
    }
}

impl fmt::Debug for BufferChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferChain")
            .field("segments", &self.segments.len())
            .field("len", &self.len)
            .finish()
    }
}

impl From<Bytes> for BufferChain {
    fn from(bytes: Bytes) -> Self {
        let mut chain = Self::new();
        chain.push_segment(bytes);
        chain
    }
}

impl From<Segment> for BufferChain {
    fn from(segment: Segment) -> Self {
        Self::from(segment.freeze())
    }
}

impl From<Vec<u8>> for BufferChain {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<String> for BufferChain {
    fn from(data: String) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<&str> for BufferChain {
    fn from(data: &str) -> Self {
        let mut chain = Self::new();
        chain.append(data.as_bytes());
        chain
    }
}

impl<'a> FromIterator<&'a [u8]> for BufferChain {
    fn from_iter<I: IntoIterator<Item = &'a [u8]>>(iter: I) -> Self {
        let mut chain = Self::new();
        for data in iter {
            chain.push_segment(Bytes::copy_from_slice(data));
        }
        chain
    }
}

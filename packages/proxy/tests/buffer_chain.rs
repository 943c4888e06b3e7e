use std::io::IoSlice;

use bytes::Bytes;
use marvin_proxy::{BufferChain, Segment};

#[test]
fn test_amalgamate_concatenates_segments() {
    let chain: BufferChain = ["GH", "GHGH", "GHGHGH"]
        .iter()
        .map(|s| s.as_bytes())
        .collect();

    assert_eq!(chain.segment_count(), 3);
    assert_eq!(chain.len(), 12);
    let contiguous = chain.amalgamate();
    assert_eq!(&contiguous[..], b"GHGHGHGHGHGH");
    assert_eq!(chain.to_string(), "GHGHGHGHGHGH");
}

#[test]
fn test_vectored_view_covers_logical_length() {
    let mut chain = BufferChain::new();
    for part in ["GH", "GHGH", "GHGHGH"] {
        chain.push_segment(Bytes::from(part));
    }

    let view: Vec<IoSlice<'_>> = chain.to_vectored_view();
    let total: usize = view.iter().map(|slice| slice.len()).sum();
    assert_eq!(view.len(), 3);
    assert_eq!(total, chain.amalgamate().len());
}

#[test]
fn test_append_grows_unique_tail() {
    let mut chain = BufferChain::with_capacity(64);
    chain.append(b"hello ");
    chain.append(b"world");

    assert_eq!(chain.segment_count(), 1);
    assert_eq!(chain.to_string(), "hello world");
}

#[test]
fn test_copy_keeps_structure_independent() {
    let mut original = BufferChain::from("first");
    original.push_segment(Bytes::from_static(b"second"));
    let mut copy = original.clone();

    copy.append(b"third");
    copy.push_segment(Bytes::from_static(b"fourth"));

    assert_eq!(original.segment_count(), 2);
    assert_eq!(original.to_string(), "firstsecond");
    assert_eq!(copy.to_string(), "firstsecondthirdfourth");
}

#[test]
fn test_shared_tail_is_not_mutated() {
    let original = BufferChain::from("shared");
    let mut copy = original.clone();
    copy.append(b"!");

    assert_eq!(original.to_string(), "shared");
    assert_eq!(copy.to_string(), "shared!");
    assert_eq!(copy.segment_count(), 2);
}

#[test]
fn test_empty_chain() {
    let chain = BufferChain::new();
    assert!(chain.is_empty());
    assert!(chain.to_vectored_view().is_empty());
    assert!(chain.amalgamate().is_empty());
    assert_eq!(chain.to_string(), "");
}

#[test]
fn test_segment_push_is_zero_copy() {
    let mut segment = Segment::with_capacity(16);
    segment.append(b"payload");
    let bytes = segment.freeze();
    let ptr = bytes.as_ptr();

    let chain = BufferChain::from(bytes);
    let first = chain.segments().next().expect("one segment");
    assert_eq!(first.as_ptr(), ptr);
}

#[test]
fn test_equality_ignores_segmentation() {
    let split: BufferChain = [&b"GH"[..], &b"GH"[..]].into_iter().collect();
    let whole = BufferChain::from("GHGH");
    assert_eq!(split, whole);
    assert_ne!(split, BufferChain::from("GHG"));
}

#[test]
fn test_segment_take_keeps_capacity_for_next_read() {
    let mut segment = Segment::with_capacity(32);
    segment.append(b"abc");
    let taken = segment.take();

    assert_eq!(&taken[..], b"abc");
    assert!(segment.is_empty());
    assert!(segment.capacity() > 0);
}

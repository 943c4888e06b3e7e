//! Byte buffers for socket I/O
//!
//! - `segment`: a single pre-allocatable buffer, the destination of reads
//! - `chain`: an ordered list of shared segments written as one logical stream

pub mod chain;
pub mod segment;

pub use chain::BufferChain;
pub use segment::{Segment, read_segment};

/// Default capacity of a read segment.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 8 * 1024;

//! Traffic collectors
//!
//! A collector receives one record per completed exchange. Implementations
//! must not block the calling handler; [`ChannelCollector`] moves the work onto
//! its own task.

mod channel;

pub use channel::ChannelCollector;

use crate::buffer::BufferChain;
use crate::connect::Scheme;

/// Sink for completed request/response exchanges.
pub trait Collector: Send + Sync + 'static {
    fn collect(&self, scheme: Scheme, host: &str, request: &BufferChain, response: &BufferChain);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn collect(&self, _: Scheme, _: &str, _: &BufferChain, _: &BufferChain) {}
}

/// One collected exchange. Chains share the handler's segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedExchange {
    pub scheme: Scheme,
    pub host: String,
    pub request: BufferChain,
    pub response: BufferChain,
}

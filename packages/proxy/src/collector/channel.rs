use tokio::sync::mpsc;

use super::{CollectedExchange, Collector};
use crate::buffer::BufferChain;
use crate::connect::Scheme;

/// Collector that forwards records over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelCollector {
    tx: mpsc::UnboundedSender<CollectedExchange>,
}

impl ChannelCollector {
    /// Collector plus the receiving end, for callers that drain it themselves.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CollectedExchange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Collector whose records are handed to `sink` on a dedicated task.
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// clone of the collector is dropped.
    pub fn spawn<F>(mut sink: F) -> Self
    where
        F: FnMut(CollectedExchange) + Send + 'static,
    {
        let (collector, mut rx) = Self::channel();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                sink(record);
            }
            tracing::debug!("collector channel closed");
        });
        collector
    }
}

impl Collector for ChannelCollector {
    fn collect(&self, scheme: Scheme, host: &str, request: &BufferChain, response: &BufferChain) {
        let record = CollectedExchange {
            scheme,
            host: host.to_string(),
            request: request.clone(),
            response: response.clone(),
        };
        if self.tx.send(record).is_err() {
            tracing::warn!(host, "collector receiver dropped, record discarded");
        }
    }
}

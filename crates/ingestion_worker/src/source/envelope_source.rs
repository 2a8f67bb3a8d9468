use crate::domain::InboundEnvelope;
use async_trait::async_trait;

/// Trait for pulling batches of inbound envelopes from a transport
#[async_trait]
pub trait EnvelopeSource: Send {
    /// Next batch of envelopes, or `None` once the source is exhausted.
    ///
    /// Implementations must be cancel safe at the batch level: dropping the
    /// future may lose the partial batch but never corrupts the source.
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEnvelope>>>;
}

use crate::domain::{BatchReport, IngestionPipeline};
use crate::source::EnvelopeSource;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Running message counts over the worker's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionTotals {
    pub batches: usize,
    pub persisted: usize,
    pub unchanged: usize,
    pub dropped: usize,
    pub failed: usize,
}

impl IngestionTotals {
    fn add(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.persisted += report.persisted();
        self.unchanged += report.unchanged();
        self.dropped += report.dropped();
        self.failed += report.failed();
    }
}

/// Feeds batches from an [`EnvelopeSource`] through the pipeline until the
/// source runs dry or the token is cancelled
pub struct IngestionWorker {
    pipeline: Arc<IngestionPipeline>,
    source: Box<dyn EnvelopeSource>,
}

impl IngestionWorker {
    pub fn new(pipeline: Arc<IngestionPipeline>, source: Box<dyn EnvelopeSource>) -> Self {
        Self { pipeline, source }
    }

    /// A batch already handed to the pipeline always completes; cancellation
    /// is only observed while waiting for the next batch.
    pub async fn run(mut self, ctx: CancellationToken) -> anyhow::Result<IngestionTotals> {
        info!("starting ingestion worker");
        let mut totals = IngestionTotals::default();

        loop {
            let batch = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping ingestion worker");
                    break;
                }
                batch = self.source.next_batch() => batch?,
            };

            let Some(envelopes) = batch else {
                info!("envelope source exhausted");
                break;
            };

            debug!(message_count = envelopes.len(), "received envelope batch");
            let report = self.pipeline.process_batch(envelopes).await;
            totals.add(&report);
        }

        info!(
            batches = totals.batches,
            persisted = totals.persisted,
            unchanged = totals.unchanged,
            dropped = totals.dropped,
            failed = totals.failed,
            "ingestion worker stopped"
        );
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnvelopeBody, InboundEnvelope};
    use async_trait::async_trait;
    use common::domain::SystemClock;
    use common::store::InMemoryDeviceStateStore;
    use sensor_payload::PortDecoder;
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedSource {
        batches: VecDeque<Vec<InboundEnvelope>>,
    }

    #[async_trait]
    impl EnvelopeSource for ScriptedSource {
        async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEnvelope>>> {
            Ok(self.batches.pop_front())
        }
    }

    struct PendingSource;

    #[async_trait]
    impl EnvelopeSource for PendingSource {
        async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEnvelope>>> {
            std::future::pending().await
        }
    }

    struct FailingSource;

    #[async_trait]
    impl EnvelopeSource for FailingSource {
        async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEnvelope>>> {
            Err(anyhow::anyhow!("transport closed unexpectedly"))
        }
    }

    fn pipeline() -> Arc<IngestionPipeline> {
        Arc::new(IngestionPipeline::new(
            Arc::new(InMemoryDeviceStateStore::new()),
            Arc::new(PortDecoder),
            Arc::new(SystemClock),
        ))
    }

    fn battery(device_id: &str) -> InboundEnvelope {
        // "88" on channel 5
        InboundEnvelope::new(EnvelopeBody::Structured(json!({
            "end_device_ids": {"device_id": device_id},
            "uplink_message": {"f_port": 5, "frm_payload": "ODg="}
        })))
    }

    #[tokio::test]
    async fn test_run_until_source_exhausted() {
        let source = ScriptedSource {
            batches: VecDeque::from(vec![
                vec![battery("dev-1"), InboundEnvelope::default()],
                vec![battery("dev-2"), battery("dev-1").with_channel(42)],
            ]),
        };

        let totals = IngestionWorker::new(pipeline(), Box::new(source))
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            totals,
            IngestionTotals {
                batches: 2,
                persisted: 2,
                unchanged: 1,
                dropped: 1,
                failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let ctx = CancellationToken::new();
        let worker = IngestionWorker::new(pipeline(), Box::new(PendingSource));

        let handle = tokio::spawn(worker.run(ctx.clone()));
        ctx.cancel();

        let totals = handle.await.unwrap().unwrap();
        assert_eq!(totals, IngestionTotals::default());
    }

    #[tokio::test]
    async fn test_run_propagates_source_error() {
        let result = IngestionWorker::new(pipeline(), Box::new(FailingSource))
            .run(CancellationToken::new())
            .await;

        assert!(result.is_err());
    }
}

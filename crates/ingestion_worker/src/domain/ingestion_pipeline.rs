use crate::domain::{
    readings_from_decoded_payload, AggregationEngine, DropReason, InboundEnvelope, NormalizedUplink,
};
use chrono::{DateTime, Utc};
use common::domain::{Clock, DeviceId, DeviceRecord, DeviceStateStore, StoreError};
use sensor_payload::{DecodedReading, PayloadDecoder};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Store call that failed for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Get,
    Upsert,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOperation::Get => write!(f, "get"),
            StoreOperation::Upsert => write!(f, "upsert"),
        }
    }
}

/// What happened to a single inbound message
#[derive(Debug)]
pub enum MessageOutcome {
    /// Record changed and was written at `revision`
    Persisted {
        device_id: DeviceId,
        revision: u64,
        /// When the network server received the uplink, if it said so
        received_at: Option<DateTime<Utc>>,
    },
    /// Nothing relevant in the message, no write issued
    Unchanged { device_id: DeviceId },
    /// Message rejected before touching the store
    Dropped {
        device_id: Option<DeviceId>,
        reason: DropReason,
    },
    /// Store read or write failed; only this message is affected
    Failed {
        device_id: DeviceId,
        operation: StoreOperation,
        error: StoreError,
    },
}

/// Per-batch summary of message outcomes, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchReport {
    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Persisted { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Unchanged { .. }))
    }

    pub fn dropped(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Dropped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MessageOutcome::Failed { .. }))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, pred: impl Fn(&MessageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Domain service that turns inbound uplinks into device record updates
///
/// Flow per message:
/// 1. Normalize the envelope and resolve the device id
/// 2. Fetch the current record (a template for unseen devices)
/// 3. Decode the payload into readings
/// 4. Merge readings into the record
/// 5. Stamp and upsert when something changed
pub struct IngestionPipeline {
    store: Arc<dyn DeviceStateStore>,
    decoder: Arc<dyn PayloadDecoder>,
    clock: Arc<dyn Clock>,
    engine: AggregationEngine,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn DeviceStateStore>,
        decoder: Arc<dyn PayloadDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            decoder,
            clock,
            engine: AggregationEngine::new(),
        }
    }

    /// Process messages one after another; a failing message never stops the batch
    #[instrument(skip_all, fields(batch_size = envelopes.len()))]
    pub async fn process_batch(&self, envelopes: Vec<InboundEnvelope>) -> BatchReport {
        let mut report = BatchReport {
            outcomes: Vec::with_capacity(envelopes.len()),
        };

        for envelope in envelopes {
            report.outcomes.push(self.process_message(envelope).await);
        }

        info!(
            messages = report.len(),
            persisted = report.persisted(),
            unchanged = report.unchanged(),
            dropped = report.dropped(),
            failed = report.failed(),
            "processed batch"
        );

        report
    }

    #[instrument(skip_all, fields(device_id = tracing::field::Empty, channel = tracing::field::Empty))]
    pub async fn process_message(&self, envelope: InboundEnvelope) -> MessageOutcome {
        let uplink = match envelope.normalize() {
            Ok(uplink) => uplink,
            Err(reason) => {
                let device_id = reason.device_id().cloned();
                match &device_id {
                    Some(id) => warn!(device_id = %id, reason = %reason, "dropping message"),
                    None => warn!(reason = %reason, "dropping message"),
                }
                return MessageOutcome::Dropped { device_id, reason };
            }
        };

        let span = tracing::Span::current();
        span.record("device_id", tracing::field::display(&uplink.device_id));
        if let Some(channel) = uplink.channel {
            span.record("channel", channel);
        }

        let device_id = uplink.device_id.clone();

        let record = match self.store.get(&device_id).await {
            Ok(stored) => {
                debug!(device_id = %device_id, revision = stored.revision, "loaded device record");
                stored.record
            }
            Err(e) if e.is_not_found() => {
                debug!(device_id = %device_id, "no record yet, starting from template");
                DeviceRecord::template(device_id.clone(), self.clock.now())
            }
            Err(e) => {
                error!(
                    device_id = %device_id,
                    operation = %StoreOperation::Get,
                    error = %e,
                    "failed to read device record"
                );
                return MessageOutcome::Failed {
                    device_id,
                    operation: StoreOperation::Get,
                    error: e,
                };
            }
        };

        let readings = self.readings(&uplink);
        if readings.is_empty() {
            debug!(device_id = %device_id, "no relevant data in message");
        }

        let merge = self.engine.merge_all(record, &readings);
        for diagnostic in &merge.diagnostics {
            warn!(device_id = %device_id, diagnostic = %diagnostic, "payload diagnostic");
        }

        if !merge.changed {
            debug!(device_id = %device_id, "record unchanged, skipping write");
            return MessageOutcome::Unchanged { device_id };
        }

        let mut record = merge.record;
        record.last_updated = self.clock.now();

        match self.store.upsert(record).await {
            Ok(stored) => {
                debug!(
                    device_id = %device_id,
                    revision = stored.revision,
                    last_updated = %stored.record.last_updated,
                    received_at = ?uplink.received_at,
                    readings = ?readings.iter().map(DecodedReading::kind).collect::<Vec<_>>(),
                    "persisted device record"
                );
                MessageOutcome::Persisted {
                    device_id,
                    revision: stored.revision,
                    received_at: uplink.received_at,
                }
            }
            Err(e) => {
                error!(
                    device_id = %device_id,
                    operation = %StoreOperation::Upsert,
                    error = %e,
                    "failed to write device record"
                );
                MessageOutcome::Failed {
                    device_id,
                    operation: StoreOperation::Upsert,
                    error: e,
                }
            }
        }
    }

    fn readings(&self, uplink: &NormalizedUplink) -> Vec<DecodedReading> {
        match (&uplink.payload, uplink.channel) {
            (Some(payload), Some(channel)) => {
                let reading = self.decoder.decode(channel, payload);
                debug!(
                    device_id = %uplink.device_id,
                    channel,
                    payload_size = payload.len(),
                    reading = reading.kind(),
                    "decoded payload"
                );
                vec![reading]
            }
            _ => {
                let readings = uplink
                    .decoded_payload
                    .as_ref()
                    .map(readings_from_decoded_payload)
                    .unwrap_or_default();
                if !readings.is_empty() {
                    debug!(
                        device_id = %uplink.device_id,
                        readings = ?readings.iter().map(DecodedReading::kind).collect::<Vec<_>>(),
                        "converted pre-decoded fields"
                    );
                }
                readings
            }
        }
    }
}

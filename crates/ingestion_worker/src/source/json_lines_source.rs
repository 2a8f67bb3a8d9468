use crate::domain::{EnvelopeBody, InboundEnvelope};
use crate::source::EnvelopeSource;
use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_DEVICE_ID_PROPERTY: &str = "iothub-connection-device-id";

#[derive(Debug, Clone)]
pub struct JsonLinesSourceConfig {
    pub batch_size: usize,
    pub batch_wait: Duration,
    /// System property holding the transport's device id
    pub device_id_property: String,
}

impl Default for JsonLinesSourceConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            batch_wait: Duration::from_millis(500),
            device_id_property: DEFAULT_DEVICE_ID_PROPERTY.to_string(),
        }
    }
}

/// One transport message per line
#[derive(Debug, Deserialize)]
struct TransportMessage {
    #[serde(default)]
    system_properties: Map<String, Value>,
    #[serde(default)]
    channel: Option<u32>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    body_base64: Option<String>,
}

/// Envelope source reading newline-delimited JSON transport messages.
///
/// A batch closes when it holds `batch_size` messages or `batch_wait` after
/// its first message arrived, whichever comes first.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    config: JsonLinesSourceConfig,
    exhausted: bool,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, mut config: JsonLinesSourceConfig) -> Self {
        config.batch_size = config.batch_size.max(1);
        Self {
            lines: reader.lines(),
            config,
            exhausted: false,
        }
    }

    fn parse_line(&self, line: &str) -> anyhow::Result<InboundEnvelope> {
        let message: TransportMessage =
            serde_json::from_str(line).context("invalid transport message")?;

        let body = match (message.body_base64, message.body) {
            (Some(encoded), _) => Some(EnvelopeBody::Bytes(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .context("body_base64 is not valid base64")?,
            )),
            (None, Some(Value::String(text))) => Some(EnvelopeBody::Text(text)),
            (None, Some(value)) => Some(EnvelopeBody::Structured(value)),
            (None, None) => None,
        };

        Ok(InboundEnvelope {
            device_id_hint: message
                .system_properties
                .get(&self.config.device_id_property)
                .and_then(Value::as_str)
                .map(str::to_string),
            channel: message.channel,
            body,
        })
    }
}

#[async_trait]
impl<R> EnvelopeSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_batch(&mut self) -> anyhow::Result<Option<Vec<InboundEnvelope>>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(self.config.batch_size);
        let mut deadline: Option<Instant> = None;

        while batch.len() < self.config.batch_size {
            let next = match deadline {
                None => self.lines.next_line().await,
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.lines.next_line()).await {
                        Ok(next) => next,
                        Err(_) => break,
                    }
                }
            };

            let Some(line) = next.context("failed to read transport message")? else {
                debug!("input exhausted");
                self.exhausted = true;
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            match self.parse_line(&line) {
                Ok(envelope) => {
                    if batch.is_empty() {
                        deadline = Some(Instant::now() + self.config.batch_wait);
                    }
                    batch.push(envelope);
                }
                Err(e) => warn!(error = %e, "skipping unparsable transport message"),
            }
        }

        if batch.is_empty() {
            return Ok(None);
        }

        debug!(message_count = batch.len(), "read envelope batch");
        Ok(Some(batch))
    }
}

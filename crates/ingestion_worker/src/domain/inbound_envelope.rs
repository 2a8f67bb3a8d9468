use base64::Engine;
use chrono::{DateTime, Utc};
use common::domain::DeviceId;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload of an inbound message as handed over by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeBody {
    /// UTF-8 encoded JSON document
    Bytes(Vec<u8>),
    /// JSON document as text
    Text(String),
    /// Already deserialized document
    Structured(Value),
}

/// One uplink delivery from the gateway transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEnvelope {
    /// Device id from transport connection metadata, preferred over the body
    pub device_id_hint: Option<String>,
    /// Channel from transport metadata; falls back to `uplink_message.f_port`
    pub channel: Option<u32>,
    pub body: Option<EnvelopeBody>,
}

impl InboundEnvelope {
    pub fn new(body: EnvelopeBody) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_device_id_hint(mut self, device_id: impl Into<String>) -> Self {
        self.device_id_hint = Some(device_id.into());
        self
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Resolve the device, parse the body and pull out the uplink fields.
    ///
    /// Every failure is a per-message drop; the reason says why.
    pub fn normalize(self) -> Result<NormalizedUplink, DropReason> {
        let value = match self.body.ok_or(DropReason::MissingBody)? {
            EnvelopeBody::Bytes(bytes) => {
                let text =
                    String::from_utf8(bytes).map_err(|e| DropReason::InvalidUtf8(e.to_string()))?;
                parse_json(&text)?
            }
            EnvelopeBody::Text(text) => parse_json(&text)?,
            EnvelopeBody::Structured(value) => value,
        };

        let Value::Object(mut body) = value else {
            return Err(DropReason::BodyNotObject);
        };

        let device_id = resolve_device_id(self.device_id_hint, &body)?;

        let uplink: UplinkMessage = match body.remove("uplink_message") {
            None | Some(Value::Null) => UplinkMessage::default(),
            Some(value) => {
                serde_json::from_value(value).map_err(|e| DropReason::MalformedUplink {
                    device_id: device_id.clone(),
                    reason: e.to_string(),
                })?
            }
        };

        let payload = match uplink.frm_payload.as_deref() {
            None | Some("") => None,
            Some(encoded) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| DropReason::MalformedUplink {
                        device_id: device_id.clone(),
                        reason: format!("frm_payload is not base64: {}", e),
                    })?,
            ),
        };

        Ok(NormalizedUplink {
            device_id,
            channel: self.channel.or(uplink.f_port),
            payload,
            decoded_payload: uplink.decoded_payload,
            received_at: uplink.received_at,
        })
    }
}

fn parse_json(text: &str) -> Result<Value, DropReason> {
    serde_json::from_str(text).map_err(|e| DropReason::MalformedJson(e.to_string()))
}

fn resolve_device_id(hint: Option<String>, body: &Map<String, Value>) -> Result<DeviceId, DropReason> {
    let raw = hint
        .filter(|hint| !hint.is_empty())
        .or_else(|| {
            body.get("end_device_ids")
                .and_then(|ids| ids.get("device_id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .ok_or(DropReason::UnresolvedDeviceId)?;

    DeviceId::parse(raw).map_err(|e| DropReason::InvalidDeviceId(e.to_string()))
}

/// The `uplink_message` object of a network server uplink event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UplinkMessage {
    pub f_port: Option<u32>,
    /// Base64 encoded application payload
    pub frm_payload: Option<String>,
    /// Fields produced by a payload formatter on the network server
    pub decoded_payload: Option<Map<String, Value>>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Envelope after normalization: a known device plus whatever uplink data it carried
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUplink {
    pub device_id: DeviceId,
    pub channel: Option<u32>,
    pub payload: Option<Vec<u8>>,
    pub decoded_payload: Option<Map<String, Value>>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Why a message was skipped before reaching the store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropReason {
    #[error("message payload source is empty")]
    MissingBody,

    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("message body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("message body is not a JSON object")]
    BodyNotObject,

    #[error("could not determine device ID from message")]
    UnresolvedDeviceId,

    #[error("{0}")]
    InvalidDeviceId(String),

    #[error("malformed uplink_message for device {device_id}: {reason}")]
    MalformedUplink { device_id: DeviceId, reason: String },
}

impl DropReason {
    /// Device the message belonged to, when it got that far
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            DropReason::MalformedUplink { device_id, .. } => Some(device_id),
            _ => None,
        }
    }
}

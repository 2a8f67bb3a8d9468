use crate::domain::{DomainError, DomainResult};
use crate::garde::broken_rules;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identifier accepted as a store partition key
pub const MAX_DEVICE_ID_LEN: usize = 128;

#[derive(::garde::Validate)]
struct DeviceIdCandidate {
    #[garde(length(min = 1, max = 128), pattern(r"^[A-Za-z0-9][A-Za-z0-9._-]*$"))]
    device_id: String,
}

/// Identifier of a field device, also used as the record key and partition key.
///
/// Only ASCII alphanumerics plus `-`, `_` and `.` are accepted, starting with
/// an alphanumeric. Ids from transport metadata are rejected rather than
/// rewritten so two distinct devices can never share one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let candidate = DeviceIdCandidate {
            device_id: raw.into(),
        };

        if let Some(reason) = broken_rules(&candidate) {
            return Err(DomainError::InvalidDeviceId(format!(
                "{:?} ({})",
                candidate.device_id, reason
            )));
        }

        Ok(Self(candidate.device_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

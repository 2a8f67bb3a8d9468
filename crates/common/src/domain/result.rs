use crate::domain::DeviceId;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure kinds of a [`DeviceStateStore`](crate::domain::DeviceStateStore).
///
/// `NotFound` is an expected outcome on first contact with a device and is
/// kept apart from the failures that should abort a message.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Device record not found: {0}")]
    NotFound(DeviceId),

    #[error("Failed to read record for device {device_id}: {source}")]
    Read {
        device_id: DeviceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write record for device {device_id}: {source}")]
    Write {
        device_id: DeviceId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Stored record for device {device_id} is unreadable: {reason}")]
    Corrupt { device_id: DeviceId, reason: String },

    #[error("Device state store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

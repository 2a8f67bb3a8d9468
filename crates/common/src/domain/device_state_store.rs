use crate::domain::{DeviceId, DeviceRecord, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A device record as held by the store, tagged with its write revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub revision: u64,
    pub record: DeviceRecord,
}

/// Key-value document store holding one [`DeviceRecord`] per device.
///
/// The device id is both document key and partition key. Reads and writes
/// are independent operations: there is no compare-and-swap, so two writers
/// updating the same device from the same prior revision lose one update.
/// `revision` is returned so a conditional write can be layered on later.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceStateStore: Send + Sync {
    /// Fetch the current record, or `StoreError::NotFound` for an unseen device
    async fn get(&self, device_id: &DeviceId) -> StoreResult<StoredRecord>;

    /// Insert or replace the record keyed by `record.device_id`
    async fn upsert(&self, record: DeviceRecord) -> StoreResult<StoredRecord>;

    /// Release the store; every later call fails with `StoreError::Closed`
    async fn close(&self) -> StoreResult<()>;
}

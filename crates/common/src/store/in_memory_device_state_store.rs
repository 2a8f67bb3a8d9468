use crate::domain::{DeviceId, DeviceRecord, DeviceStateStore, StoreError, StoreResult, StoredRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of DeviceStateStore using HashMap
pub struct InMemoryDeviceStateStore {
    records: Arc<RwLock<HashMap<DeviceId, StoredRecord>>>,
    closed: AtomicBool,
}

impl InMemoryDeviceStateStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryDeviceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStateStore for InMemoryDeviceStateStore {
    async fn get(&self, device_id: &DeviceId) -> StoreResult<StoredRecord> {
        self.ensure_open()?;
        let records = self.records.read().await;
        records
            .get(device_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(device_id.clone()))
    }

    async fn upsert(&self, record: DeviceRecord) -> StoreResult<StoredRecord> {
        self.ensure_open()?;
        let mut records = self.records.write().await;

        let revision = records
            .get(&record.device_id)
            .map(|existing| existing.revision + 1)
            .unwrap_or(1);
        let stored = StoredRecord { revision, record };
        records.insert(stored.record.device_id.clone(), stored.clone());

        debug!(device_id = %stored.record.device_id, revision, "upserted device record in memory");
        Ok(stored)
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        debug!("in-memory device state store closed");
        Ok(())
    }
}

use crate::domain::{DeviceId, DeviceRecord, DeviceStateStore, StoreError, StoreResult, StoredRecord};
use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Device state store keeping one JSON document per device in a directory.
///
/// Documents are named `<deviceId>.json` and replaced through a temporary
/// file plus rename, so a reader never sees a half written record.
pub struct JsonFileDeviceStateStore {
    root: PathBuf,
    closed: AtomicBool,
}

impl JsonFileDeviceStateStore {
    /// Open (and create if needed) the store directory
    pub async fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create store directory {}", root.display()))?;

        info!(root = %root.display(), "opened json file device state store");
        Ok(Self {
            root,
            closed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, device_id: &DeviceId) -> PathBuf {
        self.root.join(format!("{}.json", device_id))
    }

    // Device ids never start with '.', so this cannot clash with a record
    fn temp_path(&self, device_id: &DeviceId) -> PathBuf {
        self.root.join(format!(".{}.json.tmp", device_id))
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn read_stored(&self, device_id: &DeviceId) -> StoreResult<StoredRecord> {
        let path = self.record_path(device_id);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(device_id.clone()));
            }
            Err(e) => {
                return Err(StoreError::Read {
                    device_id: device_id.clone(),
                    source: anyhow::Error::new(e).context(format!("reading {}", path.display())),
                });
            }
        };

        let stored: StoredRecord =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                device_id: device_id.clone(),
                reason: e.to_string(),
            })?;

        if stored.record.device_id != *device_id {
            return Err(StoreError::Corrupt {
                device_id: device_id.clone(),
                reason: format!("document belongs to {}", stored.record.device_id),
            });
        }

        Ok(stored)
    }

    async fn write_stored(&self, stored: &StoredRecord) -> anyhow::Result<()> {
        let device_id = &stored.record.device_id;
        let path = self.record_path(device_id);
        let temp = self.temp_path(device_id);

        let bytes = serde_json::to_vec_pretty(stored).context("failed to serialize record")?;
        tokio::fs::write(&temp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &path)
            .await
            .with_context(|| format!("failed to move {} into place", temp.display()))?;

        Ok(())
    }
}

#[async_trait]
impl DeviceStateStore for JsonFileDeviceStateStore {
    async fn get(&self, device_id: &DeviceId) -> StoreResult<StoredRecord> {
        self.ensure_open()?;
        self.read_stored(device_id).await
    }

    async fn upsert(&self, record: DeviceRecord) -> StoreResult<StoredRecord> {
        self.ensure_open()?;

        let revision = match self.read_stored(&record.device_id).await {
            Ok(existing) => existing.revision + 1,
            Err(StoreError::NotFound(_)) => 1,
            Err(e) => return Err(e),
        };

        let stored = StoredRecord { revision, record };
        self.write_stored(&stored)
            .await
            .map_err(|source| StoreError::Write {
                device_id: stored.record.device_id.clone(),
                source,
            })?;

        debug!(
            device_id = %stored.record.device_id,
            revision,
            "upserted device record document"
        );
        Ok(stored)
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        info!(root = %self.root.display(), "json file device state store closed");
        Ok(())
    }
}

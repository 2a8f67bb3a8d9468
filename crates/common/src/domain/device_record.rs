use crate::domain::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated state of one field device.
///
/// Last-value fields are overwritten by each matching reading. The activity
/// fields also carry a running mean kept as two accumulators
/// (`activity_index_avg`, `activity_index_count`), so no raw samples are
/// stored. `device_id` never changes once the record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,

    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,

    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub battery_percent: Option<f64>,
    pub gnss_raw: Option<String>,

    pub activity_index: Option<f64>,
    pub activity_index_avg: Option<f64>,
    #[serde(default)]
    pub activity_index_count: u64,

    #[serde(rename = "macAddress1")]
    pub mac_address_1: Option<String>,
    #[serde(rename = "signalStrength1")]
    pub signal_strength_1: Option<i32>,
    #[serde(rename = "macAddress2")]
    pub mac_address_2: Option<String>,
    #[serde(rename = "signalStrength2")]
    pub signal_strength_2: Option<i32>,
    #[serde(rename = "macAddress3")]
    pub mac_address_3: Option<String>,
    #[serde(rename = "signalStrength3")]
    pub signal_strength_3: Option<i32>,

    /// Last raw WiFi scan text
    pub spi_raw: Option<String>,
}

impl DeviceRecord {
    /// Empty record for a device seen for the first time. It only reaches the
    /// store once a reading changes one of its fields.
    pub fn template(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            last_updated: now,
            temperature_c: None,
            humidity_pct: None,
            battery_percent: None,
            gnss_raw: None,
            activity_index: None,
            activity_index_avg: None,
            activity_index_count: 0,
            mac_address_1: None,
            signal_strength_1: None,
            mac_address_2: None,
            signal_strength_2: None,
            mac_address_3: None,
            signal_strength_3: None,
            spi_raw: None,
        }
    }

    /// Mutable access to WiFi slot `index` (0-based) as (MAC, RSSI)
    pub fn wifi_slot_mut(
        &mut self,
        index: usize,
    ) -> Option<(&mut Option<String>, &mut Option<i32>)> {
        match index {
            0 => Some((&mut self.mac_address_1, &mut self.signal_strength_1)),
            1 => Some((&mut self.mac_address_2, &mut self.signal_strength_2)),
            2 => Some((&mut self.mac_address_3, &mut self.signal_strength_3)),
            _ => None,
        }
    }
}

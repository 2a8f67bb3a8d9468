use common::domain::DeviceRecord;
use sensor_payload::{DecodedReading, WifiScan};
use tracing::debug;

/// Result of folding readings into a device record
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub record: DeviceRecord,
    /// At least one field was written, so the record needs persisting
    pub changed: bool,
    /// Decoder problems worth logging; never written to the record
    pub diagnostics: Vec<String>,
}

/// Applies decoded readings to a device record.
///
/// Each reading kind owns a disjoint set of fields, so readings can be merged
/// in any order or grouping with the same final record (the activity mean
/// only depends on the multiset of samples, up to float rounding).
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, mut record: DeviceRecord, reading: &DecodedReading) -> Merge {
        let mut diagnostics = Vec::new();

        let changed = match reading {
            DecodedReading::Temperature(value) => {
                record.temperature_c = Some(*value);
                debug!(device_id = %record.device_id, temperature_c = value, "updating temperature");
                true
            }
            DecodedReading::Humidity(value) => {
                record.humidity_pct = Some(*value);
                debug!(device_id = %record.device_id, humidity_pct = value, "updating humidity");
                true
            }
            DecodedReading::Battery(value) => {
                record.battery_percent = Some(*value);
                debug!(device_id = %record.device_id, battery_percent = value, "updating battery");
                true
            }
            DecodedReading::GnssRaw(raw) => {
                record.gnss_raw = Some(raw.clone());
                debug!(device_id = %record.device_id, gnss_raw = %raw, "updating gnss fix");
                true
            }
            DecodedReading::Activity(value) => {
                fold_activity(&mut record, *value);
                debug!(
                    device_id = %record.device_id,
                    activity_index = value,
                    activity_index_avg = record.activity_index_avg,
                    activity_index_count = record.activity_index_count,
                    "updating activity"
                );
                true
            }
            DecodedReading::WifiScan(scan) => {
                diagnostics.extend(scan.warnings.iter().cloned());
                let changed = apply_wifi_scan(&mut record, scan);
                debug!(
                    device_id = %record.device_id,
                    populated_slots = scan.populated_slots(),
                    changed,
                    "updating wifi scan"
                );
                changed
            }
            DecodedReading::Unknown { message, .. } => {
                diagnostics.push(message.clone());
                false
            }
            DecodedReading::DecodeError {
                original_text,
                message,
            } => {
                diagnostics.push(format!("{} (payload {:?})", message, original_text));
                false
            }
        };

        Merge {
            record,
            changed,
            diagnostics,
        }
    }

    /// Fold several readings in order; `changed` if any of them changed the record
    pub fn merge_all(&self, record: DeviceRecord, readings: &[DecodedReading]) -> Merge {
        readings.iter().fold(
            Merge {
                record,
                changed: false,
                diagnostics: Vec::new(),
            },
            |acc, reading| {
                let mut next = self.merge(acc.record, reading);
                next.changed |= acc.changed;
                let mut diagnostics = acc.diagnostics;
                diagnostics.append(&mut next.diagnostics);
                next.diagnostics = diagnostics;
                next
            },
        )
    }
}

/// Running mean over two accumulators: avg' = (avg * n + v) / (n + 1)
fn fold_activity(record: &mut DeviceRecord, value: f64) {
    let count = record.activity_index_count;
    let avg = if count == 0 {
        0.0
    } else {
        record.activity_index_avg.unwrap_or(0.0)
    };

    record.activity_index = Some(value);
    record.activity_index_avg = Some((avg * count as f64 + value) / (count + 1) as f64);
    record.activity_index_count = count + 1;
}

fn apply_wifi_scan(record: &mut DeviceRecord, scan: &WifiScan) -> bool {
    let mut changed = false;

    for (index, slot) in scan.slots.iter().enumerate() {
        let Some((mac, rssi)) = record.wifi_slot_mut(index) else {
            continue;
        };
        if let Some(address) = &slot.mac_address {
            *mac = Some(address.clone());
            changed = true;
        }
        if let Some(strength) = slot.signal_strength {
            *rssi = Some(strength);
            changed = true;
        }
    }

    if let Some(raw) = &scan.raw_hex {
        record.spi_raw = Some(raw.clone());
        changed = true;
    }

    changed
}

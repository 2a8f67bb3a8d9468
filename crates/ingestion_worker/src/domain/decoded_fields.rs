use sensor_payload::{DecodedReading, WifiScan, WIFI_SLOTS};
use serde_json::{Map, Value};

/// Turn the fields of a payload already decoded by the network server's
/// formatter into readings.
///
/// Used when an uplink arrives without the raw `frm_payload`. Missing and
/// `null` fields are skipped; a field holding the wrong JSON type becomes a
/// `DecodeError` so it is reported and never stored.
pub fn readings_from_decoded_payload(fields: &Map<String, Value>) -> Vec<DecodedReading> {
    let mut readings = Vec::new();

    if let Some(message) = fields.get("error").and_then(Value::as_str) {
        readings.push(DecodedReading::DecodeError {
            original_text: fields
                .get("raw_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: message.to_string(),
        });
    }

    push_number(&mut readings, fields, "temperature_c", DecodedReading::Temperature);
    push_number(&mut readings, fields, "humidity_pct", DecodedReading::Humidity);
    push_number(&mut readings, fields, "activity_index", DecodedReading::Activity);
    push_number(&mut readings, fields, "battery_percent", DecodedReading::Battery);

    match fields.get("gnss_raw") {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) => readings.push(DecodedReading::GnssRaw(raw.clone())),
        Some(other) => readings.push(type_mismatch("gnss_raw", other)),
    }

    if let Some(scan) = wifi_scan_from_fields(fields) {
        readings.push(DecodedReading::WifiScan(scan));
    }

    readings
}

fn push_number(
    readings: &mut Vec<DecodedReading>,
    fields: &Map<String, Value>,
    key: &str,
    wrap: fn(f64) -> DecodedReading,
) {
    match fields.get(key) {
        None | Some(Value::Null) => {}
        Some(value) => match value.as_f64().filter(|v| v.is_finite()) {
            Some(number) => readings.push(wrap(number)),
            None => readings.push(type_mismatch(key, value)),
        },
    }
}

fn type_mismatch(key: &str, value: &Value) -> DecodedReading {
    DecodedReading::DecodeError {
        original_text: value.to_string(),
        message: format!("decoded field {} has an unexpected type", key),
    }
}

fn wifi_scan_from_fields(fields: &Map<String, Value>) -> Option<WifiScan> {
    let has_scan = (1..=WIFI_SLOTS).any(|n| fields.contains_key(&format!("macAddress{}", n)));
    if !has_scan {
        return None;
    }

    let mut scan = WifiScan::default();
    for (index, slot) in scan.slots.iter_mut().enumerate() {
        let n = index + 1;
        slot.mac_address = fields
            .get(&format!("macAddress{}", n))
            .and_then(Value::as_str)
            .filter(|mac| !mac.is_empty())
            .map(str::to_string);
        slot.signal_strength = fields
            .get(&format!("signalStrength{}", n))
            .and_then(Value::as_i64)
            .filter(|rssi| *rssi <= 0)
            .and_then(|rssi| i32::try_from(rssi).ok());
    }

    scan.raw_hex = fields
        .get("raw_hex")
        .and_then(Value::as_str)
        .filter(|raw| !raw.is_empty())
        .map(str::to_string);

    if let Some(warning) = fields.get("warning").and_then(Value::as_str) {
        scan.warnings.push(warning.to_string());
    }

    Some(scan)
}

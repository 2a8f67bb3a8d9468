use crate::{DecodedReading, PayloadDecoder, PayloadError, Result, WifiScan, WIFI_SLOTS};

// Channel (LoRaWAN FPort) assignments used by the field sensor firmware
pub const CHANNEL_TEMPERATURE: u32 = 1;
pub const CHANNEL_HUMIDITY: u32 = 2;
pub const CHANNEL_ACTIVITY: u32 = 3;
pub const CHANNEL_WIFI_SCAN: u32 = 4;
pub const CHANNEL_BATTERY: u32 = 5;
pub const CHANNEL_GNSS: u32 = 6;

/// Optional leading marker sent in front of WiFi scan text
pub const WIFI_SCAN_MARKER: char = 'W';

// WiFi scan layout: three times {12 hex chars MAC, 2 digit magnitude}
pub const MAC_BLOCK_LEN: usize = 12;
pub const SIGNAL_BLOCK_LEN: usize = 2;
pub const WIFI_SLOT_LEN: usize = MAC_BLOCK_LEN + SIGNAL_BLOCK_LEN;
pub const WIFI_SCAN_MIN_LEN: usize = WIFI_SLOT_LEN * WIFI_SLOTS;

/// Stateless decoder for the multiplexed uplink channels.
///
/// Every sensor value except the WiFi scan and GNSS fix is sent as an ASCII
/// decimal number, one sensor per channel.
pub struct PortDecoder;

impl PortDecoder {
    pub fn new() -> Self {
        Self
    }

    fn sensor_name(channel: u32) -> &'static str {
        match channel {
            CHANNEL_TEMPERATURE => "temperature",
            CHANNEL_HUMIDITY => "humidity",
            CHANNEL_ACTIVITY => "activity",
            CHANNEL_WIFI_SCAN => "wifi_scan",
            CHANNEL_BATTERY => "battery",
            CHANNEL_GNSS => "gnss",
            _ => "unknown",
        }
    }

    /// One character per byte, so any byte sequence has a text form
    fn payload_text(bytes: &[u8]) -> String {
        bytes.iter().map(|&b| char::from(b)).collect()
    }

    fn parse_number(channel: u32, text: &str) -> Result<f64> {
        let sensor = Self::sensor_name(channel);
        let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');

        let value: f64 = trimmed.parse().map_err(|_| PayloadError::InvalidNumber {
            sensor,
            channel,
            text: text.to_string(),
        })?;

        if !value.is_finite() {
            return Err(PayloadError::NonFinite {
                sensor,
                channel,
                value,
            });
        }

        Ok(value)
    }

    fn decode_numeric(channel: u32, text: String, wrap: fn(f64) -> DecodedReading) -> DecodedReading {
        match Self::parse_number(channel, &text) {
            Ok(value) => wrap(value),
            Err(e) => DecodedReading::DecodeError {
                original_text: text,
                message: e.to_string(),
            },
        }
    }

    /// `AABBCCDDEEFF` -> `AA:BB:CC:DD:EE:FF`
    fn mac_from_hex(block: &str) -> Option<String> {
        if block.len() != MAC_BLOCK_LEN || !block.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let octets: Vec<&str> = (0..MAC_BLOCK_LEN)
            .step_by(2)
            .map(|i| &block[i..i + 2])
            .collect();
        Some(octets.join(":"))
    }

    /// Two ASCII digits holding the RSSI magnitude; the sign is implied
    fn rssi_from_digits(block: &str) -> Option<i32> {
        if block.len() != SIGNAL_BLOCK_LEN || !block.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        block.parse::<i32>().ok().map(|magnitude| -magnitude)
    }

    fn decode_wifi_scan(text: &str) -> WifiScan {
        let stripped = text.strip_prefix(WIFI_SCAN_MARKER).unwrap_or(text);

        let mut scan = WifiScan {
            raw_hex: Some(stripped.to_string()),
            ..WifiScan::default()
        };

        // Length in characters, so the reported length matches the text
        let len = stripped.chars().count();
        if len < WIFI_SCAN_MIN_LEN {
            scan.warnings.push(PayloadError::WifiTooShort(len).to_string());
            return scan;
        }

        // Slot blocks are sliced by byte offset below
        if !stripped.is_ascii() {
            scan.warnings.push(PayloadError::WifiNotAscii.to_string());
            return scan;
        }

        for (index, slot) in scan.slots.iter_mut().enumerate() {
            let start = index * WIFI_SLOT_LEN;
            let mac_block = &stripped[start..start + MAC_BLOCK_LEN];
            let signal_block = &stripped[start + MAC_BLOCK_LEN..start + WIFI_SLOT_LEN];

            slot.mac_address = Self::mac_from_hex(mac_block);
            if slot.mac_address.is_none() {
                scan.warnings.push(
                    PayloadError::InvalidMac {
                        slot: index + 1,
                        block: mac_block.to_string(),
                    }
                    .to_string(),
                );
            }

            slot.signal_strength = Self::rssi_from_digits(signal_block);
            if slot.signal_strength.is_none() {
                scan.warnings.push(
                    PayloadError::InvalidSignal {
                        slot: index + 1,
                        block: signal_block.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        scan
    }
}

impl Default for PortDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadDecoder for PortDecoder {
    fn decode(&self, channel: u32, bytes: &[u8]) -> DecodedReading {
        let text = Self::payload_text(bytes);

        match channel {
            CHANNEL_TEMPERATURE => Self::decode_numeric(channel, text, DecodedReading::Temperature),
            CHANNEL_HUMIDITY => Self::decode_numeric(channel, text, DecodedReading::Humidity),
            CHANNEL_ACTIVITY => Self::decode_numeric(channel, text, DecodedReading::Activity),
            CHANNEL_BATTERY => Self::decode_numeric(channel, text, DecodedReading::Battery),
            CHANNEL_WIFI_SCAN => DecodedReading::WifiScan(Self::decode_wifi_scan(&text)),
            CHANNEL_GNSS => DecodedReading::GnssRaw(text),
            _ => DecodedReading::Unknown {
                channel,
                message: PayloadError::UnknownChannel(channel).to_string(),
            },
        }
    }
}

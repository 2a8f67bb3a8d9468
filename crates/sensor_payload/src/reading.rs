/// Number of access point slots carried by one WiFi scan uplink
pub const WIFI_SLOTS: usize = 3;

/// Typed result of decoding one channel payload
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedReading {
    /// Degrees Celsius
    Temperature(f64),
    /// Relative humidity in percent
    Humidity(f64),
    Activity(f64),
    WifiScan(WifiScan),
    /// Battery level in percent
    Battery(f64),
    /// Opaque GNSS fix string, passed through untouched
    GnssRaw(String),
    /// Nothing recognized on this channel
    Unknown { channel: u32, message: String },
    /// The payload was addressed to a known channel but could not be parsed
    DecodeError {
        original_text: String,
        message: String,
    },
}

impl DecodedReading {
    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedReading::Temperature(_) => "temperature",
            DecodedReading::Humidity(_) => "humidity",
            DecodedReading::Activity(_) => "activity",
            DecodedReading::WifiScan(_) => "wifi_scan",
            DecodedReading::Battery(_) => "battery",
            DecodedReading::GnssRaw(_) => "gnss_raw",
            DecodedReading::Unknown { .. } => "unknown",
            DecodedReading::DecodeError { .. } => "decode_error",
        }
    }
}

/// One access point observed during a WiFi scan.
///
/// Both halves are optional on their own: a slot can carry a MAC without a
/// usable signal strength and the other way round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiSlot {
    /// Colon separated octets, e.g. `6C:D6:E3:14:E5:80`
    pub mac_address: Option<String>,
    /// RSSI in dBm, always <= 0
    pub signal_strength: Option<i32>,
}

impl WifiSlot {
    pub fn is_empty(&self) -> bool {
        self.mac_address.is_none() && self.signal_strength.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiScan {
    pub slots: [WifiSlot; WIFI_SLOTS],
    /// Scan text with the marker removed, kept even when slots are missing
    pub raw_hex: Option<String>,
    pub warnings: Vec<String>,
}

impl WifiScan {
    pub fn populated_slots(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_empty()).count()
    }
}

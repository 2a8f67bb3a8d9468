pub mod port_decoder;
mod error;
mod reading;

pub use error::{PayloadError, Result};
pub use port_decoder::PortDecoder;
pub use reading::{DecodedReading, WifiScan, WifiSlot, WIFI_SLOTS};

/// Trait for turning a channel-tagged uplink payload into a typed reading
pub trait PayloadDecoder: Send + Sync {
    /// Decode the payload received on `channel`.
    ///
    /// Never fails: malformed input is reported through
    /// [`DecodedReading::DecodeError`] or [`DecodedReading::Unknown`].
    fn decode(&self, channel: u32, bytes: &[u8]) -> DecodedReading;
}

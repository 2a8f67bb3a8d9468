use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("invalid {sensor} format on channel {channel}: {text:?} is not a number")]
    InvalidNumber {
        sensor: &'static str,
        channel: u32,
        text: String,
    },

    #[error("{sensor} reading on channel {channel} is not finite: {value}")]
    NonFinite {
        sensor: &'static str,
        channel: u32,
        value: f64,
    },

    #[error("WiFi payload shorter than expected (len={0})")]
    WifiTooShort(usize),

    #[error("WiFi payload contains non-ASCII characters")]
    WifiNotAscii,

    #[error("WiFi slot {slot}: {block:?} is not a 12 character hex MAC")]
    InvalidMac { slot: usize, block: String },

    #[error("WiFi slot {slot}: {block:?} is not a 2 digit signal magnitude")]
    InvalidSignal { slot: usize, block: String },

    #[error("unknown or unused channel: {0}")]
    UnknownChannel(u32),
}

pub type Result<T> = std::result::Result<T, PayloadError>;

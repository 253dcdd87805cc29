use thiserror::Error;

/// Reasons a stats frame could not be encoded or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("frame truncated")]
    Truncated,
    #[error("header byte does not match a stats frame")]
    BadHeader,
    #[error("secure framing is not supported")]
    SecureUnsupported,
    #[error("node ID bytes invalid")]
    BadId,
    #[error("temperature/power sub-frame invalid")]
    BadTrailer,
    #[error("flags byte invalid")]
    BadFlags,
    #[error("ambient light value not representable on the wire")]
    BadAmbientLight,
    #[error("CRC mismatch")]
    BadCrc,
    #[error("frame terminator missing")]
    MissingTerminator,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("target {value}C outside {min}..={max}C")]
    TargetOutOfRange { value: u8, min: u8, max: u8 },
    #[error("compand mid-band {low}..{high}C cannot fit below the unset sentinel")]
    InvalidCompandBand { low: u8, high: u8 },
    #[error("config parse failed: {0}")]
    Parse(String),
}

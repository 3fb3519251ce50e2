use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeckError>;

/// Errors surfaced by the driver and menu layers.
#[derive(Debug, Error)]
pub enum DeckError {
    /// A key argument was outside `0..KEY_COUNT`. Raised before any bytes
    /// are written.
    #[error("invalid key index {0}")]
    InvalidKeyIndex(u8),

    /// An image buffer did not match the exact size the device expects.
    /// Raised before any bytes are written; images are never truncated or
    /// padded.
    #[error("invalid image size {actual}, expected {expected}")]
    InvalidImageSize { expected: usize, actual: usize },

    /// Enumeration failed, the handle could not be acquired, or an
    /// operation was attempted on a closed device.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A write or feature report failed on an open handle.
    #[error("transport error: {0}")]
    Transport(#[from] hidapi::HidError),

    /// No menu is registered under the requested identifier.
    #[error("unknown menu {0:?}")]
    UnknownMenu(String),

    /// Icon decoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
}

use thiserror::Error;

/// Errors surfaced at the crate's I/O edges. Compilation itself never fails.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid raw image buffer: {0}")]
    InvalidImage(String),
    #[error("invalid machine settings: {0}")]
    InvalidConfig(String),
    #[error("channel error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, Error>;

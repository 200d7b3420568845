use thiserror::Error;

/// Library error type for image loading, decoding and thumbnail caching.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown file type or a pixel format the format table has no entry for.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Malformed layer, mip or face structure inside a texture container.
    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    /// The underlying raster or container decoder reported an error.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The graphics device refused an upload or readback.
    #[error("device upload failure: {0}")]
    DeviceUploadFailure(String),

    /// A device handle was requested for an image with no pictures.
    #[error("image is not loaded")]
    NotLoaded,

    /// A thumbnail cache file could not be parsed.
    #[error("thumbnail cache: {0}")]
    Cache(String),

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    Config(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON settings error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// Errors raised by the file, settings and CLI layers.
///
/// The drawing engine itself never fails: out-of-range coordinates are clipped
/// and degenerate inputs become no-ops.
#[derive(Debug, Error)]
pub enum ColoringError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<Box<bincode::ErrorKind>> for ColoringError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ColoringError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ColoringError>;

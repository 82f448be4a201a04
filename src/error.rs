//! Error types for the photo-watermark crate.

/// Errors that can occur while watermarking, archiving, or handling a submission.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The watermark image could not be decoded.
    #[error("failed to decode watermark image: {0}")]
    WatermarkDecode(#[source] image::ImageError),

    /// The scale percentage is not an integer in `1..=100`.
    #[error("invalid watermark scale {0:?}: expected an integer percentage between 1 and 100")]
    InvalidScale(String),

    /// The scaled watermark collapsed to zero pixels on one axis.
    #[error("watermark scaled to {width}x{height} at {scale}% is empty")]
    WatermarkTooSmall {
        /// Scaled width in pixels.
        width: u32,
        /// Scaled height in pixels.
        height: u32,
        /// Requested scale percentage.
        scale: u32,
    },

    /// The anchor name matches none of the known positions.
    #[error("unknown watermark position: {0:?}")]
    UnknownAnchor(String),

    /// A submission arrived without target images or without a watermark.
    #[error("please provide images and a watermark")]
    MissingInput,

    /// A path has no final file-name component.
    #[error("path has no file name: {}", .0.display())]
    NoFileName(std::path::PathBuf),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing the zip archive failed.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Whether the error was caused by bad caller input rather than by the system.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::WatermarkDecode(_)
                | Self::InvalidScale(_)
                | Self::WatermarkTooSmall { .. }
                | Self::UnknownAnchor(_)
                | Self::MissingInput
        )
    }

    /// HTTP-equivalent status code: 400 for client errors, 500 otherwise.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

//! Errors reported per buffer by the serialization side.

use rgbd_core::CaptureError;
use thiserror::Error;

/// Integrity and I/O errors for BLKD files.
#[derive(Error, Debug)]
pub enum BlkdError {
    /// The file does not start with `BLKD`.
    #[error("Not a BLKD file (bad magic {0:?})")]
    BadMagic([u8; 4]),

    /// Version byte other than 1 or 2.
    #[error("Unsupported BLKD version {0}")]
    UnsupportedVersion(u8),

    /// Version 1 files always hold 2 bytes per pixel.
    #[error("BLKD version 1 requires 2 bytes per pixel, got {0}")]
    Version1BytesPerPixel(u8),

    /// Trailing payload length differs from `width * height * bytes_per_pixel`.
    #[error("BLKD payload length mismatch: expected {expected} bytes, found {actual}")]
    LengthMismatch {
        /// Bytes declared by the header
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Data handed to save is shorter than the header declares.
    #[error("BLKD data too short: header needs {expected} bytes, buffer has {actual}")]
    DataTooShort {
        /// Bytes declared by the header
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },

    /// I/O error while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure serializing one buffer.
///
/// Isolated to the buffer it occurred on: the worker logs it, records it and
/// moves on to the next buffer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Depth-mapping encoding failed.
    #[error("BLKD error: {0}")]
    Blkd(#[from] BlkdError),

    /// File could not be created or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding failed.
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    /// Skeleton JSON encoding failed.
    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel data could not be turned into an image of the declared size.
    #[error("Encoding error: {0}")]
    Encode(String),
}

impl From<StorageError> for CaptureError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => CaptureError::Io(e),
            StorageError::Json(e) => CaptureError::Metadata(e),
            other => CaptureError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_into_capture_error() {
        let io = StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(matches!(CaptureError::from(io), CaptureError::Io(_)));

        let blkd = StorageError::Blkd(BlkdError::UnsupportedVersion(9));
        match CaptureError::from(blkd) {
            CaptureError::Storage(msg) => assert!(msg.contains("version 9")),
            other => panic!("unexpected {other:?}"),
        }
    }
}

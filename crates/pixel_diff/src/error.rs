use std::io;
use thiserror::Error;

/// Errors raised while building, decoding or persisting bitmaps.
///
/// Comparisons themselves never fail; see [`crate::DiffResult::sentinel`].
#[derive(Debug, Error)]
pub enum DiffError {
    /// Raw RGBA buffer length does not match `width * height * 4`.
    #[error("RGBA buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// PNG encoding or decoding failed.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    /// Writing an artifact to disk failed.
    #[error("failed to write diff artifact: {0}")]
    Io(#[from] io::Error),
}

//! Error types for the marker engine.
//!
//! Spatial, clustering and placement code treats bad input as a programming
//! error; only the external collaborators (entity fetch, thumbnails) produce
//! errors that are expected at runtime, and those are absorbed by the engine.

use thiserror::Error;

/// Malformed spatial input.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// A bounds edge was NaN or infinite.
    #[error("non-finite bounds: south={south}, west={west}, north={north}, east={east}")]
    NonFinite { south: f64, west: f64, north: f64, east: f64 },
}

/// Failure fetching an entity snapshot from the content source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source could not be reached or refused the request.
    #[error("content source unavailable: {0}")]
    Unavailable(String),

    /// The source answered but the payload could not be decoded.
    #[error("failed to decode entities: {0}")]
    Decode(String),

    /// A newer request replaced this one before it was sent.
    #[error("fetch superseded by a newer request")]
    Superseded,

    /// Local I/O failure (file-backed sources).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure producing a thumbnail icon.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    /// The raw image bytes could not be fetched.
    #[error("thumbnail fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The bytes were not a decodable image.
    #[error("thumbnail decode failed: {0}")]
    Decode(String),

    /// The decoded image or target size had zero area.
    #[error("thumbnail has no pixels")]
    Empty,
}

impl From<image::ImageError> for ImageError {
    fn from(err: image::ImageError) -> Self {
        ImageError::Decode(err.to_string())
    }
}

/// Misuse of the marker handle pool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The handle is not currently lent out (double release or foreign handle).
    #[error("marker handle {0} is not active in this pool")]
    NotActive(u32),
}

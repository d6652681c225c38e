//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the narrow seam to the two external
//! collaborators of markup generation: the metadata probe (`identify`) and
//! the derivative resolver (`derivative`).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! and `webp` crates with a content-addressed file cache.

use super::params::DerivativeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    /// The source passed the probe but its pixel data can't be decoded.
    #[error("Cannot decode {path}: {reason}")]
    Undecodable { path: String, reason: String },
}

/// Intrinsic size of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image backends.
///
/// `Sync` so the rewriter can share one backend across rayon workers.
/// Implementations must return the same URL for identical parameters and
/// must tolerate concurrent requests for the same derivative.
pub trait ImageBackend: Sync {
    /// Read intrinsic dimensions. Fails if the file is missing or not an image.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Produce (or reuse) a zoom-cropped derivative and return its URL.
    fn derivative(&self, params: &DerivativeParams) -> Result<String, BackendError>;
}

//! Parameter types for derivative requests.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between the planner (which decides which variants a page needs) and the
//! [`backend`](super::backend) (which does the pixel work and caching). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing planning logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 82). Clamped on construction.
//! - [`DerivativeFormat`]: `webp`, or `guess` to let the backend keep the source format.
//! - [`VariantDescriptor`]: format, quality and exact target size of one derivative.
//! - [`DerivativeParams`]: a descriptor bound to a source file.

use serde::Serialize;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Output format requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    WebP,
    /// Backend picks, preserving the source format when it can encode it.
    Guess,
}

impl DerivativeFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Guess => "guess",
        }
    }
}

/// One derivative to request: zoom-cropped to exactly `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VariantDescriptor {
    pub format: DerivativeFormat,
    pub quality: Quality,
    pub width: u32,
    pub height: u32,
}

/// A variant bound to the source file it is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeParams {
    pub source: PathBuf,
    pub variant: VariantDescriptor,
}

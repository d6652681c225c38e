//! Pure Rust probe + `libwebp` encoder backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate |
//! | Zoom-crop | `image::DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Encode → WebP | `webp::Encoder` (lossy, quality honoured) |
//! | Encode → JPEG / PNG | `image::codecs::{jpeg, png}` |
//! | Cache naming / writes | [`crate::cache`] |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{DerivativeFormat, DerivativeParams};
use crate::cache::{self, CacheCounters, CacheStats, DerivativeCache};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::debug;

/// Encoded output format chosen for a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Resolve `guess` from the source extension; anything unknown becomes JPEG.
fn output_format(requested: DerivativeFormat, source: &Path) -> OutputFormat {
    if requested == DerivativeFormat::WebP {
        return OutputFormat::WebP;
    }
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => OutputFormat::Png,
        "webp" => OutputFormat::WebP,
        _ => OutputFormat::Jpeg,
    }
}

/// Content hash of a source, valid while its size and mtime are unchanged.
struct SourceDigest {
    len: u64,
    modified: Option<SystemTime>,
    hash: String,
}

/// Backend that decodes with `image`, zoom-crops, encodes, and caches to disk.
pub struct RustBackend {
    cache: DerivativeCache,
    counters: CacheCounters,
    digests: Mutex<HashMap<PathBuf, SourceDigest>>,
}

impl RustBackend {
    pub fn new(cache: DerivativeCache) -> Self {
        Self {
            cache,
            counters: CacheCounters::default(),
            digests: Mutex::new(HashMap::new()),
        }
    }

    /// Hits and misses since construction.
    pub fn cache_stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// SHA-256 of `path`, read from disk only when the file changed since
    /// the last request. One `<picture>` asks for several derivatives of the
    /// same source.
    fn source_hash(&self, path: &Path) -> Result<String, BackendError> {
        let meta = std::fs::metadata(path)?;
        let (len, modified) = (meta.len(), meta.modified().ok());
        {
            let digests = self.digests.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(d) = digests.get(path) {
                if d.len == len && d.modified == modified {
                    return Ok(d.hash.clone());
                }
            }
        }

        let hash = cache::hash_file(path)?;
        self.digests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                path.to_path_buf(),
                SourceDigest {
                    len,
                    modified,
                    hash: hash.clone(),
                },
            );
        Ok(hash)
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| BackendError::Undecodable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Encode a DynamicImage into memory.
fn encode(img: &DynamicImage, format: OutputFormat, quality: u32) -> Result<Vec<u8>, BackendError> {
    match format {
        OutputFormat::WebP => {
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
            Ok(encoder.encode(quality as f32).to_vec())
        }
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100) as u8)
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
            Ok(out)
        }
        OutputFormat::Png => {
            let rgba = img.to_rgba8();
            let mut out = Cursor::new(Vec::new());
            PngEncoder::new(&mut out)
                .write_image(
                    rgba.as_raw(),
                    rgba.width(),
                    rgba.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
            Ok(out.into_inner())
        }
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn derivative(&self, params: &DerivativeParams) -> Result<String, BackendError> {
        let variant = &params.variant;
        if variant.width == 0 || variant.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid derivative size {}x{}",
                variant.width, variant.height
            )));
        }

        let format = output_format(variant.format, &params.source);
        let source_hash = self.source_hash(&params.source)?;
        let name =
            cache::derivative_file_name(&params.source, &source_hash, variant, format.extension());

        if let Some(url) = self.cache.lookup(&name) {
            debug!(derivative = %name, "cache hit");
            self.counters.hit();
            return Ok(url);
        }

        let img = load_image(&params.source)?;
        let cropped = img.resize_to_fill(variant.width, variant.height, FilterType::Lanczos3);
        let bytes = encode(&cropped, format, variant.quality.value())?;
        self.cache.store(&name, &bytes)?;
        self.counters.miss();
        debug!(derivative = %name, "encoded");

        Ok(self.cache.url_for(&name))
    }
}

//! Shared test utilities: synthetic images and temp-dir site setup.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = TestSite::new();
//! site.jpeg("img/dawn.jpg", 640, 360);
//! let config = site.config();
//! let backend = site.backend();
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::cache::DerivativeCache;
use crate::config::Config;
use crate::imaging::RustBackend;
use image::{ImageEncoder, RgbImage, RgbaImage};

// =========================================================================
// Synthetic images
// =========================================================================

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid PNG file with an alpha channel.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, 200])
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// PNG of pseudo-random pixels, which barely compresses.
pub fn create_noisy_png(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let n = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729);
        image::Rgb([n as u8, (n >> 8) as u8, (n >> 16) as u8])
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

// =========================================================================
// Temp site
// =========================================================================

/// A temp directory laid out as `content/` (sources) and `cache/` (derivatives).
pub struct TestSite {
    pub dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn content(&self) -> PathBuf {
        self.dir.path().join("content")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Write a JPEG under `content/`.
    pub fn jpeg(&self, rel: &str, width: u32, height: u32) -> PathBuf {
        let path = self.content().join(rel);
        create_test_jpeg(&path, width, height);
        path
    }

    /// Write a PNG under `content/`.
    pub fn png(&self, rel: &str, width: u32, height: u32) -> PathBuf {
        let path = self.content().join(rel);
        create_test_png(&path, width, height);
        path
    }

    /// Stock config pointed at this site.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.images.source_root = self.content();
        config.images.cache_dir = self.cache();
        config.images.url_prefix = "/cache".to_string();
        config
    }

    pub fn backend(&self) -> RustBackend {
        RustBackend::new(DerivativeCache::new(self.cache(), "/cache"))
    }
}

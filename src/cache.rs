//! Derivative cache: deterministic file names and at-most-once writes.
//!
//! Encoding is the expensive part of rendering a `<picture>`; a page with
//! three breakpoint tiers at two densities asks for seven derivatives. This
//! module lets the backend skip decoding entirely when an identical
//! derivative already exists on disk.
//!
//! # Cache keys
//!
//! The cache is **content-addressed**. A derivative's file name embeds a
//! SHA-256 digest of:
//!
//! - **the source bytes**, so editing an image in place yields new
//!   derivatives while renaming or moving it does not change the digest part;
//! - **the encode parameters**: format, quality, width, height, extension.
//!
//! Identical inputs therefore always map to the same name and URL, which is
//! what makes repeated renders of the same page byte-identical.
//!
//! # Concurrency
//!
//! New files are written to a uniquely named temporary sibling and renamed
//! into place. Readers never see a partial file, and two workers racing on
//! the same derivative both end with the same complete file. No eviction is
//! performed here.

use crate::imaging::params::VariantDescriptor;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of hex digits of the digest kept in file names.
const DIGEST_LEN: usize = 16;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 hash of in-memory bytes, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a derivative's encode parameters.
pub fn hash_derivative_params(source_hash: &str, variant: &VariantDescriptor, ext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"derivative\0");
    hasher.update(source_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(variant.format.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(variant.quality.value().to_le_bytes());
    hasher.update(variant.width.to_le_bytes());
    hasher.update(variant.height.to_le_bytes());
    hasher.update(ext.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache file name: `<stem>-<digest>-<w>x<h>.<ext>`.
pub fn derivative_file_name(
    source: &Path,
    source_hash: &str,
    variant: &VariantDescriptor,
    ext: &str,
) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let digest = hash_derivative_params(source_hash, variant, ext);
    format!(
        "{}-{}-{}x{}.{}",
        sanitize_stem(&stem),
        &digest[..DIGEST_LEN],
        variant.width,
        variant.height,
        ext
    )
}

/// Keep file names URL-safe without escaping.
fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// On-disk derivative store plus the URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct DerivativeCache {
    dir: PathBuf,
    url_prefix: String,
}

impl DerivativeCache {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn url_for(&self, file_name: &str) -> String {
        let prefix = self.url_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{prefix}/{file_name}")
        }
    }

    /// Returns the URL when the derivative is already on disk.
    pub fn lookup(&self, file_name: &str) -> Option<String> {
        self.path_for(file_name)
            .is_file()
            .then(|| self.url_for(file_name))
    }

    /// Write `bytes` under `file_name` via a temporary file and rename.
    pub fn store(&self, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let target = self.path_for(file_name);
        let temp = self.dir.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&temp, bytes)?;
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(e);
        }
        Ok(target)
    }
}

/// Summary of cache performance for a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} encoded ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Thread-safe counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU32,
    misses: AtomicU32,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

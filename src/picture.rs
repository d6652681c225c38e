//! The `picture` operation: one image reference in, one HTML fragment out.
//!
//! ```text
//! reference ──resolve path──▶ source file
//!     │                          │
//!     │                    identify (probe)
//!     ▼                          ▼
//! directives ──resolve──▶ DirectiveSet ──plan──▶ Plan ──render──▶ <picture>
//! ```
//!
//! Vector sources skip probing and planning entirely. A source that can't be
//! probed or decoded degrades to the configured [`MissingFallback`](crate::config::MissingFallback)
//! in [`Picturer::picture`]; [`Picturer::render`] reports it instead.

use crate::config::Config;
use crate::directives::{self, DirectiveError, DirectiveSet, PartialDirectiveSet};
use crate::imaging::{BackendError, ImageBackend, Quality};
use crate::markup;
use crate::plan::{self, Plan};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PictureError {
    #[error("cannot read image {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },
    #[error("invalid directive: {0}")]
    Directive(#[from] DirectiveError),
    #[error("derivative failed: {0}")]
    Derivative(#[from] BackendError),
}

/// Renders image references against one config and one backend.
pub struct Picturer<'a, B: ImageBackend> {
    config: &'a Config,
    backend: &'a B,
}

impl<'a, B: ImageBackend> Picturer<'a, B> {
    pub fn new(config: &'a Config, backend: &'a B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Filesystem path for an image reference.
    ///
    /// Leading slashes are dropped, so site-absolute references resolve
    /// under the source root. Percent escapes are decoded.
    pub fn source_path(&self, image_ref: &str) -> PathBuf {
        let decoded = urlencoding::decode(image_ref)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| image_ref.to_string());
        self.config
            .images
            .source_root
            .join(decoded.trim_start_matches('/'))
    }

    /// Probe `source` and plan its derivatives.
    fn plan_source(
        &self,
        image_ref: &str,
        source: &Path,
        directives: &DirectiveSet,
    ) -> Result<Plan, PictureError> {
        let dims = self
            .backend
            .identify(source)
            .map_err(|e| PictureError::SourceUnreadable {
                path: image_ref.to_string(),
                reason: e.to_string(),
            })?;
        if dims.width == 0 || dims.height == 0 {
            return Err(PictureError::SourceUnreadable {
                path: image_ref.to_string(),
                reason: format!("zero dimensions {}x{}", dims.width, dims.height),
            });
        }

        let fallback_quality = Quality::new(self.config.images.default_quality);
        let plan = plan::plan(dims, directives, fallback_quality);
        debug!(
            file = image_ref,
            tiers = plan.tiers.len(),
            width = plan.top_width,
            height = plan.top_height,
            "planned"
        );
        Ok(plan)
    }

    /// Resolve directives and plan `image_ref` without requesting derivatives.
    pub fn plan(
        &self,
        image_ref: &str,
        explicit: &PartialDirectiveSet,
        preset: Option<&str>,
    ) -> Result<Plan, PictureError> {
        let directives = directives::resolve(explicit, preset, self.config)?;
        self.plan_source(image_ref, &self.source_path(image_ref), &directives)
    }

    /// Render `image_ref`, reporting an unreadable source as an error.
    pub fn render(
        &self,
        image_ref: &str,
        explicit: &PartialDirectiveSet,
        preset: Option<&str>,
    ) -> Result<String, PictureError> {
        let directives = directives::resolve(explicit, preset, self.config)?;

        if markup::is_vector(image_ref) {
            debug!(file = image_ref, "vector source, passing through");
            return Ok(markup::render_vector(image_ref, &directives));
        }

        let source = self.source_path(image_ref);
        let plan = self.plan_source(image_ref, &source, &directives)?;
        markup::render_picture(self.backend, &source, &directives, &plan).map_err(|e| match e {
            // A valid header over corrupt pixel data only shows up at decode.
            BackendError::Undecodable { reason, .. } => PictureError::SourceUnreadable {
                path: image_ref.to_string(),
                reason,
            },
            other => PictureError::Derivative(other),
        })
    }

    /// Render `image_ref`, degrading an unreadable source to the missing-image
    /// fallback. `page` names the document being processed, for the log.
    pub fn picture(
        &self,
        image_ref: &str,
        explicit: &PartialDirectiveSet,
        preset: Option<&str>,
        page: Option<&str>,
    ) -> Result<String, PictureError> {
        match self.render(image_ref, explicit, preset) {
            Err(PictureError::SourceUnreadable { path, reason }) => {
                if self.config.missing.log {
                    warn!(file = %path, page = page.unwrap_or("-"), %reason, "missing image");
                }
                // Directives were valid or render() would have failed earlier.
                let directives = directives::resolve(explicit, preset, self.config)?;
                Ok(markup::render_missing(
                    self.config.missing.fallback,
                    image_ref,
                    &directives,
                ))
            }
            other => other,
        }
    }
}

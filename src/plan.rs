//! Variant planning: which derivatives a `<picture>` needs.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Given a source's intrinsic size and a resolved [`DirectiveSet`], the
//! planner produces the tiers of a `<picture>` element in markup order:
//!
//! ```text
//! top tier        min-width: <widest breakpoint + 1>   max_width (capped by source)
//! breakpoint 0    min-width: <breakpoint 1 + 1>        image_width of breakpoint 0
//! breakpoint 1    min-width: <breakpoint 2 + 1>        ...
//! breakpoint n    (no media query)                     narrowest
//! ```
//!
//! Media boundaries are positional over the full, descending breakpoint list:
//! a breakpoint skipped because it would upscale still defines its
//! neighbour's boundary. Within a tier, densities are swept in ascending
//! order and any density whose scaled width exceeds the source is dropped.

use crate::directives::DirectiveSet;
use crate::imaging::{DerivativeFormat, Dimensions, Quality, VariantDescriptor};
use serde::Serialize;

/// One srcset candidate: a derivative and the density it is served at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityVariant {
    pub density: f64,
    pub variant: VariantDescriptor,
}

/// One `<source>` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceTier {
    /// `(min-width: Npx)` boundary, if any.
    pub min_width_px: Option<u32>,
    /// Tier width at 1x.
    pub width: u32,
    /// Tier height at 1x.
    pub height: u32,
    /// Ascending by density. May be empty when every density would upscale.
    pub variants: Vec<DensityVariant>,
}

/// Full plan for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    /// Source intrinsic width.
    pub source_width: u32,
    /// Source intrinsic height.
    pub source_height: u32,
    /// Widest width observed across all tiers.
    pub top_width: u32,
    /// Tallest height observed across all tiers.
    pub top_height: u32,
    /// Top tier first, then breakpoint tiers widest threshold first.
    pub tiers: Vec<SourceTier>,
    /// Derivative for the fallback `<img>`.
    pub fallback: VariantDescriptor,
}

/// Height for `width` at `ratio` (height / width), never below one pixel.
pub fn scaled_height(width: u32, ratio: f64) -> u32 {
    ((width as f64 * ratio).round() as u32).max(1)
}

/// Sweep the density set for one tier, dropping upscaled entries.
fn density_sweep(
    tier_width: u32,
    tier_height: u32,
    source_width: u32,
    directives: &DirectiveSet,
) -> Vec<DensityVariant> {
    directives
        .density_set
        .iter()
        .filter(|d| tier_width as f64 * d.density <= source_width as f64)
        .map(|d| DensityVariant {
            density: d.density,
            variant: VariantDescriptor {
                format: DerivativeFormat::WebP,
                quality: Quality::new(d.quality),
                width: ((tier_width as f64 * d.density).round() as u32).max(1),
                height: ((tier_height as f64 * d.density).round() as u32).max(1),
            },
        })
        .collect()
}

/// Plan the tiers and fallback for a source of size `dims`.
///
/// `dims` must be non-zero in both directions.
pub fn plan(dims: Dimensions, directives: &DirectiveSet, fallback_quality: Quality) -> Plan {
    let ratio = directives
        .aspect_ratio
        .unwrap_or(dims.height as f64 / dims.width as f64);

    let mut breakpoints = directives.breakpoints.clone();
    breakpoints.sort_by(|a, b| b.breakpoint.cmp(&a.breakpoint));

    let max_width = directives.max_width.min(dims.width).max(1);
    let max_height = scaled_height(max_width, ratio);

    let mut tiers = vec![SourceTier {
        min_width_px: breakpoints.first().map(|b| b.breakpoint + 1),
        width: max_width,
        height: max_height,
        variants: density_sweep(max_width, max_height, dims.width, directives),
    }];

    let (mut top_width, mut top_height) = (max_width, max_height);

    for (i, bp) in breakpoints.iter().enumerate() {
        if bp.image_width > dims.width {
            continue;
        }
        let height = scaled_height(bp.image_width, ratio);
        tiers.push(SourceTier {
            min_width_px: breakpoints.get(i + 1).map(|next| next.breakpoint + 1),
            width: bp.image_width,
            height,
            variants: density_sweep(bp.image_width, height, dims.width, directives),
        });
        top_width = top_width.max(bp.image_width);
        top_height = top_height.max(height);
    }

    Plan {
        source_width: dims.width,
        source_height: dims.height,
        top_width,
        top_height,
        tiers,
        fallback: VariantDescriptor {
            format: DerivativeFormat::Guess,
            quality: fallback_quality,
            width: top_width,
            height: top_height,
        },
    }
}

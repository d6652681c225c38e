//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! img/dawn.jpg (1600x900)
//!     (min-width: 769px) 1600x900
//!         1x 1600x900 q82
//!     (min-width: 481px) 768x432
//!         1x 768x432 q82
//!         2x 1536x864 q75
//!     default 480x270
//!         1x 480x270 q82
//!         2x 960x540 q75
//!     fallback 1600x900 guess q82
//! ```
//!
//! ## Rewrite
//!
//! ```text
//! posts/hello.html: 3 rewritten, 1 opted out
//! Rewrote 2 documents: 5 images (1 opted out, 1 skipped)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::plan::Plan;
use crate::rewrite::RewriteStats;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Plan
// ============================================================================

pub fn format_plan(image: &str, plan: &Plan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}x{})",
        image, plan.source_width, plan.source_height
    )];
    for tier in &plan.tiers {
        let label = match tier.min_width_px {
            Some(px) => format!("(min-width: {px}px)"),
            None => "default".to_string(),
        };
        lines.push(format!("{}{} {}x{}", indent(1), label, tier.width, tier.height));
        if tier.variants.is_empty() {
            lines.push(format!("{}(no variants, source too small)", indent(2)));
        }
        for v in &tier.variants {
            lines.push(format!(
                "{}{}x {}x{} q{}",
                indent(2),
                v.density,
                v.variant.width,
                v.variant.height,
                v.variant.quality.value()
            ));
        }
    }
    lines.push(format!(
        "{}fallback {}x{} {} q{}",
        indent(1),
        plan.fallback.width,
        plan.fallback.height,
        plan.fallback.format.as_str(),
        plan.fallback.quality.value()
    ));
    lines
}

pub fn print_plan(image: &str, plan: &Plan) {
    for line in format_plan(image, plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Rewrite
// ============================================================================

/// One line per document.
pub fn format_rewrite_line(path: &Path, stats: &RewriteStats) -> String {
    let mut parts = vec![format!("{} rewritten", stats.rewritten)];
    if stats.opted_out > 0 {
        parts.push(format!("{} opted out", stats.opted_out));
    }
    if stats.skipped > 0 {
        parts.push(format!("{} skipped", stats.skipped));
    }
    format!("{}: {}", path.display(), parts.join(", "))
}

/// Totals across all documents of a run.
pub fn format_rewrite_summary(documents: usize, stats: &RewriteStats) -> String {
    let mut detail = Vec::new();
    if stats.opted_out > 0 {
        detail.push(format!("{} opted out", stats.opted_out));
    }
    if stats.skipped > 0 {
        detail.push(format!("{} skipped", stats.skipped));
    }
    let head = format!(
        "Rewrote {}: {}",
        plural(documents, "document", "documents"),
        plural(stats.rewritten, "image", "images")
    );
    if detail.is_empty() {
        head
    } else {
        format!("{head} ({})", detail.join(", "))
    }
}

pub fn print_rewrite_line(path: &Path, stats: &RewriteStats) {
    println!("{}", format_rewrite_line(path, stats));
}

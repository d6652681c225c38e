//! HTML fragments for planned images.
//!
//! Uses [maud](https://maud.lambda.xyz/) so every interpolated attribute is
//! escaped. Three shapes are produced:
//!
//! - **Raster**: `<picture>` with one `<source type="image/webp">` per planned
//!   tier and a fallback `<img>` in a format the backend guesses.
//! - **Vector**: `<picture>` around a single `<img>` pointing at the original
//!   file. No derivatives are requested.
//! - **Missing**: empty, an inline SVG error graphic, or a plain `<img>` at
//!   the unresolved path, depending on [`MissingFallback`].
//!
//! Both `<picture>` shapes keep their `<img>` inside the wrapper so the
//! rewriter recognises them on a later pass.

use crate::config::MissingFallback;
use crate::directives::DirectiveSet;
use crate::imaging::{BackendError, DerivativeParams, ImageBackend};
use crate::plan::{Plan, SourceTier};
use maud::{Markup, html};
use std::path::Path;

/// Class added to the placeholder `<img>`.
pub const MISSING_IMAGE_CLASS: &str = "error--missing-image";

/// Extensions rendered without derivatives.
const VECTOR_EXTENSIONS: &[&str] = &["svg", "svgz"];

/// True when the path names a scalable vector image.
pub fn is_vector(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VECTOR_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// `<url> <density>x, ...` for one tier.
fn srcset(
    backend: &impl ImageBackend,
    source: &Path,
    tier: &SourceTier,
) -> Result<String, BackendError> {
    let entries = tier
        .variants
        .iter()
        .map(|v| {
            let url = backend.derivative(&DerivativeParams {
                source: source.to_path_buf(),
                variant: v.variant,
            })?;
            Ok(format!("{url} {}x", v.density))
        })
        .collect::<Result<Vec<_>, BackendError>>()?;
    Ok(entries.join(", "))
}

/// Plain `<img>` carrying the directive attributes.
fn img_tag(src: &str, directives: &DirectiveSet, width: Option<u32>, height: Option<u32>) -> Markup {
    html! {
        img src=(src)
            class=[directives.class.as_deref()]
            alt=[non_empty(&directives.alt)]
            title=[directives.title.as_deref()]
            width=[width]
            height=[height]
            loading=[directives.loading.attribute()];
    }
}

/// Render a raster `<picture>` from a plan, requesting every derivative.
///
/// Resolver failures propagate: a broken derivative link is worse than a
/// visible error.
pub fn render_picture(
    backend: &impl ImageBackend,
    source: &Path,
    directives: &DirectiveSet,
    plan: &Plan,
) -> Result<String, BackendError> {
    let mut sources = Vec::with_capacity(plan.tiers.len());
    for tier in plan.tiers.iter().filter(|t| !t.variants.is_empty()) {
        let media = tier.min_width_px.map(|px| format!("(min-width: {px}px)"));
        sources.push((media, srcset(backend, source, tier)?));
    }

    let fallback = backend.derivative(&DerivativeParams {
        source: source.to_path_buf(),
        variant: plan.fallback,
    })?;

    let width = directives.width.or(Some(plan.top_width));
    let height = directives.height.or(Some(plan.top_height));

    let markup = html! {
        picture {
            @for (media, srcset) in &sources {
                source media=[media.as_deref()] srcset=(srcset) type="image/webp";
            }
            (img_tag(&fallback, directives, width, height))
        }
    };
    Ok(markup.into_string())
}

/// Render a vector image as-is inside a `<picture>` wrapper.
pub fn render_vector(src: &str, directives: &DirectiveSet) -> String {
    html! {
        picture {
            (img_tag(src, directives, directives.width, directives.height))
        }
    }
    .into_string()
}

/// Inline SVG error graphic naming `path`, as a `data:` URL.
pub fn placeholder_data_url(path: &str) -> String {
    let label = html! { (path) }.into_string();
    let svg = format!(
        concat!(
            r#"<svg width="100%" height="100%" viewBox="0 0 86.591003 53.525999" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<rect x="0" y="0" width="100%" height="100%" fill="white" stroke="red"/>"#,
            r#"<text xml:space="preserve" style="line-height:125%;text-align:center;fill:black" x="86.31" y="17.66" font-weight="300" font-size="10.58" text-anchor="middle">"#,
            r#"<tspan style="text-align:center" x="43.12" y="17.66">Error</tspan>"#,
            r#"<tspan x="43.12" y="30.89">missing image</tspan>"#,
            r#"<tspan x="43.12" y="43.89" font-size="3.58">{}</tspan>"#,
            r#"</text></svg>"#
        ),
        label
    );
    format!("data:image/svg+xml,{}", urlencoding::encode(&svg))
}

/// Degraded output for a source that could not be probed.
pub fn render_missing(fallback: MissingFallback, src: &str, directives: &DirectiveSet) -> String {
    match fallback {
        MissingFallback::Empty => String::new(),
        MissingFallback::Placeholder => {
            let class = match directives.class.as_deref() {
                Some(extra) => format!("{MISSING_IMAGE_CLASS} {extra}"),
                None => MISSING_IMAGE_CLASS.to_string(),
            };
            html! {
                img class=(class) src=(placeholder_data_url(src)) alt=[non_empty(&directives.alt)];
            }
            .into_string()
        }
        MissingFallback::Original => {
            img_tag(src, directives, directives.width, directives.height).into_string()
        }
    }
}

//! # Picturesque
//!
//! Responsive `<picture>` markup for static pages. Given an image reference
//! and a handful of directives, Picturesque probes the source, plans a set of
//! zoom-cropped WebP derivatives per viewport breakpoint and pixel density,
//! and emits a `<picture>` element with a fallback `<img>`. A post-render
//! pass does the same for raw `<img>` tags in finished HTML.
//!
//! # Pipeline
//!
//! ```text
//! call-site directives ─┐
//! named preset ─────────┼─▶ resolve ─▶ DirectiveSet ─┐
//! global defaults ──────┘                            ├─▶ plan ─▶ Plan ─▶ render ─▶ <picture>
//! source file ─────────────────▶ identify ─▶ size ───┘                      ▲
//!                                                                           │
//!                                              derivative(path, format, q, w, h) ─▶ URL
//! ```
//!
//! Resolution and planning are pure functions. All I/O sits behind the
//! [`imaging::ImageBackend`] trait, so everything above it is tested against a
//! recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `picturesque.toml` loading, merging over stock defaults, validation |
//! | [`directives`] | Layered directive resolution: call site → preset → defaults → fallback |
//! | [`plan`] | Breakpoint tiers and density sweeps, never upscaling |
//! | [`markup`] | Maud rendering of `<picture>`, vector passthrough, missing-image fallbacks |
//! | [`picture`] | The `picture` operation: probe → resolve → plan → render |
//! | [`rewrite`] | Post-render `<img>` → `<picture>` rewriting of whole documents |
//! | [`imaging`] | Backend trait, derivative parameters, `image` + `webp` backend |
//! | [`cache`] | Content-addressed derivative names and atomic cache writes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Three-Way Directives
//!
//! Presets can *stop* inheritance, not just override it: `loading = "unset"`
//! drops the global loading mode, `breakpoints_inherited = false` drops the
//! global breakpoints. These are decoded once at the config boundary into
//! [`directives::Directive`] (`Inherit` / `Suppressed` / `Value`), so the
//! resolver never compares strings.
//!
//! ## A Scanner, Not a Regex
//!
//! The rewriter tracks `<picture>` nesting while scanning tags, and never
//! matches an `<img>` that already sits inside one. Generated markup is
//! spliced in after the scan, so a second run over its own output is a no-op.
//!
//! ## Deterministic Derivatives
//!
//! Derivative names hash the source bytes and the encode parameters. The
//! same page rendered twice produces the same URLs, and the second render
//! decodes nothing.

pub mod cache;
pub mod config;
pub mod directives;
pub mod imaging;
pub mod markup;
pub mod output;
pub mod picture;
pub mod plan;
pub mod rewrite;

#[cfg(test)]
pub(crate) mod test_helpers;

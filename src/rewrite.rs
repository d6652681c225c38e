//! Post-render rewriting of raw `<img>` tags into `<picture>` markup.
//!
//! A finished document goes through two passes:
//!
//! 1. **Paragraph unwrapping** (optional): `<p>` elements whose only content
//!    is one `<img>` or one `<picture>` are replaced by that element, since a
//!    `<picture>` block inside a paragraph is awkward to style.
//! 2. **Tag scan**: a single left-to-right scan finds `<img>` tags, tracking
//!    how deep it is inside `<picture>` elements. Tags inside a `<picture>`
//!    are never matched, which keeps the rewriter idempotent. Comments,
//!    `<script>` and `<style>` bodies are skipped.
//!
//! Each remaining tag is checked for eligibility (local path, raster
//! extension, not in an excluded folder), its `alt`/`title`/`class`/`width`/
//! `height` attributes become call-site directives, and a `preset` query
//! parameter on `src` selects a preset. `preset=noImageServer` opts the tag
//! out: only that parameter is removed.
//!
//! Rendering runs on rayon; replacements are spliced back in document order
//! and the scan never looks at generated text.

use crate::config::RewriteConfig;
use crate::directives::PartialDirectiveSet;
use crate::imaging::ImageBackend;
use crate::picture::{PictureError, Picturer};
use maud::html;
use rayon::prelude::*;
use std::ops::Range;
use tracing::{debug, warn};

/// Preset value that leaves a tag alone.
pub const OPT_OUT_PRESET: &str = "noImageServer";

const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Per-document counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Tags replaced with generated markup.
    pub rewritten: usize,
    /// Tags left in place because of the opt-out preset.
    pub opted_out: usize,
    /// Eligible tags left in place because their attributes were unusable.
    pub skipped: usize,
}

impl RewriteStats {
    pub fn add(&mut self, other: RewriteStats) {
        self.rewritten += other.rewritten;
        self.opted_out += other.opted_out;
        self.skipped += other.skipped;
    }
}

#[derive(Debug)]
pub struct Rewritten {
    pub html: String,
    pub stats: RewriteStats,
}

// =============================================================================
// Scanning
// =============================================================================

/// True when `bytes[at..]` opens the tag `name` (e.g. `img`, `/picture`).
fn starts_with_tag(bytes: &[u8], at: usize, name: &str) -> bool {
    let name = name.as_bytes();
    let end = at + 1 + name.len();
    bytes.len() >= end
        && bytes[at] == b'<'
        && bytes[at + 1..end].eq_ignore_ascii_case(name)
        && bytes
            .get(end)
            .is_none_or(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
}

/// Index just past the `>` closing the tag that starts at `start`.
///
/// Quoted attribute values may contain `>`.
fn tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut prev = b'<';
    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && prev == b'=' => quote = Some(b),
            None if b == b'>' => return Some(i + 1),
            None => {}
        }
        if quote.is_none() && !b.is_ascii_whitespace() {
            prev = b;
        }
    }
    None
}

fn find_ci(lower: &str, needle: &str, from: usize) -> Option<usize> {
    lower[from..].find(needle).map(|p| p + from)
}

/// Byte ranges of `<img>` tags that are not inside a `<picture>`, in order.
fn scan_images(document: &str) -> Vec<Range<usize>> {
    let lower = document.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut pos = 0;

    while let Some(start) = find_ci(&lower, "<", pos) {
        let next = bytes.get(start + 1).copied().unwrap_or(b' ');
        if !(next.is_ascii_alphabetic() || next == b'/' || next == b'!') {
            pos = start + 1;
            continue;
        }

        if lower[start..].starts_with("<!--") {
            match find_ci(&lower, "-->", start + 4) {
                Some(end) => {
                    pos = end + 3;
                    continue;
                }
                None => break,
            }
        }

        if let Some(raw) = ["script", "style"]
            .into_iter()
            .find(|name| starts_with_tag(bytes, start, name))
        {
            let closing = find_ci(&lower, &format!("</{raw}"), start + 1)
                .and_then(|close| tag_end(bytes, close));
            match closing {
                Some(end) => {
                    pos = end;
                    continue;
                }
                None => break,
            }
        }

        let Some(end) = tag_end(bytes, start) else {
            break;
        };
        if starts_with_tag(bytes, start, "picture") {
            depth += 1;
        } else if starts_with_tag(bytes, start, "/picture") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && starts_with_tag(bytes, start, "img") {
            found.push(start..end);
        }
        pos = end;
    }
    found
}

// =============================================================================
// Paragraph unwrapping
// =============================================================================

fn is_sole_image(inner: &str) -> bool {
    let lower = inner.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    if starts_with_tag(bytes, 0, "img") {
        return tag_end(bytes, 0) == Some(bytes.len());
    }
    starts_with_tag(bytes, 0, "picture")
        && lower.ends_with("</picture>")
        && lower.matches("<picture").count() == 1
}

/// Replace `<p>` elements holding a single `<img>` or `<picture>` with their content.
pub fn unwrap_paragraphs(document: &str) -> String {
    let lower = document.to_ascii_lowercase();
    let mut out = String::with_capacity(document.len());
    let mut pos = 0;

    while let Some(open) = find_ci(&lower, "<p>", pos) {
        let inner_start = open + 3;
        let Some(close) = find_ci(&lower, "</p>", inner_start) else {
            break;
        };
        out.push_str(&document[pos..open]);
        let inner = document[inner_start..close].trim();
        if is_sole_image(inner) {
            out.push_str(inner);
        } else {
            out.push_str(&document[open..close + 4]);
        }
        pos = close + 4;
    }
    out.push_str(&document[pos..]);
    out
}

// =============================================================================
// Attributes and src
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    /// Lowercased.
    name: String,
    /// Entity-decoded.
    value: String,
    /// Raw value bytes within the tag, quotes excluded.
    span: Option<Range<usize>>,
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Decode the character references that appear in attribute values.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_attributes(tag: &str) -> Vec<Attribute> {
    let bytes = tag.as_bytes();
    let len = bytes.len();
    let is_space = |b: u8| b.is_ascii_whitespace();
    let mut attrs = Vec::new();

    let mut i = 1;
    while i < len && !(is_space(bytes[i]) || bytes[i] == b'>' || bytes[i] == b'/') {
        i += 1;
    }

    loop {
        while i < len && (is_space(bytes[i]) || bytes[i] == b'/') {
            i += 1;
        }
        if i >= len || bytes[i] == b'>' {
            break;
        }

        let name_start = i;
        while i < len && !(is_space(bytes[i]) || matches!(bytes[i], b'=' | b'>' | b'/')) {
            i += 1;
        }
        let name = tag[name_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < len && is_space(bytes[j]) {
            j += 1;
        }
        if j >= len || bytes[j] != b'=' {
            attrs.push(Attribute {
                name,
                value: String::new(),
                span: None,
            });
            continue;
        }

        j += 1;
        while j < len && is_space(bytes[j]) {
            j += 1;
        }
        let span = if j < len && (bytes[j] == b'"' || bytes[j] == b'\'') {
            let quote = bytes[j] as char;
            let start = j + 1;
            let end = tag[start..].find(quote).map_or(len, |p| start + p);
            i = (end + 1).min(len);
            start..end
        } else {
            let start = j;
            while j < len && !(is_space(bytes[j]) || bytes[j] == b'>') {
                j += 1;
            }
            i = j;
            start..j
        };
        attrs.push(Attribute {
            name,
            value: decode_entities(&tag[span.clone()]),
            span: Some(span),
        });
    }
    attrs
}

/// `src` split into path, query and fragment.
#[derive(Debug, PartialEq)]
struct SrcParts<'a> {
    path: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

fn split_src(src: &str) -> SrcParts<'_> {
    let (rest, fragment) = match src.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (src, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    SrcParts {
        path,
        query,
        fragment,
    }
}

/// `http:`, `data:`, protocol-relative and the like cannot be probed locally.
fn has_scheme(path: &str) -> bool {
    if path.starts_with("//") {
        return true;
    }
    path.split_once(':').is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

fn query_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
}

fn decode_query_value(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn is_opt_out(key: &str, value: &str) -> bool {
    key == "preset" && decode_query_value(value).eq_ignore_ascii_case(OPT_OUT_PRESET)
}

/// `src` with the opt-out parameter removed.
fn strip_opt_out(parts: &SrcParts<'_>) -> String {
    let mut out = parts.path.to_string();
    if let Some(query) = parts.query {
        let kept: Vec<String> = query
            .split('&')
            .filter(|p| !p.is_empty())
            .filter(|p| {
                let (key, value) = p.split_once('=').unwrap_or((p, ""));
                !is_opt_out(key, value)
            })
            .map(str::to_string)
            .collect();
        if !kept.is_empty() {
            out.push('?');
            out.push_str(&kept.join("&"));
        }
    }
    if let Some(fragment) = parts.fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

// =============================================================================
// Matching
// =============================================================================

#[derive(Debug)]
enum Match {
    OptOut {
        span: Range<usize>,
        src: String,
    },
    Render {
        range: Range<usize>,
        image_ref: String,
        explicit: PartialDirectiveSet,
        preset: Option<String>,
    },
    Malformed {
        image_ref: String,
        reason: String,
    },
}

#[derive(Debug)]
enum Outcome {
    Replaced(Range<usize>, String),
    OptedOut(Range<usize>, String),
    Skipped,
}

fn is_eligible(path: &str, config: &RewriteConfig) -> bool {
    if path.is_empty() || has_scheme(path) {
        return false;
    }
    if config.filter_folder
        && config
            .excluded_folders
            .iter()
            .any(|folder| path.starts_with(folder.as_str()))
    {
        return false;
    }
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    RASTER_EXTENSIONS.contains(&ext.as_str()) || (config.svg && ext == "svg")
}

fn parse_dimension(name: &str, value: &str) -> Result<Option<u32>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u32>()
        .map(Some)
        .map_err(|_| format!("{name}=\"{value}\" is not a pixel count"))
}

/// Decide what to do with the tag at `range`, or `None` if it is not eligible.
fn classify(document: &str, range: Range<usize>, config: &RewriteConfig) -> Option<Match> {
    let tag = &document[range.clone()];
    let attrs = parse_attributes(tag);
    let src = attrs.iter().find(|a| a.name == "src")?;
    let parts = split_src(&src.value);
    if !is_eligible(parts.path, config) {
        return None;
    }

    let pairs: Vec<(&str, &str)> = parts.query.map(|q| query_pairs(q).collect()).unwrap_or_default();
    if let Some(span) = &src.span
        && pairs.iter().any(|(k, v)| is_opt_out(k, v))
    {
        let start = range.start + span.start;
        return Some(Match::OptOut {
            span: start..range.start + span.end,
            src: html! { (strip_opt_out(&parts)) }.into_string(),
        });
    }

    let image_ref = parts.path.to_string();
    let value = |name: &str| attrs.iter().find(|a| a.name == name).map(|a| a.value.clone());

    let (width, height) = match (
        parse_dimension("width", &value("width").unwrap_or_default()),
        parse_dimension("height", &value("height").unwrap_or_default()),
    ) {
        (Ok(w), Ok(h)) => (w, h),
        (Err(reason), _) | (_, Err(reason)) => return Some(Match::Malformed { image_ref, reason }),
    };

    let preset = pairs
        .iter()
        .rev()
        .find(|(k, _)| *k == "preset")
        .map(|(_, v)| decode_query_value(v));

    Some(Match::Render {
        range,
        image_ref,
        explicit: PartialDirectiveSet {
            alt: value("alt"),
            title: value("title"),
            class: value("class"),
            width,
            height,
            ..PartialDirectiveSet::default()
        },
        preset,
    })
}

// =============================================================================
// Rewriter
// =============================================================================

/// Rewrites whole documents through a [`Picturer`].
pub struct Rewriter<'a, B: ImageBackend> {
    picturer: Picturer<'a, B>,
}

impl<'a, B: ImageBackend> Rewriter<'a, B> {
    pub fn new(picturer: Picturer<'a, B>) -> Self {
        Self { picturer }
    }

    /// Rewrite every eligible `<img>` in `document`.
    ///
    /// `page` names the document in log output. Only derivative failures are
    /// returned as errors; anything wrong with an individual tag leaves that
    /// tag untouched.
    pub fn rewrite(&self, document: &str, page: Option<&str>) -> Result<Rewritten, PictureError> {
        let config = &self.picturer.config().rewrite;
        if !config.enabled {
            return Ok(Rewritten {
                html: document.to_string(),
                stats: RewriteStats::default(),
            });
        }

        let unwrapped;
        let document = if config.remove_wrapper {
            unwrapped = unwrap_paragraphs(document);
            unwrapped.as_str()
        } else {
            document
        };

        let matches: Vec<Match> = scan_images(document)
            .into_iter()
            .filter_map(|range| classify(document, range, config))
            .collect();
        debug!(page = page.unwrap_or("-"), matches = matches.len(), "scanned");

        let outcomes = matches
            .into_par_iter()
            .map(|m| self.apply(m, page))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = RewriteStats::default();
        let mut html = String::with_capacity(document.len());
        let mut cursor = 0;
        for outcome in outcomes {
            let (range, text) = match outcome {
                Outcome::Replaced(range, text) => {
                    stats.rewritten += 1;
                    (range, text)
                }
                Outcome::OptedOut(range, text) => {
                    stats.opted_out += 1;
                    (range, text)
                }
                Outcome::Skipped => {
                    stats.skipped += 1;
                    continue;
                }
            };
            html.push_str(&document[cursor..range.start]);
            html.push_str(&text);
            cursor = range.end;
        }
        html.push_str(&document[cursor..]);

        Ok(Rewritten { html, stats })
    }

    fn apply(&self, m: Match, page: Option<&str>) -> Result<Outcome, PictureError> {
        match m {
            Match::OptOut { span, src } => Ok(Outcome::OptedOut(span, src)),
            Match::Malformed { image_ref, reason } => {
                warn!(file = %image_ref, page = page.unwrap_or("-"), %reason, "leaving image tag as is");
                Ok(Outcome::Skipped)
            }
            Match::Render {
                range,
                image_ref,
                explicit,
                preset,
            } => match self
                .picturer
                .picture(&image_ref, &explicit, preset.as_deref(), page)
            {
                Ok(html) => Ok(Outcome::Replaced(range, html)),
                Err(PictureError::Directive(e)) => {
                    warn!(file = %image_ref, page = page.unwrap_or("-"), reason = %e, "leaving image tag as is");
                    Ok(Outcome::Skipped)
                }
                Err(e) => Err(e),
            },
        }
    }
}

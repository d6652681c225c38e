//! Directive resolution: call-site overrides → preset → global defaults → fallback.
//!
//! A [`DirectiveSet`] is the fully populated description of how one image is
//! rendered. It is assembled fresh for every call by [`resolve`], which merges
//! up to four layers field by field, highest first:
//!
//! 1. explicit call-site value (if present and non-empty)
//! 2. the named preset's value (if the preset exists and the field is non-empty)
//! 3. the global default from [`DefaultsConfig`]
//! 4. a hard-coded fallback constant
//!
//! Two fields need more than "present or absent": a preset may *suppress*
//! inheritance of the global loading mode, and may opt out of breakpoint
//! tiers entirely. Those fields carry a [`Directive`] instead of an
//! `Option`, and a `Suppressed` layer skips straight to the fallback.

use crate::config::{Config, DefaultsConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Fallback when neither preset nor config supplies a max width.
pub const FALLBACK_MAX_WIDTH: u32 = 1920;

/// Fallback density sweep: a single 1x entry.
pub const FALLBACK_DENSITY: Density = Density {
    density: 1.0,
    quality: 82,
};

#[derive(Error, Debug, PartialEq)]
pub enum DirectiveError {
    #[error("quality must be 1-100, got {0}")]
    Quality(u32),
    #[error("density must be a positive number, got {0}")]
    Density(f64),
    #[error("aspect ratio must be a positive number, got {0}")]
    AspectRatio(f64),
    #[error("{field} must be greater than 0")]
    ZeroDimension { field: &'static str },
}

/// Value of the `loading` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    Auto,
    Lazy,
    Eager,
    /// Emit no `loading` attribute.
    #[default]
    None,
}

impl LoadingMode {
    /// Attribute value, or `None` when the attribute is omitted.
    pub fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Auto => Some("auto"),
            Self::Lazy => Some("lazy"),
            Self::Eager => Some("eager"),
            Self::None => None,
        }
    }
}

impl std::str::FromStr for LoadingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "lazy" => Ok(Self::Lazy),
            "eager" => Ok(Self::Eager),
            "none" => Ok(Self::None),
            other => Err(format!("unknown loading mode: {other}")),
        }
    }
}

/// Viewport threshold and the image width served in its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Breakpoint {
    /// Viewport width in CSS pixels.
    pub breakpoint: u32,
    /// Derivative width served for this tier.
    pub image_width: u32,
}

/// Pixel density multiplier with its encode quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Density {
    pub density: f64,
    pub quality: u32,
}

/// Three-way layer value: fall through, stop inheritance, or set.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Directive<T> {
    /// Defer to the next layer.
    #[default]
    Inherit,
    /// Skip the global default and use the hard-coded fallback.
    Suppressed,
    Value(T),
}

impl<T> Directive<T> {
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Inherit, Self::Value)
    }
}

/// One layer of call-site or preset directives. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDirectiveSet {
    pub alt: Option<String>,
    pub title: Option<String>,
    pub loading: Directive<LoadingMode>,
    pub aspect_ratio: Option<f64>,
    pub breakpoints: Directive<Vec<Breakpoint>>,
    pub max_width: Option<u32>,
    pub density_set: Option<Vec<Density>>,
    pub class: Option<String>,
    /// Display width attribute, taken verbatim from an existing tag.
    pub width: Option<u32>,
    /// Display height attribute, taken verbatim from an existing tag.
    pub height: Option<u32>,
}

/// Fully resolved directives for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveSet {
    pub alt: String,
    pub title: Option<String>,
    pub loading: LoadingMode,
    /// Height / width; `None` means use the source's own ratio.
    pub aspect_ratio: Option<f64>,
    /// Sorted by `breakpoint` descending.
    pub breakpoints: Vec<Breakpoint>,
    pub max_width: u32,
    /// Sorted by `density` ascending.
    pub density_set: Vec<Density>,
    pub class: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

fn non_empty_str(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

fn non_empty_vec<T: Clone>(value: &Option<Vec<T>>) -> Option<Vec<T>> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// First `Value` wins; a `Suppressed` layer stops the search and selects the fallback.
fn merge_directive<T: Clone>(
    layers: &[&Directive<T>],
    global: Option<T>,
    fallback: impl FnOnce() -> T,
) -> T {
    for layer in layers {
        match layer {
            Directive::Value(v) => return v.clone(),
            Directive::Suppressed => return fallback(),
            Directive::Inherit => {}
        }
    }
    global.unwrap_or_else(fallback)
}

fn non_empty_breakpoints(d: &Directive<Vec<Breakpoint>>) -> Directive<Vec<Breakpoint>> {
    match d {
        Directive::Value(v) if v.is_empty() => Directive::Inherit,
        other => other.clone(),
    }
}

/// Merge explicit call-site values, an optional preset, and global defaults.
///
/// An unknown preset name is ignored. Explicit values are validated; config
/// layers were validated at load time.
pub fn resolve(
    explicit: &PartialDirectiveSet,
    preset_name: Option<&str>,
    config: &Config,
) -> Result<DirectiveSet, DirectiveError> {
    validate_partial(explicit)?;

    let preset = match preset_name.filter(|n| !n.is_empty()) {
        Some(name) => match config.preset(name) {
            Some(p) => p.directives(),
            None => {
                debug!(preset = name, "preset not found, using defaults");
                PartialDirectiveSet::default()
            }
        },
        None => PartialDirectiveSet::default(),
    };
    let defaults: &DefaultsConfig = &config.defaults;

    let loading = merge_directive(
        &[&explicit.loading, &preset.loading],
        Some(defaults.loading),
        LoadingMode::default,
    );

    let mut breakpoints = merge_directive(
        &[
            &non_empty_breakpoints(&explicit.breakpoints),
            &non_empty_breakpoints(&preset.breakpoints),
        ],
        Some(defaults.breakpoints.clone()).filter(|b| !b.is_empty()),
        Vec::new,
    );
    breakpoints.sort_by(|a, b| b.breakpoint.cmp(&a.breakpoint));

    let max_width = explicit
        .max_width
        .filter(|w| *w > 0)
        .or(preset.max_width.filter(|w| *w > 0))
        .or(Some(defaults.max_width).filter(|w| *w > 0))
        .unwrap_or(FALLBACK_MAX_WIDTH);

    let mut density_set = non_empty_vec(&explicit.density_set)
        .or_else(|| non_empty_vec(&preset.density_set))
        .or_else(|| Some(defaults.density_set.clone()).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| vec![FALLBACK_DENSITY]);
    density_set.sort_by(|a, b| a.density.total_cmp(&b.density));

    let class = non_empty_str(&explicit.class)
        .or_else(|| non_empty_str(&preset.class))
        .or_else(|| non_empty_str(&defaults.class));

    Ok(DirectiveSet {
        alt: explicit.alt.clone().unwrap_or_default(),
        title: non_empty_str(&explicit.title),
        loading,
        aspect_ratio: explicit.aspect_ratio.or(preset.aspect_ratio),
        breakpoints,
        max_width,
        density_set,
        class,
        width: explicit.width,
        height: explicit.height,
    })
}

fn validate_partial(partial: &PartialDirectiveSet) -> Result<(), DirectiveError> {
    if let Some(ratio) = partial.aspect_ratio
        && !(ratio.is_finite() && ratio > 0.0)
    {
        return Err(DirectiveError::AspectRatio(ratio));
    }
    if let Directive::Value(breakpoints) = &partial.breakpoints
        && breakpoints.iter().any(|b| b.image_width == 0)
    {
        return Err(DirectiveError::ZeroDimension {
            field: "breakpoint image_width",
        });
    }
    for d in partial.density_set.iter().flatten() {
        if !(d.density.is_finite() && d.density > 0.0) {
            return Err(DirectiveError::Density(d.density));
        }
        if !(1..=100).contains(&d.quality) {
            return Err(DirectiveError::Quality(d.quality));
        }
    }
    if partial.width == Some(0) {
        return Err(DirectiveError::ZeroDimension { field: "width" });
    }
    if partial.height == Some(0) {
        return Err(DirectiveError::ZeroDimension { field: "height" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PresetConfig, PresetLoading};

    fn bp(breakpoint: u32, image_width: u32) -> Breakpoint {
        Breakpoint {
            breakpoint,
            image_width,
        }
    }

    fn config_with_defaults() -> Config {
        let mut config = Config::default();
        config.defaults.loading = LoadingMode::Lazy;
        config.defaults.breakpoints = vec![bp(480, 480), bp(768, 768)];
        config.defaults.class = Some("img".into());
        config
    }

    #[test]
    fn defaults_only() {
        let set = resolve(&PartialDirectiveSet::default(), None, &config_with_defaults()).unwrap();
        assert_eq!(set.loading, LoadingMode::Lazy);
        assert_eq!(set.max_width, 1920);
        assert_eq!(set.class.as_deref(), Some("img"));
        assert_eq!(set.alt, "");
        assert_eq!(set.density_set, vec![FALLBACK_DENSITY]);
    }

    #[test]
    fn breakpoints_sorted_descending() {
        let set = resolve(&PartialDirectiveSet::default(), None, &config_with_defaults()).unwrap();
        let order: Vec<u32> = set.breakpoints.iter().map(|b| b.breakpoint).collect();
        assert_eq!(order, vec![768, 480]);
    }

    #[test]
    fn densities_sorted_ascending() {
        let explicit = PartialDirectiveSet {
            density_set: Some(vec![
                Density {
                    density: 2.0,
                    quality: 70,
                },
                Density {
                    density: 1.0,
                    quality: 82,
                },
            ]),
            ..PartialDirectiveSet::default()
        };
        let set = resolve(&explicit, None, &Config::default()).unwrap();
        assert_eq!(set.density_set[0].density, 1.0);
        assert_eq!(set.density_set[1].density, 2.0);
    }

    #[test]
    fn explicit_beats_preset_beats_default() {
        let mut config = config_with_defaults();
        config.presets.insert(
            "card".into(),
            PresetConfig {
                class: Some("card".into()),
                max_width: Some(800),
                ..PresetConfig::default()
            },
        );

        let set = resolve(&PartialDirectiveSet::default(), Some("card"), &config).unwrap();
        assert_eq!(set.class.as_deref(), Some("card"));
        assert_eq!(set.max_width, 800);

        let explicit = PartialDirectiveSet {
            class: Some("hero".into()),
            ..PartialDirectiveSet::default()
        };
        let set = resolve(&explicit, Some("card"), &config).unwrap();
        assert_eq!(set.class.as_deref(), Some("hero"));
        assert_eq!(set.max_width, 800);
    }

    #[test]
    fn empty_explicit_values_do_not_override() {
        let explicit = PartialDirectiveSet {
            class: Some("  ".into()),
            density_set: Some(vec![]),
            breakpoints: Directive::Value(vec![]),
            ..PartialDirectiveSet::default()
        };
        let set = resolve(&explicit, None, &config_with_defaults()).unwrap();
        assert_eq!(set.class.as_deref(), Some("img"));
        assert_eq!(set.breakpoints.len(), 2);
        assert_eq!(set.density_set.len(), 1);
    }

    #[test]
    fn unknown_preset_is_ignored() {
        let config = config_with_defaults();
        let with = resolve(&PartialDirectiveSet::default(), Some("nope"), &config).unwrap();
        let without = resolve(&PartialDirectiveSet::default(), None, &config).unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn preset_unset_loading_suppresses_default() {
        let mut config = config_with_defaults();
        config.presets.insert(
            "quiet".into(),
            PresetConfig {
                loading: Some(PresetLoading::Unset),
                ..PresetConfig::default()
            },
        );
        let set = resolve(&PartialDirectiveSet::default(), Some("quiet"), &config).unwrap();
        assert_eq!(set.loading, LoadingMode::None);
        // other fields still default normally
        assert_eq!(set.class.as_deref(), Some("img"));
        assert_eq!(set.breakpoints.len(), 2);
    }

    #[test]
    fn explicit_loading_beats_preset_suppression() {
        let mut config = config_with_defaults();
        config.presets.insert(
            "quiet".into(),
            PresetConfig {
                loading: Some(PresetLoading::Unset),
                ..PresetConfig::default()
            },
        );
        let explicit = PartialDirectiveSet {
            loading: Directive::Value(LoadingMode::Eager),
            ..PartialDirectiveSet::default()
        };
        let set = resolve(&explicit, Some("quiet"), &config).unwrap();
        assert_eq!(set.loading, LoadingMode::Eager);
    }

    #[test]
    fn preset_breakpoint_opt_out_yields_empty_list() {
        let mut config = config_with_defaults();
        config.presets.insert(
            "flat".into(),
            PresetConfig {
                breakpoints_inherited: Some(false),
                ..PresetConfig::default()
            },
        );
        let set = resolve(&PartialDirectiveSet::default(), Some("flat"), &config).unwrap();
        assert!(set.breakpoints.is_empty());
        assert_eq!(set.loading, LoadingMode::Lazy);
    }

    #[test]
    fn explicit_breakpoints_override_preset_opt_out() {
        let mut config = config_with_defaults();
        config.presets.insert(
            "flat".into(),
            PresetConfig {
                breakpoints_inherited: Some(false),
                ..PresetConfig::default()
            },
        );
        let explicit = PartialDirectiveSet {
            breakpoints: Directive::Value(vec![bp(1024, 1000)]),
            ..PartialDirectiveSet::default()
        };
        let set = resolve(&explicit, Some("flat"), &config).unwrap();
        assert_eq!(set.breakpoints, vec![bp(1024, 1000)]);
    }

    #[test]
    fn aspect_ratio_from_preset() {
        let mut config = Config::default();
        config.presets.insert(
            "wide".into(),
            PresetConfig {
                ratio: Some(0.5),
                ..PresetConfig::default()
            },
        );
        let set = resolve(&PartialDirectiveSet::default(), Some("wide"), &config).unwrap();
        assert_eq!(set.aspect_ratio, Some(0.5));
    }

    #[test]
    fn malformed_explicit_values_fail_fast() {
        let bad_ratio = PartialDirectiveSet {
            aspect_ratio: Some(0.0),
            ..PartialDirectiveSet::default()
        };
        assert_eq!(
            resolve(&bad_ratio, None, &Config::default()),
            Err(DirectiveError::AspectRatio(0.0))
        );

        let bad_quality = PartialDirectiveSet {
            density_set: Some(vec![Density {
                density: 1.0,
                quality: 0,
            }]),
            ..PartialDirectiveSet::default()
        };
        assert_eq!(
            resolve(&bad_quality, None, &Config::default()),
            Err(DirectiveError::Quality(0))
        );

        let bad_width = PartialDirectiveSet {
            width: Some(0),
            ..PartialDirectiveSet::default()
        };
        assert!(resolve(&bad_width, None, &Config::default()).is_err());
    }

    #[test]
    fn loading_mode_parses_case_insensitively() {
        assert_eq!("LAZY".parse::<LoadingMode>(), Ok(LoadingMode::Lazy));
        assert_eq!("none".parse::<LoadingMode>(), Ok(LoadingMode::None));
        assert!("later".parse::<LoadingMode>().is_err());
        assert_eq!(LoadingMode::None.attribute(), None);
        assert_eq!(LoadingMode::Eager.attribute(), Some("eager"));
    }
}

//! Configuration module.
//!
//! Handles loading, validating, and merging `picturesque.toml`. The user file
//! is sparse: stock defaults are serialized to a TOML table, the user file is
//! merged over it key by key, and the result is deserialized into the typed
//! [`Config`]. Nothing downstream reads configuration by string key.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! loading = "none"          # auto | lazy | eager | none
//! max_width = 1920          # Widest derivative ever requested
//! breakpoints = []          # [{ breakpoint = 768, image_width = 768 }, ...]
//! density_set = [{ density = 1, quality = 82 }]
//! # class = "responsive"
//!
//! [presets.hero]            # Named partial directive sets
//! loading = "unset"         # "unset" stops the global default from applying
//! breakpoints_inherited = false
//! ratio = 0.5625
//!
//! [rewrite]
//! enabled = true            # Run the post-render pass
//! remove_wrapper = true     # Unwrap <p> around a lone image
//! filter_folder = true      # Skip images under excluded_folders
//! excluded_folders = ["/themes/", "/images/"]
//! svg = false               # Also rewrite .svg references
//!
//! [missing]
//! log = true                # Warn about unreadable sources
//! fallback = "empty"        # empty | placeholder | original
//!
//! [images]
//! default_quality = 82      # Quality of the fallback <img>
//! source_root = "."         # Image paths resolve relative to this
//! cache_dir = "cache/images"
//! url_prefix = "images"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::directives::{Breakpoint, Density, Directive, LoadingMode, PartialDirectiveSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILENAME: &str = "picturesque.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration, assembled once at startup and passed explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global directive defaults (third merge layer).
    pub defaults: DefaultsConfig,
    /// Named presets, selectable per call or via `?preset=<name>`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub presets: BTreeMap<String, PresetConfig>,
    /// Post-render pass toggles.
    pub rewrite: RewriteConfig,
    /// Missing-image handling.
    pub missing: MissingConfig,
    /// Source lookup and derivative cache location.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_quality("images.default_quality", self.images.default_quality)?;
        if self.defaults.max_width == 0 {
            return Err(ConfigError::Validation(
                "defaults.max_width must be greater than 0".into(),
            ));
        }
        validate_breakpoints("defaults.breakpoints", &self.defaults.breakpoints)?;
        validate_densities("defaults.density_set", &self.defaults.density_set)?;

        for (name, preset) in &self.presets {
            if preset.max_width == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "presets.{name}.max_width must be greater than 0"
                )));
            }
            if let Some(ratio) = preset.ratio
                && !(ratio.is_finite() && ratio > 0.0)
            {
                return Err(ConfigError::Validation(format!(
                    "presets.{name}.ratio must be a positive number"
                )));
            }
            if let Some(breakpoints) = &preset.breakpoints {
                validate_breakpoints(&format!("presets.{name}.breakpoints"), breakpoints)?;
            }
            if let Some(densities) = &preset.density_set {
                validate_densities(&format!("presets.{name}.density_set"), densities)?;
            }
        }

        if self.rewrite.excluded_folders.iter().any(|f| f.is_empty()) {
            return Err(ConfigError::Validation(
                "rewrite.excluded_folders must not contain empty entries".into(),
            ));
        }
        Ok(())
    }

    /// Look up a preset by name. Unknown names resolve to `None`.
    pub fn preset(&self, name: &str) -> Option<&PresetConfig> {
        self.presets.get(name)
    }
}

fn validate_quality(field: &str, quality: u32) -> Result<(), ConfigError> {
    if !(1..=100).contains(&quality) {
        return Err(ConfigError::Validation(format!("{field} must be 1-100")));
    }
    Ok(())
}

fn validate_breakpoints(field: &str, breakpoints: &[Breakpoint]) -> Result<(), ConfigError> {
    if breakpoints.iter().any(|b| b.image_width == 0) {
        return Err(ConfigError::Validation(format!(
            "{field}: image_width must be greater than 0"
        )));
    }
    Ok(())
}

fn validate_densities(field: &str, densities: &[Density]) -> Result<(), ConfigError> {
    for d in densities {
        if !(d.density.is_finite() && d.density > 0.0) {
            return Err(ConfigError::Validation(format!(
                "{field}: density must be a positive number"
            )));
        }
        validate_quality(&format!("{field}: quality"), d.quality)?;
    }
    Ok(())
}

/// Global directive defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub loading: LoadingMode,
    pub max_width: u32,
    pub breakpoints: Vec<Breakpoint>,
    pub density_set: Vec<Density>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            loading: LoadingMode::None,
            max_width: 1920,
            breakpoints: Vec::new(),
            density_set: vec![Density {
                density: 1.0,
                quality: 82,
            }],
            class: None,
        }
    }
}

/// Loading value as written in a preset: a mode, or `"unset"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetLoading {
    Auto,
    Lazy,
    Eager,
    None,
    /// Suppress inheritance of the global default.
    Unset,
}

impl From<PresetLoading> for Directive<LoadingMode> {
    fn from(value: PresetLoading) -> Self {
        match value {
            PresetLoading::Auto => Directive::Value(LoadingMode::Auto),
            PresetLoading::Lazy => Directive::Value(LoadingMode::Lazy),
            PresetLoading::Eager => Directive::Value(LoadingMode::Eager),
            PresetLoading::None => Directive::Value(LoadingMode::None),
            PresetLoading::Unset => Directive::Suppressed,
        }
    }
}

/// A named, partially-populated directive set.
///
/// Absent or empty fields do not override lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresetConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading: Option<PresetLoading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<Breakpoint>>,
    /// `false` with no breakpoints of its own collapses breakpoints to
    /// empty instead of falling through to `defaults.breakpoints`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints_inherited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Height / width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_set: Option<Vec<Density>>,
}

impl PresetConfig {
    /// Convert into the partial set consumed by the directive resolver.
    pub fn directives(&self) -> PartialDirectiveSet {
        let breakpoints = match (&self.breakpoints, self.breakpoints_inherited) {
            (Some(list), _) if !list.is_empty() => Directive::Value(list.clone()),
            (_, Some(false)) => Directive::Suppressed,
            _ => Directive::Inherit,
        };
        PartialDirectiveSet {
            loading: self.loading.map(Directive::from).unwrap_or_default(),
            aspect_ratio: self.ratio,
            breakpoints,
            max_width: self.max_width,
            density_set: self.density_set.clone(),
            class: self.class.clone(),
            ..PartialDirectiveSet::default()
        }
    }
}

/// Output Rewriter toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    pub enabled: bool,
    pub remove_wrapper: bool,
    pub filter_folder: bool,
    /// Path prefixes skipped when `filter_folder` is on.
    pub excluded_folders: Vec<String>,
    pub svg: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remove_wrapper: true,
            filter_folder: true,
            excluded_folders: vec!["/themes/".to_string(), "/images/".to_string()],
            svg: false,
        }
    }
}

/// What to emit when a source image cannot be probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFallback {
    /// Emit nothing.
    #[default]
    Empty,
    /// Inline SVG error graphic naming the missing path.
    Placeholder,
    /// Plain `<img>` pointing at the original, unresolvable path.
    Original,
}

/// Missing-image handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissingConfig {
    pub log: bool,
    pub fallback: MissingFallback,
}

impl Default for MissingConfig {
    fn default() -> Self {
        Self {
            log: true,
            fallback: MissingFallback::Empty,
        }
    }
}

/// Source lookup and derivative cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Encode quality for the fallback `<img>` derivative (1-100).
    pub default_quality: u32,
    /// Directory image references are resolved against.
    pub source_root: PathBuf,
    /// Directory derivatives are written to.
    pub cache_dir: PathBuf,
    /// URL prefix under which `cache_dir` is served.
    pub url_prefix: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            default_quality: 82,
            source_root: PathBuf::from("."),
            cache_dir: PathBuf::from("cache/images"),
            url_prefix: "images".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel rewrite workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file path.
///
/// A missing file yields the stock defaults; an unreadable or invalid file
/// is an error.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `picturesque.toml` from the given directory.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    load_config_file(&root.join(CONFIG_FILENAME))
}

/// Returns a fully-commented stock `picturesque.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Picturesque Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Global directive defaults
# ---------------------------------------------------------------------------
[defaults]
# Value of the loading attribute: auto, lazy, eager, or none (omit it).
loading = "none"

# Widest derivative requested for the top tier. Never exceeds the source.
max_width = 1920

# Breakpoint tiers. Each entry serves an image_width-wide derivative to
# viewports in its band. Sorted widest first before use.
# breakpoints = [
#     { breakpoint = 1200, image_width = 1200 },
#     { breakpoint = 768, image_width = 768 },
# ]
breakpoints = []

# Pixel densities emitted per tier, each with its own encode quality.
# Densities that would upscale the source are dropped.
density_set = [{ density = 1.0, quality = 82 }]

# CSS class for the <img> element.
# class = "responsive"

# ---------------------------------------------------------------------------
# Presets: named partial directive sets
# ---------------------------------------------------------------------------
# Select with picture(..., preset = "hero") or <img src="a.jpg?preset=hero">.
# Fields left out fall through to [defaults].
#
# [presets.hero]
# loading = "unset"              # "unset": do not inherit defaults.loading
# breakpoints_inherited = false  # no own breakpoints -> no breakpoint tiers
# max_width = 2400
# ratio = 0.5625                 # height / width
# class = "hero"
# density_set = [{ density = 1.0, quality = 82 }, { density = 2.0, quality = 70 }]

# ---------------------------------------------------------------------------
# Post-render rewriting of plain <img> tags
# ---------------------------------------------------------------------------
[rewrite]
enabled = true

# Unwrap <p> elements that contain nothing but one <img> or <picture>.
remove_wrapper = true

# Skip images whose path starts with one of excluded_folders.
filter_folder = true
excluded_folders = ["/themes/", "/images/"]

# Also rewrite .svg references (passed through without derivatives).
svg = false

# ---------------------------------------------------------------------------
# Missing images
# ---------------------------------------------------------------------------
[missing]
# Log a warning naming the file and the page that requested it.
log = true

# What to render instead: empty, placeholder (inline SVG), or original
# (plain <img> pointing at the unresolved path).
fallback = "empty"

# ---------------------------------------------------------------------------
# Sources and derivative cache
# ---------------------------------------------------------------------------
[images]
# Encode quality of the fallback <img> derivative (1-100).
default_quality = 82

# Directory image references are resolved against.
source_root = "."

# Where derivatives are written, and the URL prefix they are served under.
cache_dir = "cache/images"
url_prefix = "images"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for the rewrite pass.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_fallbacks() {
        let config = Config::default();
        assert_eq!(config.defaults.loading, LoadingMode::None);
        assert_eq!(config.defaults.max_width, 1920);
        assert!(config.defaults.breakpoints.is_empty());
        assert_eq!(config.defaults.density_set.len(), 1);
        assert_eq!(config.defaults.density_set[0].quality, 82);
        assert_eq!(config.images.default_quality, 82);
        assert_eq!(config.missing.fallback, MissingFallback::Empty);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[defaults]
loading = "lazy"
"#;
        let config = resolve_config(Some(toml::from_str(toml).unwrap())).unwrap();
        assert_eq!(config.defaults.loading, LoadingMode::Lazy);
        assert_eq!(config.defaults.max_width, 1920);
        assert!(config.rewrite.enabled);
    }

    #[test]
    fn parse_presets() {
        let toml = r#"
[presets.hero]
loading = "unset"
breakpoints_inherited = false
ratio = 0.5

[presets.gallery]
breakpoints = [{ breakpoint = 768, image_width = 700 }]
density_set = [{ density = 1, quality = 80 }, { density = 2, quality = 60 }]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let hero = config.preset("hero").unwrap();
        assert_eq!(hero.loading, Some(PresetLoading::Unset));
        assert_eq!(hero.breakpoints_inherited, Some(false));
        assert_eq!(hero.ratio, Some(0.5));

        let gallery = config.preset("gallery").unwrap();
        assert_eq!(gallery.breakpoints.as_ref().unwrap()[0].image_width, 700);
        assert_eq!(gallery.density_set.as_ref().unwrap()[1].density, 2.0);
        assert!(config.preset("missing").is_none());
    }

    #[test]
    fn preset_directives_decode_sentinels() {
        let preset = PresetConfig {
            loading: Some(PresetLoading::Unset),
            breakpoints_inherited: Some(false),
            ..PresetConfig::default()
        };
        let partial = preset.directives();
        assert_eq!(partial.loading, Directive::Suppressed);
        assert_eq!(partial.breakpoints, Directive::Suppressed);
    }

    #[test]
    fn preset_own_breakpoints_win_over_opt_out() {
        let preset = PresetConfig {
            breakpoints: Some(vec![Breakpoint {
                breakpoint: 480,
                image_width: 480,
            }]),
            breakpoints_inherited: Some(false),
            ..PresetConfig::default()
        };
        assert!(matches!(preset.directives().breakpoints, Directive::Value(ref b) if b.len() == 1));
    }

    #[test]
    fn preset_empty_breakpoints_inherit() {
        let preset = PresetConfig {
            breakpoints: Some(vec![]),
            ..PresetConfig::default()
        };
        assert_eq!(preset.directives().breakpoints, Directive::Inherit);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.defaults.max_width, 1920);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[missing]
fallback = "placeholder"

[images]
url_prefix = "/media"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.missing.fallback, MissingFallback::Placeholder);
        assert_eq!(config.images.url_prefix, "/media");
        assert_eq!(config.images.default_quality, 82);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "this is not valid toml [[[").unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<Config, _> = toml::from_str("[rewrite]\nenabeld = true\n");
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_preset_key_rejected() {
        let result: Result<Config, _> = toml::from_str("[presets.a]\nmaxwidth = 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_loading_mode_rejected() {
        let result: Result<Config, _> = toml::from_str("[defaults]\nloading = \"sometimes\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[images]\ndefault_quality = 82\nurl_prefix = \"images\"\n").unwrap();
        let overlay: toml::Value = toml::from_str("[images]\ndefault_quality = 70\n").unwrap();
        let merged = merge_toml(base, overlay);
        let images = merged.get("images").unwrap();
        assert_eq!(images.get("default_quality").unwrap().as_integer(), Some(70));
        assert_eq!(images.get("url_prefix").unwrap().as_str(), Some("images"));
    }

    #[test]
    fn merge_toml_replaces_arrays_wholesale() {
        let base: toml::Value = toml::from_str("list = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("list = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("list").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_range() {
        let mut config = Config::default();
        config.images.default_quality = 0;
        assert!(config.validate().is_err());
        config.images.default_quality = 101;
        assert!(config.validate().unwrap_err().to_string().contains("default_quality"));
        config.images.default_quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_zero_max_width() {
        let mut config = Config::default();
        config.defaults.max_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_density_must_be_positive() {
        let mut config = Config::default();
        config.defaults.density_set = vec![Density {
            density: 0.0,
            quality: 80,
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_preset_ratio() {
        let mut config = Config::default();
        config.presets.insert(
            "bad".into(),
            PresetConfig {
                ratio: Some(-1.0),
                ..PresetConfig::default()
            },
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("presets.bad.ratio"));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[defaults]\ndensity_set = [{ density = 1, quality = 200 }]\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.defaults.max_width, 1920);
        assert_eq!(config.defaults.loading, LoadingMode::None);
        assert_eq!(config.defaults.density_set, Config::default().defaults.density_set);
        assert_eq!(config.rewrite.excluded_folders, vec!["/themes/", "/images/"]);
        assert_eq!(config.missing.fallback, MissingFallback::Empty);
        assert_eq!(config.images.cache_dir, PathBuf::from("cache/images"));
        assert!(config.presets.is_empty());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        for section in ["defaults", "rewrite", "missing", "images", "processing"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }
}

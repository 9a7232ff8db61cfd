//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, relative to the project root
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Script bundle filename
    #[serde(default = "default_bundle_filename")]
    pub filename: String,

    /// Wipe the output directory before writing
    #[serde(default = "default_true")]
    pub clean: bool,

    /// Prefix for asset URLs exported to scripts
    #[serde(default)]
    pub public_path: String,

    /// Generate manifest.json
    #[serde(default)]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename: default_bundle_filename(),
            clean: true,
            public_path: String::new(),
            manifest: false,
        }
    }
}

fn default_output_dir() -> String {
    "static".to_string()
}

fn default_bundle_filename() -> String {
    "bundle.js".to_string()
}

fn default_true() -> bool {
    true
}

/// A processing step of a stylesheet rule.
///
/// Steps are listed in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderKind {
    /// Compile SCSS to CSS
    Sass,
    /// Inline imports, resolve `url()` references, validate
    Css,
    /// Hand the result to the extract-css plugin
    Extract,
}

/// Asset rule output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Output filename template (`[name]`, `[ext]`, `[hash]`, `[hash:N]`)
    #[serde(default = "default_asset_filename")]
    pub filename: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            filename: default_asset_filename(),
        }
    }
}

fn default_asset_filename() -> String {
    "assets/[name][ext]".to_string()
}

/// A file classification rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// File extensions this rule applies to, without the dot
    pub test: Vec<String>,

    /// Processing steps for stylesheet rules
    #[serde(rename = "use", default, skip_serializing_if = "Vec::is_empty")]
    pub loaders: Vec<LoaderKind>,

    /// Set for rules that copy files as assets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetConfig>,
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PluginConfig {
    /// Collect stylesheet output into a single file
    ExtractCss {
        #[serde(default = "default_css_filename")]
        filename: String,
    },

    /// Copy static files into the output directory
    Copy { patterns: Vec<CopyPattern> },
}

fn default_css_filename() -> String {
    "styles.css".to_string()
}

/// One source/destination pair of the copy plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyPattern {
    /// Source file or directory, relative to the project root
    pub from: String,

    /// Destination, relative to the output directory
    #[serde(default)]
    pub to: String,

    /// Skip silently when `from` does not exist
    #[serde(default)]
    pub optional: bool,

    /// Globs (relative to `from`) that are not copied
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinimizerKind {
    Css,
}

/// Optimization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Run minimizers at all
    #[serde(default = "default_true")]
    pub minimize: bool,

    #[serde(default = "default_minimizers")]
    pub minimizer: Vec<MinimizerKind>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            minimize: true,
            minimizer: default_minimizers(),
        }
    }
}

fn default_minimizers() -> Vec<MinimizerKind> {
    vec![MinimizerKind::Css]
}

/// Size warnings for emitted artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default)]
    pub hints: bool,

    /// Artifact size in bytes above which a hint is logged
    #[serde(default = "default_max_asset_size")]
    pub max_asset_size: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            hints: false,
            max_asset_size: default_max_asset_size(),
        }
    }
}

fn default_max_asset_size() -> u64 {
    250_000
}

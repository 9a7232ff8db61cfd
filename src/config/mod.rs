//! Configuration handling for assetpack
//!
//! Parses and validates assetpack.toml configuration files.

mod schema;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BuildError;

pub use schema::*;

/// Name of the configuration file looked up by default
pub const DEFAULT_CONFIG_FILE: &str = "assetpack.toml";

/// The configuration written by `assetpack init`. Parses to the same
/// values as [`Config::default_config`].
pub const DEFAULT_CONFIG_TOML: &str = r#"# assetpack configuration
entry = "frontend/index.js"

[output]
dir = "static"
filename = "bundle.js"
clean = true

# Process CSS files
[[rules]]
test = ["css"]
use = ["css", "extract"]

# Process SCSS files
[[rules]]
test = ["scss"]
use = ["sass", "css", "extract"]

# Handle fonts and images
[[rules]]
test = ["woff", "woff2", "eot", "ttf", "otf", "svg", "png", "jpg", "gif"]
asset = { filename = "assets/[name][ext]" }

[[plugins]]
kind = "extract-css"
filename = "styles.css"

[[plugins]]
kind = "copy"
patterns = [{ from = "frontend/assets/buttons", to = "buttons", optional = true }]

[optimization]
minimizer = ["css"]

[performance]
hints = false
"#;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Entry module, relative to the project root
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// File classification rules, tested in order
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,

    /// Post-processing plugins, run in order
    #[serde(default = "default_plugins")]
    pub plugins: Vec<PluginConfig>,

    #[serde(default)]
    pub optimization: OptimizationConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

fn default_entry() -> String {
    "frontend/index.js".to_string()
}

fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            test: vec!["css".to_string()],
            loaders: vec![LoaderKind::Css, LoaderKind::Extract],
            asset: None,
        },
        RuleConfig {
            test: vec!["scss".to_string()],
            loaders: vec![LoaderKind::Sass, LoaderKind::Css, LoaderKind::Extract],
            asset: None,
        },
        RuleConfig {
            test: ["woff", "woff2", "eot", "ttf", "otf", "svg", "png", "jpg", "gif"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            loaders: Vec::new(),
            asset: Some(AssetConfig::default()),
        },
    ]
}

fn default_plugins() -> Vec<PluginConfig> {
    vec![
        PluginConfig::ExtractCss {
            filename: "styles.css".to_string(),
        },
        PluginConfig::Copy {
            patterns: vec![CopyPattern {
                from: "frontend/assets/buttons".to_string(),
                to: "buttons".to_string(),
                optional: true,
                ignore: Vec::new(),
            }],
        },
    ]
}

impl Config {
    /// Load the configuration named on the command line.
    ///
    /// Without an explicit path, `assetpack.toml` in the current directory
    /// is used if present, otherwise the built-in defaults rooted there.
    pub fn discover(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let cwd = std::env::current_dir()?;
        let default_path = cwd.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            return Self::load(default_path);
        }

        info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        let mut config = Self::default_config();
        config.root = cwd;
        Ok(config)
    }

    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::from_toml(&content, root)
            .with_context(|| format!("Failed to load {}", canonical_path.display()))
    }

    /// Parse and validate configuration text for a project rooted at `root`
    pub fn from_toml(content: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.root = root.into();
        config.validate()?;
        Ok(config)
    }

    /// Create the default configuration
    pub fn default_config() -> Self {
        Self {
            entry: default_entry(),
            output: OutputConfig::default(),
            rules: default_rules(),
            plugins: default_plugins(),
            optimization: OptimizationConfig::default(),
            performance: PerformanceConfig::default(),
            root: PathBuf::from("."),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.entry.trim().is_empty() {
            return Err(invalid("entry must not be empty"));
        }
        if self.output.filename.trim().is_empty() {
            return Err(invalid("output.filename must not be empty"));
        }

        let mut owners: HashMap<String, usize> = HashMap::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.test.is_empty() {
                return Err(invalid(format!("rule #{} has no extensions", index + 1)));
            }
            for ext in &rule.test {
                let ext = normalize_extension(ext);
                if let Some(other) = owners.insert(ext.clone(), index) {
                    return Err(invalid(format!(
                        "extension '{}' is claimed by rule #{} and rule #{}",
                        ext,
                        other + 1,
                        index + 1
                    )));
                }
            }

            match (&rule.asset, rule.loaders.is_empty()) {
                (Some(_), false) => {
                    return Err(invalid(format!(
                        "rule #{} declares both `use` and `asset`",
                        index + 1
                    )))
                }
                (None, true) => {
                    return Err(invalid(format!(
                        "rule #{} declares neither `use` nor `asset`",
                        index + 1
                    )))
                }
                (Some(asset), true) if asset.filename.trim().is_empty() => {
                    return Err(invalid(format!("rule #{} has an empty asset filename", index + 1)))
                }
                _ => {}
            }

            if !rule.loaders.is_empty() {
                let ordered = rule.loaders.windows(2).all(|w| w[0] < w[1]);
                if !ordered
                    || !rule.loaders.contains(&LoaderKind::Css)
                    || !rule.loaders.contains(&LoaderKind::Extract)
                {
                    return Err(invalid(format!(
                        "rule #{} must list steps as [\"sass\"?, \"css\", \"extract\"]",
                        index + 1
                    )));
                }
            }
        }

        let extract_plugins = self
            .plugins
            .iter()
            .filter(|p| matches!(p, PluginConfig::ExtractCss { .. }))
            .count();
        if extract_plugins > 1 {
            return Err(invalid("only one extract-css plugin may be configured"));
        }
        let uses_extract = self
            .rules
            .iter()
            .any(|r| r.loaders.contains(&LoaderKind::Extract));
        if uses_extract && extract_plugins == 0 {
            return Err(invalid(
                "a rule uses the `extract` step but no extract-css plugin is configured",
            ));
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Get the absolute entry path
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }

    /// Output name of the extracted stylesheet, if extraction is configured
    pub fn extracted_css_filename(&self) -> Option<&str> {
        self.plugins.iter().find_map(|p| match p {
            PluginConfig::ExtractCss { filename } => Some(filename.as_str()),
            _ => None,
        })
    }

    /// Directories the project reads from, for file watching
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(parent) = self.entry_path().parent() {
            roots.push(parent.to_path_buf());
        }
        for plugin in &self.plugins {
            if let PluginConfig::Copy { patterns } = plugin {
                for pattern in patterns {
                    let from = self.root.join(&pattern.from);
                    if from.exists() && !roots.iter().any(|r| from.starts_with(r)) {
                        roots.push(from);
                    }
                }
            }
        }
        roots
    }
}

/// Lower-case an extension and strip a leading dot
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    BuildError::InvalidConfig(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Config> {
        Config::from_toml(content, "/project")
    }

    #[test]
    fn test_default_toml_matches_default_config() {
        let parsed = parse(DEFAULT_CONFIG_TOML).unwrap();
        let built = Config::default_config();

        assert_eq!(parsed.entry, built.entry);
        assert_eq!(parsed.output.dir, "static");
        assert_eq!(parsed.output.filename, "bundle.js");
        assert!(parsed.output.clean);
        assert_eq!(parsed.rules.len(), built.rules.len());
        for (a, b) in parsed.rules.iter().zip(&built.rules) {
            assert_eq!(a.test, b.test);
            assert_eq!(a.loaders, b.loaders);
        }
        assert_eq!(parsed.extracted_css_filename(), Some("styles.css"));
        assert!(built.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.entry, "frontend/index.js");
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.output_dir(), PathBuf::from("/project/static"));
        assert!(config.optimization.minimize);
    }

    #[test]
    fn test_overlapping_extensions_rejected() {
        let err = parse(
            r#"
            [[rules]]
            test = ["css"]
            use = ["css", "extract"]

            [[rules]]
            test = [".CSS"]
            asset = {}
            "#,
        )
        .unwrap_err();

        let kind = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(kind, BuildError::InvalidConfig(msg) if msg.contains("'css'")));
    }

    #[test]
    fn test_steps_out_of_order_rejected() {
        let err = parse(
            r#"
            [[rules]]
            test = ["scss"]
            use = ["css", "sass", "extract"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_extract_without_plugin_rejected() {
        let err = parse(
            r#"
            plugins = []

            [[rules]]
            test = ["css"]
            use = ["css", "extract"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("extract-css"));
    }

    #[test]
    fn test_rule_with_both_kinds_rejected() {
        let err = parse(
            r#"
            [[rules]]
            test = ["png"]
            use = ["css", "extract"]
            asset = { filename = "img/[name][ext]" }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join(DEFAULT_CONFIG_FILE);
        let missing = missing.to_str().unwrap();

        assert!(Config::load(missing).is_err());
        let err = Config::discover(Some(missing)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_discover_loads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "entry = \"web/main.js\"\n").unwrap();

        let config = Config::discover(path.to_str()).unwrap();
        assert_eq!(config.entry, "web/main.js");
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_watch_roots() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("frontend/assets/buttons")).unwrap();
        fs::create_dir_all(root.join("public")).unwrap();

        let mut config = parse(
            r#"
            [[plugins]]
            kind = "extract-css"

            [[plugins]]
            kind = "copy"
            patterns = [
                { from = "frontend/assets/buttons", to = "buttons" },
                { from = "public" },
                { from = "vendor", optional = true },
            ]
            "#,
        )
        .unwrap();
        config.root = root.to_path_buf();

        assert_eq!(
            config.watch_roots(),
            vec![root.join("frontend"), root.join("public")]
        );
    }

    #[test]
    fn test_copy_plugin_parses() {
        let config = parse(
            r#"
            [[plugins]]
            kind = "extract-css"
            filename = "css/app.css"

            [[plugins]]
            kind = "copy"
            patterns = [{ from = "public", ignore = ["*.md"] }]
            "#,
        )
        .unwrap();

        assert_eq!(config.extracted_css_filename(), Some("css/app.css"));
        match &config.plugins[1] {
            PluginConfig::Copy { patterns } => {
                assert_eq!(patterns[0].from, "public");
                assert_eq!(patterns[0].to, "");
                assert!(!patterns[0].optional);
                assert_eq!(patterns[0].ignore, vec!["*.md".to_string()]);
            }
            other => panic!("unexpected plugin {:?}", other),
        }
    }
}

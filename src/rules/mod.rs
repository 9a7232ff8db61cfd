//! Rule matching
//!
//! Classifies every file reached from the entry by its extension. Rules
//! are tested in declared order and the first match decides how the file
//! is processed. Scripts and JSON are understood natively when no rule
//! claims them.

use std::path::Path;

use crate::bundler::ModuleType;
use crate::config::{normalize_extension, RuleConfig};
use crate::error::BuildError;

/// Extensions handled without a rule
const NATIVE_SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs"];

#[derive(Debug, Clone)]
struct CompiledRule {
    extensions: Vec<String>,
    module_type: ModuleType,
}

/// The ordered rule list of a build
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn from_config(rules: &[RuleConfig]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                extensions: rule.test.iter().map(|e| normalize_extension(e)).collect(),
                module_type: match &rule.asset {
                    Some(asset) => ModuleType::Asset {
                        filename: asset.filename.clone(),
                    },
                    None => ModuleType::Stylesheet {
                        loaders: rule.loaders.clone(),
                    },
                },
            })
            .collect();

        Self { rules }
    }

    /// The first rule whose extensions contain the path's extension
    pub fn match_rule(&self, path: &Path) -> Option<&ModuleType> {
        let ext = extension_of(path)?;
        self.rules
            .iter()
            .find(|rule| rule.extensions.iter().any(|e| *e == ext))
            .map(|rule| &rule.module_type)
    }

    /// Decide how a file is processed
    pub fn classify(&self, path: &Path) -> Result<ModuleType, BuildError> {
        if let Some(module_type) = self.match_rule(path) {
            return Ok(module_type.clone());
        }

        match extension_of(path).as_deref() {
            Some(ext) if NATIVE_SCRIPT_EXTENSIONS.contains(&ext) => Ok(ModuleType::Script),
            Some("json") => Ok(ModuleType::Json),
            _ => Err(BuildError::NoMatchingRule(path.to_path_buf())),
        }
    }

    /// Output filename template for a file matched by an asset rule
    pub fn asset_template(&self, path: &Path) -> Option<&str> {
        match self.match_rule(path)? {
            ModuleType::Asset { filename } => Some(filename.as_str()),
            _ => None,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LoaderKind};

    fn default_rules() -> RuleSet {
        RuleSet::from_config(&Config::default_config().rules)
    }

    #[test]
    fn test_stylesheets_route_to_extraction() {
        let rules = default_rules();

        for file in ["a.css", "b.scss", "C.SCSS"] {
            match rules.classify(Path::new(file)).unwrap() {
                ModuleType::Stylesheet { loaders } => {
                    assert_eq!(loaders.last(), Some(&LoaderKind::Extract));
                    assert!(loaders.contains(&LoaderKind::Css));
                }
                other => panic!("{} classified as {:?}", file, other),
            }
        }

        match rules.classify(Path::new("main.scss")).unwrap() {
            ModuleType::Stylesheet { loaders } => assert_eq!(loaders[0], LoaderKind::Sass),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fonts_and_images_are_assets() {
        let rules = default_rules();

        for ext in ["woff", "woff2", "eot", "ttf", "otf", "svg", "png", "jpg", "gif", "PNG"] {
            let path = format!("icons/file.{}", ext);
            assert_eq!(
                rules.asset_template(Path::new(&path)),
                Some("assets/[name][ext]"),
                "extension {}",
                ext
            );
        }
    }

    #[test]
    fn test_native_modules() {
        let rules = default_rules();
        assert_eq!(rules.classify(Path::new("index.js")).unwrap(), ModuleType::Script);
        assert_eq!(rules.classify(Path::new("lib.mjs")).unwrap(), ModuleType::Script);
        assert_eq!(rules.classify(Path::new("data.json")).unwrap(), ModuleType::Json);
    }

    #[test]
    fn test_unmatched_file_is_an_error() {
        let rules = default_rules();
        let err = rules.classify(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, BuildError::NoMatchingRule(_)));
        assert!(rules.classify(Path::new("Makefile")).is_err());
    }

    #[test]
    fn test_first_rule_wins() {
        let config = Config::from_toml(
            r#"
            [[rules]]
            test = ["svg"]
            asset = { filename = "icons/[name][ext]" }

            [[rules]]
            test = ["png"]
            asset = {}
            "#,
            "/",
        )
        .unwrap();
        let rules = RuleSet::from_config(&config.rules);

        assert_eq!(rules.asset_template(Path::new("x.svg")), Some("icons/[name][ext]"));
        assert_eq!(rules.asset_template(Path::new("x.png")), Some("assets/[name][ext]"));
        assert!(rules.classify(Path::new("x.css")).is_err());
    }
}

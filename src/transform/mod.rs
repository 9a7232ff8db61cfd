//! Module transformation
//!
//! Runs each module through the processing chain its rule declares:
//! SCSS compilation, the CSS step, asset naming, and script import
//! rewriting.

pub mod asset;
pub mod css;
pub mod sass;
pub mod script;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::bundler::ModuleOutput;
use crate::config::{Config, LoaderKind};
use crate::resolver::Resolver;
use crate::rules::RuleSet;

pub use css::StylesheetOutput;

/// Applies rule processing chains to modules
pub struct Transformer {
    /// Project configuration
    config: Arc<Config>,

    resolver: Resolver,

    rules: RuleSet,

    /// SCSS load paths beyond the importing file's directory
    load_paths: Vec<PathBuf>,
}

impl Transformer {
    /// Create a new transformer
    pub fn new(config: Arc<Config>) -> Self {
        let rules = RuleSet::from_config(&config.rules);
        let load_paths = vec![config.root.join("node_modules")];

        Self {
            config,
            resolver: Resolver::new(),
            rules,
            load_paths,
        }
    }

    /// Run a stylesheet through its steps, up to extraction
    pub fn transform_stylesheet(
        &self,
        source: &str,
        path: &Path,
        loaders: &[LoaderKind],
    ) -> Result<StylesheetOutput> {
        let css = if loaders.contains(&LoaderKind::Sass) {
            sass::compile(path, &self.load_paths)?
        } else {
            source.to_string()
        };

        let stylesheet_dir = self
            .config
            .extracted_css_filename()
            .and_then(|name| Path::new(name).parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let ctx = css::CssContext {
            resolver: &self.resolver,
            rules: &self.rules,
            stylesheet_dir,
            load_paths: &self.load_paths,
        };

        css::process(&css, path, &ctx)
    }

    /// Read an asset and name it from its rule's template
    pub fn transform_asset(&self, path: &Path, template: &str) -> Result<ModuleOutput> {
        debug!("Emitting asset: {}", path.display());

        let content =
            fs::read(path).with_context(|| format!("Failed to read asset: {}", path.display()))?;
        let name = asset::render_name(template, path, &content);

        Ok(ModuleOutput::Asset { name, content })
    }

    /// Check JSON and keep it for the bundle
    pub fn transform_json(&self, source: &str, path: &Path) -> Result<ModuleOutput> {
        let value: serde_json::Value = serde_json::from_str(source)
            .with_context(|| format!("Failed to parse JSON module: {}", path.display()))?;
        Ok(ModuleOutput::Json(value.to_string()))
    }

    /// Rewrite a script's imports to bundle ids
    pub fn transform_script(
        &self,
        source: &str,
        path: &Path,
        ids: &HashMap<String, String>,
    ) -> Result<ModuleOutput> {
        debug!("Transforming script: {}", path.display());
        Ok(ModuleOutput::Script(script::rewrite_imports(source, path, ids)?))
    }
}

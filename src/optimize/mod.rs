//! Minimizers applied to emitted artifacts
//!
//! Each minimizer claims artifacts by output name and replaces their
//! content. Scripts are left alone: the only minimizer is for CSS.

use std::path::PathBuf;

use anyhow::Result;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use tracing::debug;

use crate::bundler::Compilation;
use crate::config::{MinimizerKind, OptimizationConfig};
use crate::error::BuildError;

/// A post-processing step that shrinks an artifact without changing its
/// behavior
pub trait Minimizer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this minimizer handles the artifact `name`
    fn test(&self, name: &str) -> bool;

    fn minimize(&self, name: &str, content: &[u8]) -> Result<Vec<u8>, BuildError>;
}

/// CSS minimizer backed by lightningcss
pub struct CssMinimizer;

impl Minimizer for CssMinimizer {
    fn name(&self) -> &str {
        "css"
    }

    fn test(&self, name: &str) -> bool {
        name.to_ascii_lowercase().ends_with(".css")
    }

    fn minimize(&self, name: &str, content: &[u8]) -> Result<Vec<u8>, BuildError> {
        let failed = |message: String| BuildError::Stylesheet {
            path: PathBuf::from(name),
            message,
        };

        let source = String::from_utf8_lossy(content);
        let mut stylesheet = StyleSheet::parse(
            &source,
            ParserOptions {
                filename: name.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| failed(e.to_string()))?;

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| failed(e.to_string()))?;

        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(|e| failed(e.to_string()))?;

        Ok(result.code.into_bytes())
    }
}

/// The minimizers of a build
pub struct Optimizer {
    minimizers: Vec<Box<dyn Minimizer>>,
}

impl Optimizer {
    pub fn from_config(config: &OptimizationConfig) -> Self {
        let minimizers = if config.minimize {
            config
                .minimizer
                .iter()
                .map(|kind| match kind {
                    MinimizerKind::Css => Box::new(CssMinimizer) as Box<dyn Minimizer>,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self { minimizers }
    }

    /// Minimize every artifact a minimizer claims
    pub fn run(&self, compilation: &mut Compilation) -> Result<()> {
        for minimizer in &self.minimizers {
            for name in compilation.names() {
                if compilation.is_copied(&name) || !minimizer.test(&name) {
                    continue;
                }
                let Some(content) = compilation.get(&name) else {
                    continue;
                };

                let before = content.len();
                let minimized = minimizer.minimize(&name, content)?;
                debug!(
                    "Minimized {} with {}: {} -> {} bytes",
                    name,
                    minimizer.name(),
                    before,
                    minimized.len()
                );
                compilation.update(&name, minimized);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.minimizers.is_empty()
    }
}

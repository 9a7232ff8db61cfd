//! Plugin system for assetpack
//!
//! Plugins run after every module has been processed and may add or
//! change artifacts in the compilation before minimizers run.

mod copy;
mod extract_css;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::bundler::Compilation;
use crate::config::{Config, PluginConfig};

pub use copy::CopyPlugin;
pub use extract_css::ExtractCssPlugin;

/// Plugin hook context
pub struct PluginContext {
    /// Project root directory
    pub root: PathBuf,
}

/// Plugin trait - implement this to create an assetpack plugin
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and debugging
    fn name(&self) -> &str;

    /// Called before the module graph is built
    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Add or change artifacts once all modules are processed
    async fn process_assets(
        &self,
        _compilation: &mut Compilation,
        _ctx: &PluginContext,
    ) -> Result<()> {
        Ok(())
    }
}

/// Plugin manager
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    context: PluginContext,
}

impl PluginManager {
    /// Create a new plugin manager
    pub fn new(root: PathBuf) -> Self {
        Self {
            plugins: Vec::new(),
            context: PluginContext { root },
        }
    }

    /// Create a manager holding the plugins the configuration declares
    pub fn from_config(config: &Config) -> Self {
        let mut manager = Self::new(config.root.clone());

        for plugin in &config.plugins {
            match plugin {
                PluginConfig::ExtractCss { filename } => {
                    manager.register(Arc::new(ExtractCssPlugin::new(filename.clone())))
                }
                PluginConfig::Copy { patterns } => {
                    manager.register(Arc::new(CopyPlugin::new(patterns.clone())))
                }
            }
        }

        manager
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Run build_start hooks
    pub async fn run_build_start(&self) -> Result<()> {
        for plugin in &self.plugins {
            plugin.build_start(&self.context).await?;
        }
        Ok(())
    }

    /// Run process_assets hooks in registration order
    pub async fn run_process_assets(&self, compilation: &mut Compilation) -> Result<()> {
        for plugin in &self.plugins {
            debug!("Running plugin: {}", plugin.name());
            plugin.process_assets(compilation, &self.context).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Banner;

    #[async_trait]
    impl Plugin for Banner {
        fn name(&self) -> &str {
            "banner"
        }

        async fn process_assets(
            &self,
            compilation: &mut Compilation,
            _ctx: &PluginContext,
        ) -> Result<()> {
            compilation.emit("BANNER.txt", b"built".to_vec())?;
            Ok(())
        }
    }

    #[test]
    fn test_from_config_registers_declared_plugins() {
        let manager = PluginManager::from_config(&Config::default_config());
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_custom_plugin_runs() {
        let mut manager = PluginManager::new(PathBuf::from("."));
        manager.register(Arc::new(Banner));

        let mut compilation = Compilation::new();
        manager.run_build_start().await.unwrap();
        manager.run_process_assets(&mut compilation).await.unwrap();

        assert_eq!(compilation.get("BANNER.txt"), Some(&b"built"[..]));
    }
}

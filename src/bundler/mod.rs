//! Core bundler implementation
//!
//! Builds the module graph from the entry, runs every module through its
//! rule, renders the script bundle, hands the compilation to plugins and
//! minimizers, and writes the output directory.

mod compilation;
mod graph;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cli::BuildOptions;
use crate::config::Config;
use crate::error::BuildError;
use crate::optimize::Optimizer;
use crate::plugins::PluginManager;
use crate::resolver::Resolver;
use crate::rules::RuleSet;
use crate::transform::script::REQUIRE_FN;
use crate::transform::Transformer;
use crate::utils::{format_size, is_subpath, module_name};

pub use compilation::{Compilation, PendingStylesheet};
pub use graph::{Module, ModuleGraph, ModuleId, ModuleOutput, ModuleType};

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// Written artifacts, in output name order
    pub assets: Vec<AssetInfo>,

    /// Source name -> output name
    pub manifest: HashMap<String, String>,

    /// Directory the artifacts were written to
    pub output_dir: PathBuf,
}

/// Information about a written artifact
#[derive(Debug)]
pub struct AssetInfo {
    /// Output file path
    pub output_path: PathBuf,

    /// Size in bytes
    pub size: usize,
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Arc<Config>,

    /// Build options
    options: BuildOptions,

    /// Canonical project root
    root: PathBuf,

    /// Module resolver
    resolver: Resolver,

    rules: RuleSet,

    transformer: Transformer,

    plugins: PluginManager,

    optimizer: Optimizer,

    /// Module graph
    graph: Arc<RwLock<ModuleGraph>>,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(config: Config, options: BuildOptions) -> Result<Self> {
        let root = fs::canonicalize(&config.root)
            .with_context(|| format!("Project root does not exist: {}", config.root.display()))?;
        let config = Arc::new(Config { root: root.clone(), ..config });

        Ok(Self {
            resolver: Resolver::new(),
            rules: RuleSet::from_config(&config.rules),
            transformer: Transformer::new(config.clone()),
            plugins: PluginManager::from_config(&config),
            optimizer: Optimizer::from_config(&config.optimization),
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
            root,
            options,
            config,
        })
    }

    /// Directory the build writes to
    pub fn output_dir(&self) -> PathBuf {
        match &self.options.outdir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => std::env::current_dir()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|_| dir.clone()),
            None => self.config.output_dir(),
        }
    }

    /// Build the project
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();
        *self.graph.write() = ModuleGraph::new();

        self.plugins.run_build_start().await?;

        let entry = self.config.entry_path();
        if !entry.is_file() {
            return Err(BuildError::EntryNotFound(entry).into());
        }

        // 1. Build the module graph, running stylesheet and asset rules
        info!("Building module graph...");
        let entry_id = self.process_module(&entry, true).await?;

        // 2. Rewrite script imports now that every module has an id
        info!("Transforming scripts...");
        self.transform_scripts(entry_id)?;

        // 3. Render the bundle and collect artifacts
        info!("Rendering bundle...");
        let mut compilation = self.render(entry_id)?;

        // 4. Plugins and minimizers
        info!("Processing assets...");
        self.plugins.run_process_assets(&mut compilation).await?;
        if self.options.minify {
            self.optimizer.run(&mut compilation)?;
        }

        if self.config.output.manifest {
            let manifest = serde_json::to_vec_pretty(&compilation.manifest)?;
            compilation.emit("manifest.json", manifest)?;
        }

        self.report_performance(&compilation);

        // 5. Write output
        info!("Writing output...");
        let output_dir = self.output_dir();
        let assets = self.emit(&compilation, &output_dir)?;

        debug!("Build completed in {:?}", start.elapsed());

        Ok(BuildResult {
            assets,
            manifest: compilation.manifest.into_iter().collect(),
            output_dir,
        })
    }

    /// Process a single module and its dependencies
    ///
    /// Uses Box::pin for async recursion to avoid infinite type size issues
    async fn process_module(&self, path: &Path, is_entry: bool) -> Result<ModuleId> {
        let canonical_path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve module path: {}", path.display()))?;

        // Check if already processed
        {
            let graph = self.graph.read();
            if let Some(id) = graph.get_module_id(&canonical_path) {
                return Ok(id);
            }
        }

        let module_type = self.rules.classify(&canonical_path)?;
        let source = match module_type {
            ModuleType::Asset { .. } => String::new(),
            _ => fs::read_to_string(&canonical_path)
                .with_context(|| format!("Failed to read module: {}", canonical_path.display()))?,
        };

        debug!("Processing {}", canonical_path.display());

        // Rules run before dependencies are known: a stylesheet's
        // dependencies are the files its url() references point at
        let mut dependencies: Vec<(Option<String>, PathBuf)> = Vec::new();
        let output = match &module_type {
            ModuleType::Script => {
                for specifier in self.resolver.extract_dependencies(&source, &module_type) {
                    let resolved = self.resolver.resolve(&specifier, &canonical_path)?;
                    dependencies.push((Some(specifier), resolved));
                }
                None
            }
            ModuleType::Json => Some(self.transformer.transform_json(&source, &canonical_path)?),
            ModuleType::Stylesheet { loaders } => {
                let out = self
                    .transformer
                    .transform_stylesheet(&source, &canonical_path, loaders)?;
                dependencies.extend(out.assets.into_iter().map(|asset| (None, asset)));
                Some(ModuleOutput::Stylesheet {
                    css: out.css,
                    imports: out.imports,
                })
            }
            ModuleType::Asset { filename } => {
                Some(self.transformer.transform_asset(&canonical_path, filename)?)
            }
        };

        let mut module = Module::new(
            canonical_path.clone(),
            module_name(&self.root, &canonical_path),
            source,
            module_type,
        );
        module.is_entry = is_entry;
        module.output = output;

        let module_id = {
            let mut graph = self.graph.write();
            graph.add_module(module)
        };

        // Process dependencies recursively (Box::pin needed for async recursion)
        for (specifier, dep_path) in dependencies {
            let dep_id = Box::pin(self.process_module(&dep_path, false)).await?;

            let mut graph = self.graph.write();
            graph.add_dependency(module_id, dep_id);
            if let (Some(specifier), Some(module)) = (specifier, graph.get_module_mut(module_id)) {
                module.resolved.push((specifier, dep_id));
            }
        }

        Ok(module_id)
    }

    /// Rewrite every script's imports to the ids of the modules they reach
    fn transform_scripts(&self, entry_id: ModuleId) -> Result<()> {
        let script_ids: Vec<ModuleId> = {
            let graph = self.graph.read();
            graph
                .ordered_modules(entry_id)
                .into_iter()
                .filter(|id| {
                    graph
                        .get_module(*id)
                        .is_some_and(|m| m.module_type.is_script())
                })
                .collect()
        };

        for id in script_ids {
            let (source, path, ids) = {
                let graph = self.graph.read();
                let Some(module) = graph.get_module(id) else {
                    continue;
                };
                let ids: HashMap<String, String> = module
                    .resolved
                    .iter()
                    .filter_map(|(specifier, dep)| {
                        graph
                            .get_module(*dep)
                            .map(|d| (specifier.clone(), d.name.clone()))
                    })
                    .collect();
                (module.source.clone(), module.path.clone(), ids)
            };

            let transformed = self.transformer.transform_script(&source, &path, &ids)?;

            if let Some(module) = self.graph.write().get_module_mut(id) {
                module.output = Some(transformed);
            }
        }

        Ok(())
    }

    /// Render the script bundle and collect assets and stylesheets
    fn render(&self, entry_id: ModuleId) -> Result<Compilation> {
        let graph = self.graph.read();
        let mut compilation = Compilation::new();

        let mut bundle = String::from(RUNTIME_HEADER);

        for id in graph.ordered_modules(entry_id) {
            let Some(module) = graph.get_module(id) else {
                continue;
            };

            let body = match &module.output {
                Some(ModuleOutput::Script(code)) => code.clone(),
                Some(ModuleOutput::Json(json)) => format!("module.exports = {};", json),
                Some(ModuleOutput::Stylesheet { css, imports }) => {
                    compilation.stylesheets.push(PendingStylesheet {
                        module: module.name.clone(),
                        css: css.clone(),
                        imports: imports.clone(),
                    });
                    "// extracted by assetpack".to_string()
                }
                Some(ModuleOutput::Asset { name, content }) => {
                    compilation.emit(name.clone(), content.clone())?;
                    compilation.record(module.name.clone(), name.clone());
                    let url = format!("{}{}", self.config.output.public_path, name);
                    format!("module.exports = {};", Value::String(url))
                }
                None => continue,
            };

            let _ = write!(
                bundle,
                "\n  // Module: {name}\n  __assetpack_modules__[{id}] = function (module, exports) {{\n{body}\n  }};\n",
                name = module.name,
                id = Value::String(module.name.clone()),
                body = indent(&body),
            );
        }

        let entry_name = graph
            .get_module(entry_id)
            .map(|m| m.name.clone())
            .unwrap_or_default();
        let _ = write!(
            bundle,
            "\n  {}({});\n}})();\n",
            REQUIRE_FN,
            Value::String(entry_name.clone())
        );

        compilation.emit(self.config.output.filename.clone(), bundle.into_bytes())?;
        compilation.record(entry_name, self.config.output.filename.clone());

        Ok(compilation)
    }

    /// Warn about artifacts over the configured size, returning their names
    fn report_performance<'c>(&self, compilation: &'c Compilation) -> Vec<&'c str> {
        let performance = &self.config.performance;
        if !performance.hints {
            return Vec::new();
        }

        let mut oversized = Vec::new();
        for (name, content) in compilation.assets() {
            if content.len() as u64 > performance.max_asset_size {
                oversized.push(name);
                warn!(
                    "Asset size limit: {} ({}) exceeds the recommended limit ({})",
                    name,
                    format_size(content.len()),
                    format_size(performance.max_asset_size as usize)
                );
            }
        }
        oversized
    }

    /// Clear the output directory and write every artifact
    fn emit(&self, compilation: &Compilation, output_dir: &Path) -> Result<Vec<AssetInfo>> {
        if self.config.output.clean && output_dir.exists() {
            if is_subpath(&self.root, output_dir) {
                return Err(BuildError::UnsafeOutputDir(output_dir.to_path_buf()).into());
            }
            debug!("Cleaning {}", output_dir.display());
            fs::remove_dir_all(output_dir)
                .with_context(|| format!("Failed to clean {}", output_dir.display()))?;
        }

        fs::create_dir_all(output_dir).context("Failed to create output directory")?;

        let mut assets = Vec::with_capacity(compilation.len());
        for (name, content) in compilation.assets() {
            let output_path = output_dir.join(name);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&output_path, content)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;

            assets.push(AssetInfo {
                output_path,
                size: content.len(),
            });
        }

        Ok(assets)
    }
}

/// Opening of the bundle: the module registry and require function
const RUNTIME_HEADER: &str = r#"// assetpack runtime
(function () {
  var __assetpack_modules__ = {};
  var __assetpack_cache__ = {};

  function __assetpack_require__(moduleId) {
    if (__assetpack_cache__[moduleId]) {
      return __assetpack_cache__[moduleId].exports;
    }

    var module = { exports: {} };
    __assetpack_cache__[moduleId] = module;

    var moduleFn = __assetpack_modules__[moduleId];
    if (!moduleFn) {
      throw new Error("Cannot find module '" + moduleId + "'");
    }
    moduleFn(module, module.exports);

    return module.exports;
  }
"#;

fn indent(code: &str) -> String {
    code.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("    {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options() -> BuildOptions {
        BuildOptions {
            outdir: None,
            minify: true,
        }
    }

    fn project(files: &[(&str, &str)]) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut config = Config::default_config();
        config.root = dir.path().to_path_buf();
        (dir, config)
    }

    #[tokio::test]
    async fn test_bundle_registers_modules_and_runs_entry() {
        let (_dir, config) = project(&[
            ("frontend/index.js", "import './util';\nimport logo from './logo.png';\n"),
            ("frontend/util.js", "module.exports = 1;\n"),
            ("frontend/logo.png", "png"),
        ]);
        let bundler = Bundler::new(config, options()).unwrap();
        let result = bundler.build().await.unwrap();

        let bundle = fs::read_to_string(result.output_dir.join("bundle.js")).unwrap();
        assert!(bundle.contains("__assetpack_modules__[\"frontend/index.js\"]"));
        assert!(bundle.contains("__assetpack_modules__[\"frontend/util.js\"]"));
        assert!(bundle.contains("module.exports = \"assets/logo.png\";"));
        assert!(bundle.trim_end().ends_with("__assetpack_require__(\"frontend/index.js\");\n})();"));
        assert!(result.output_dir.join("assets/logo.png").is_file());
        assert!(!result.output_dir.join("styles.css").exists());
    }

    #[tokio::test]
    async fn test_module_without_rule_fails() {
        let (_dir, config) = project(&[
            ("frontend/index.js", "import './notes.txt';\n"),
            ("frontend/notes.txt", "hi"),
        ]);
        let bundler = Bundler::new(config, options()).unwrap();

        let err = bundler.build().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::NoMatchingRule(_))
        ));
    }

    #[tokio::test]
    async fn test_output_dir_containing_root_is_refused() {
        let (dir, mut config) = project(&[("frontend/index.js", "")]);
        config.output.dir = ".".to_string();
        let bundler = Bundler::new(config, options()).unwrap();

        let err = bundler.build().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnsafeOutputDir(_))
        ));
        assert!(dir.path().join("frontend/index.js").exists());
    }

    #[tokio::test]
    async fn test_manifest_written_when_enabled() {
        let (_dir, mut config) = project(&[
            ("frontend/index.js", "import './a.css';\n"),
            ("frontend/a.css", "a { color: blue; }"),
        ]);
        config.output.manifest = true;
        let bundler = Bundler::new(config, options()).unwrap();
        let result = bundler.build().await.unwrap();

        let manifest: HashMap<String, String> = serde_json::from_str(
            &fs::read_to_string(result.output_dir.join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["frontend/a.css"], "styles.css");
        assert_eq!(manifest["frontend/index.js"], "bundle.js");
    }

    #[tokio::test]
    async fn test_performance_hints_warn_without_failing() {
        let (_dir, mut config) = project(&[
            ("frontend/index.js", "import './a.css';\n"),
            ("frontend/a.css", ".a { color: blue; } .b { color: green; }"),
        ]);
        config.performance.hints = true;
        config.performance.max_asset_size = 16;
        let bundler = Bundler::new(config, options()).unwrap();

        let result = bundler.build().await.unwrap();
        assert!(result.output_dir.join("styles.css").is_file());

        let mut compilation = Compilation::new();
        compilation.emit("bundle.js", vec![b'x'; 17]).unwrap();
        compilation.emit("styles.css", vec![b'x'; 16]).unwrap();
        assert_eq!(bundler.report_performance(&compilation), vec!["bundle.js"]);
    }

    #[tokio::test]
    async fn test_hints_disabled_reports_nothing() {
        let (_dir, mut config) = project(&[("frontend/index.js", "")]);
        config.performance.max_asset_size = 1;
        let bundler = Bundler::new(config, options()).unwrap();

        let mut compilation = Compilation::new();
        compilation.emit("bundle.js", vec![b'x'; 64]).unwrap();
        assert!(bundler.report_performance(&compilation).is_empty());
    }

    #[tokio::test]
    async fn test_public_path_prefixes_asset_urls() {
        let (_dir, mut config) = project(&[
            ("frontend/index.js", "import logo from './logo.png';\n"),
            ("frontend/logo.png", "png"),
        ]);
        config.output.public_path = "/static/".to_string();
        let bundler = Bundler::new(config, options()).unwrap();
        let result = bundler.build().await.unwrap();

        let bundle = fs::read_to_string(result.output_dir.join("bundle.js")).unwrap();
        assert!(bundle.contains("module.exports = \"/static/assets/logo.png\";"));
        assert!(result.output_dir.join("assets/logo.png").is_file());
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\n\nb"), "    a\n\n    b");
    }
}

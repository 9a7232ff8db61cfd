//! Module resolution
//!
//! Handles extracting import specifiers from scripts and resolving
//! specifiers to actual file paths, including packages under
//! `node_modules`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::bundler::ModuleType;
use crate::error::BuildError;

/// Regex patterns for extracting imports
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:(?:\w+\s*,\s*)?(?:\{[^}]*\}|\*\s+as\s+\w+|\*|\w+)\s+from\s+)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

/// Extensions tried when a script specifier omits one
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "json"];

/// Condition names accepted in `package.json` `exports`, in priority order
const EXPORT_CONDITIONS: &[&str] = &["style", "import", "default", "require"];

/// Module resolver
#[derive(Debug, Default, Clone)]
pub struct Resolver;

impl Resolver {
    /// Create a new resolver
    pub fn new() -> Self {
        Self
    }

    /// Extract import/require dependencies from script source code
    pub fn extract_dependencies(&self, source: &str, module_type: &ModuleType) -> Vec<String> {
        if !module_type.is_script() {
            return Vec::new();
        }

        let mut dependencies = Vec::new();

        for cap in IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1).or_else(|| cap.get(2)) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        for cap in DYNAMIC_IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Resolve a script import specifier to an absolute file path
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        debug!("Resolving '{}' from '{}'", specifier, importer.display());

        let base_dir = importer.parent().unwrap_or(Path::new("."));

        let resolved = if is_path_like(specifier) {
            self.resolve_relative(specifier, base_dir)
        } else {
            self.resolve_bare(specifier, base_dir)?
        };

        match resolved {
            Some(path) => {
                debug!("Resolved to: {}", path.display());
                Ok(path)
            }
            None => Err(unresolved(specifier, importer)),
        }
    }

    /// Resolve a request made from a stylesheet (`@import` or `url()`).
    ///
    /// Plain requests are relative to the stylesheet, then looked up as
    /// packages when they are not path-like. A leading `~` marks a package
    /// request.
    pub fn resolve_style_request(&self, request: &str, stylesheet: &Path) -> Result<PathBuf> {
        let base_dir = stylesheet.parent().unwrap_or(Path::new("."));

        let resolved = match request.strip_prefix('~') {
            Some(package_request) => self.resolve_bare(package_request, base_dir)?,
            None => {
                let target = base_dir.join(request);
                if target.is_file() {
                    Some(target)
                } else if !is_path_like(request) {
                    self.resolve_bare(request, base_dir)?
                } else {
                    None
                }
            }
        };

        resolved.ok_or_else(|| unresolved(request, stylesheet))
    }

    /// Resolve a relative import
    fn resolve_relative(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        let target = base_dir.join(specifier);

        // Try exact path first
        if target.is_file() {
            return Some(target);
        }

        // Try adding extensions
        for ext in SCRIPT_EXTENSIONS {
            let with_ext = append_extension(&target, ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        // Try as directory with index file
        if target.is_dir() {
            for ext in SCRIPT_EXTENSIONS {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import (from node_modules)
    fn resolve_bare(&self, specifier: &str, base_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current = base_dir.to_path_buf();

        // Walk up directory tree looking for node_modules
        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier)? {
                    return Ok(Some(resolved));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(
        &self,
        node_modules: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>> {
        let (package_name, subpath) = split_package_specifier(specifier);
        let package_dir = node_modules.join(&package_name);

        if !package_dir.is_dir() {
            return Ok(None);
        }

        let package_json = package_dir.join("package.json");
        let manifest: Option<Value> = if package_json.is_file() {
            let content = fs::read_to_string(&package_json)
                .with_context(|| format!("Failed to read {}", package_json.display()))?;
            Some(
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", package_json.display()))?,
            )
        } else {
            None
        };

        let export_key = match &subpath {
            Some(sub) => format!("./{}", sub),
            None => ".".to_string(),
        };

        if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports")) {
            if let Some(target) = resolve_export(exports, &export_key) {
                let path = package_dir.join(target.trim_start_matches("./"));
                if path.is_file() {
                    return Ok(Some(path));
                }
            }
        }

        if let Some(sub) = subpath {
            return Ok(self.resolve_relative(&sub, &package_dir));
        }

        if let Some(manifest) = &manifest {
            for field in ["style", "module", "main"] {
                if let Some(entry) = manifest.get(field).and_then(Value::as_str) {
                    if let Some(path) = self.resolve_relative(entry, &package_dir) {
                        return Ok(Some(path));
                    }
                }
            }
        }

        Ok(self.resolve_relative("index.js", &package_dir))
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/')
}

fn unresolved(specifier: &str, importer: &Path) -> anyhow::Error {
    BuildError::UnresolvedImport {
        specifier: specifier.to_string(),
        importer: importer.to_path_buf(),
    }
    .into()
}

/// `foo.min` + `js` -> `foo.min.js` (unlike `with_extension`)
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Split `@scope/name/sub/path` or `name/sub/path` into name and subpath
fn split_package_specifier(specifier: &str) -> (String, Option<String>) {
    let mut parts = specifier.splitn(if specifier.starts_with('@') { 3 } else { 2 }, '/');
    let name = if specifier.starts_with('@') {
        let scope = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        format!("{}/{}", scope, name)
    } else {
        parts.next().unwrap_or_default().to_string()
    };
    let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (name, subpath)
}

/// Look up `key` (`.` or `./sub`) in a `package.json` `exports` value
fn resolve_export(exports: &Value, key: &str) -> Option<String> {
    let map = match exports {
        Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => map,
        // Sugar: `"exports": "./index.js"` or a bare condition object
        other if key == "." => return pick_condition(other),
        _ => return None,
    };

    if let Some(target) = map.get(key) {
        return pick_condition(target);
    }

    for (pattern, target) in map {
        let Some((prefix, suffix)) = pattern.split_once('*') else {
            continue;
        };
        if key.len() >= prefix.len() + suffix.len()
            && key.starts_with(prefix)
            && key.ends_with(suffix)
        {
            let matched = &key[prefix.len()..key.len() - suffix.len()];
            return pick_condition(target).map(|t| t.replace('*', matched));
        }
    }

    None
}

fn pick_condition(target: &Value) -> Option<String> {
    match target {
        Value::String(path) => Some(path.clone()),
        Value::Object(conditions) => EXPORT_CONDITIONS
            .iter()
            .filter_map(|name| conditions.get(*name))
            .find_map(pick_condition),
        Value::Array(candidates) => candidates.iter().find_map(pick_condition),
        _ => None,
    }
}

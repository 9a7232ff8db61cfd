//! In-memory build output

use std::collections::{BTreeMap, BTreeSet};

use crate::error::BuildError;

/// CSS of one stylesheet module, waiting for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStylesheet {
    /// Module name the CSS came from
    pub module: String,
    pub css: String,
    /// Remote `@import` rules found in the module
    pub imports: Vec<String>,
}

/// Everything a build will write, keyed by output name.
///
/// Output names are relative to the output directory and use `/`
/// separators. Iteration is in name order.
#[derive(Debug, Default)]
pub struct Compilation {
    assets: BTreeMap<String, Vec<u8>>,

    /// Artifacts copied from disk as-is; minimizers leave them alone
    copied: BTreeSet<String>,

    /// Stylesheet modules in graph order
    pub stylesheets: Vec<PendingStylesheet>,

    /// Source name -> output name
    pub manifest: BTreeMap<String, String>,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. Emitting identical content twice under one name is
    /// a no-op; different content is a conflict.
    pub fn emit(&mut self, name: impl Into<String>, content: Vec<u8>) -> Result<(), BuildError> {
        let name = name.into();
        match self.assets.get(&name) {
            Some(existing) if *existing == content => Ok(()),
            Some(_) => Err(BuildError::AssetConflict(name)),
            None => {
                self.assets.insert(name, content);
                Ok(())
            }
        }
    }

    /// Add an artifact that must be written byte for byte
    pub fn emit_copied(&mut self, name: impl Into<String>, content: Vec<u8>) -> Result<(), BuildError> {
        let name = name.into();
        self.emit(name.clone(), content)?;
        self.copied.insert(name);
        Ok(())
    }

    pub fn is_copied(&self, name: &str) -> bool {
        self.copied.contains(name)
    }

    /// Replace the content of an existing artifact
    pub fn update(&mut self, name: &str, content: Vec<u8>) {
        if let Some(existing) = self.assets.get_mut(name) {
            *existing = content;
        }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.assets.iter().map(|(name, content)| (name.as_str(), content.as_slice()))
    }

    pub fn names(&self) -> Vec<String> {
        self.assets.keys().cloned().collect()
    }

    /// Record where a source ended up
    pub fn record(&mut self, source: impl Into<String>, output: impl Into<String>) {
        self.manifest.insert(source.into(), output.into());
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_emits_deduplicate() {
        let mut compilation = Compilation::new();
        compilation.emit("assets/icon.svg", b"<svg/>".to_vec()).unwrap();
        compilation.emit("assets/icon.svg", b"<svg/>".to_vec()).unwrap();

        assert_eq!(compilation.len(), 1);
        assert_eq!(compilation.get("assets/icon.svg"), Some(&b"<svg/>"[..]));
    }

    #[test]
    fn test_conflicting_emit_is_an_error() {
        let mut compilation = Compilation::new();
        compilation.emit("assets/logo.png", b"one".to_vec()).unwrap();

        let err = compilation.emit("assets/logo.png", b"two".to_vec()).unwrap_err();
        assert!(matches!(err, BuildError::AssetConflict(name) if name == "assets/logo.png"));
    }

    #[test]
    fn test_copied_artifacts_are_flagged() {
        let mut compilation = Compilation::new();
        compilation.emit("styles.css", b"a{}".to_vec()).unwrap();
        compilation.emit_copied("buttons/theme.css", b"b {}".to_vec()).unwrap();

        assert!(compilation.is_copied("buttons/theme.css"));
        assert!(!compilation.is_copied("styles.css"));
        assert_eq!(compilation.len(), 2);
    }

    #[test]
    fn test_assets_iterate_in_name_order() {
        let mut compilation = Compilation::new();
        compilation.emit("styles.css", Vec::new()).unwrap();
        compilation.emit("assets/a.woff", Vec::new()).unwrap();
        compilation.emit("bundle.js", Vec::new()).unwrap();

        assert_eq!(
            compilation.names(),
            vec!["assets/a.woff", "bundle.js", "styles.css"]
        );
    }
}

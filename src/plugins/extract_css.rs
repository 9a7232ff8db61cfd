//! Collects every stylesheet module into one CSS file

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{Plugin, PluginContext};
use crate::bundler::Compilation;

pub struct ExtractCssPlugin {
    filename: String,
}

impl ExtractCssPlugin {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

#[async_trait]
impl Plugin for ExtractCssPlugin {
    fn name(&self) -> &str {
        "extract-css"
    }

    async fn process_assets(
        &self,
        compilation: &mut Compilation,
        _ctx: &PluginContext,
    ) -> Result<()> {
        let sheets = std::mem::take(&mut compilation.stylesheets);
        if sheets.is_empty() {
            debug!("No stylesheets reached, skipping {}", self.filename);
            return Ok(());
        }

        // Remote @import rules are only valid before any other rule
        let mut imports: Vec<&str> = Vec::new();
        for import in sheets.iter().flat_map(|s| s.imports.iter()) {
            if !imports.contains(&import.as_str()) {
                imports.push(import);
            }
        }

        let mut css = String::new();
        for import in &imports {
            css.push_str(import);
            css.push('\n');
        }
        for sheet in &sheets {
            css.push_str(sheet.css.trim_end());
            css.push('\n');
        }

        debug!(
            "Extracted {} stylesheet(s) into {}",
            sheets.len(),
            self.filename
        );

        compilation.emit(self.filename.clone(), css.into_bytes())?;
        for sheet in sheets {
            compilation.record(sheet.module, self.filename.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::PendingStylesheet;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn sheet(module: &str, css: &str, imports: &[&str]) -> PendingStylesheet {
        PendingStylesheet {
            module: module.to_string(),
            css: css.to_string(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_stylesheets_concatenated_in_order() {
        let mut compilation = Compilation::new();
        compilation.stylesheets = vec![
            sheet("pure.css", "html { margin: 0; }\n", &[]),
            sheet("icons.css", ".ph { display: inline; }", &["@import url(\"https://cdn/x.css\");"]),
            sheet("main.scss", "body {\n  color: red;\n}\n", &["@import url(\"https://cdn/x.css\");"]),
        ];
        let ctx = PluginContext { root: PathBuf::from(".") };

        ExtractCssPlugin::new("styles.css")
            .process_assets(&mut compilation, &ctx)
            .await
            .unwrap();

        let css = String::from_utf8(compilation.get("styles.css").unwrap().to_vec()).unwrap();
        assert_eq!(
            css,
            "@import url(\"https://cdn/x.css\");\nhtml { margin: 0; }\n.ph { display: inline; }\nbody {\n  color: red;\n}\n"
        );
        assert_eq!(compilation.manifest.get("main.scss").map(String::as_str), Some("styles.css"));
        assert!(compilation.stylesheets.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_emitted_without_stylesheets() {
        let mut compilation = Compilation::new();
        let ctx = PluginContext { root: PathBuf::from(".") };

        ExtractCssPlugin::new("styles.css")
            .process_assets(&mut compilation, &ctx)
            .await
            .unwrap();

        assert!(compilation.is_empty());
    }
}

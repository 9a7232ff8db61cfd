//! Copies static files into the output directory verbatim

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use super::{Plugin, PluginContext};
use crate::bundler::Compilation;
use crate::config::CopyPattern;
use crate::error::BuildError;
use crate::utils::module_name;

pub struct CopyPlugin {
    patterns: Vec<CopyPattern>,
}

impl CopyPlugin {
    pub fn new(patterns: Vec<CopyPattern>) -> Self {
        Self { patterns }
    }

    fn copy_pattern(
        &self,
        pattern: &CopyPattern,
        compilation: &mut Compilation,
        root: &Path,
    ) -> Result<()> {
        let from = root.join(&pattern.from);

        if !from.exists() {
            if pattern.optional {
                debug!("Optional copy source {} is missing, skipping", from.display());
                return Ok(());
            }
            return Err(BuildError::CopySourceMissing(from).into());
        }

        if from.is_file() {
            let file_name = from
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return copy_file(&from, &join_output(&pattern.to, &file_name), compilation, root);
        }

        let ignore = build_globset(&pattern.ignore)?;
        let mut copied = 0usize;

        for entry in WalkDir::new(&from).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", from.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&from)
                .unwrap_or(entry.path());
            if ignore.is_match(relative) {
                debug!("Ignoring {}", entry.path().display());
                continue;
            }

            let relative = relative.display().to_string().replace('\\', "/");
            copy_file(entry.path(), &join_output(&pattern.to, &relative), compilation, root)?;
            copied += 1;
        }

        debug!("Copied {} file(s) from {}", copied, from.display());
        Ok(())
    }
}

fn copy_file(source: &Path, output: &str, compilation: &mut Compilation, root: &Path) -> Result<()> {
    let content =
        fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    compilation.emit_copied(output, content)?;
    compilation.record(module_name(root, source), output);
    Ok(())
}

fn join_output(to: &str, relative: &str) -> String {
    let to = to.trim_matches('/');
    if to.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", to, relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).with_context(|| format!("Invalid ignore pattern: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

#[async_trait]
impl Plugin for CopyPlugin {
    fn name(&self) -> &str {
        "copy"
    }

    /// Fail before any work when a required source is missing
    async fn build_start(&self, ctx: &PluginContext) -> Result<()> {
        for pattern in &self.patterns {
            let from = ctx.root.join(&pattern.from);
            if !pattern.optional && !from.exists() {
                return Err(BuildError::CopySourceMissing(from).into());
            }
        }
        Ok(())
    }

    async fn process_assets(
        &self,
        compilation: &mut Compilation,
        ctx: &PluginContext,
    ) -> Result<()> {
        for pattern in &self.patterns {
            self.copy_pattern(pattern, compilation, &ctx.root)?;
        }
        Ok(())
    }
}

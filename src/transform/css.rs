//! The `css` step
//!
//! Turns one stylesheet into self-contained CSS ready for extraction:
//! local `@import`s are inlined (each file once), `url()` references are
//! resolved against the file that contains them and rewritten to the
//! emitted asset, and the result is checked by the CSS parser.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use super::{asset, sass};
use crate::bundler::ModuleType;
use crate::config::LoaderKind;
use crate::error::BuildError;
use crate::resolver::Resolver;
use crate::rules::RuleSet;
use crate::utils::relative_url;

static IMPORT_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@import\s+(?:url\(\s*(?:"(?P<u1>[^"]*)"|'(?P<u2>[^']*)'|(?P<u3>[^)\s'"]*))\s*\)|"(?P<q1>[^"]*)"|'(?P<q2>[^']*)')(?P<media>[^;]*);"#,
    )
    .unwrap()
});

static URL_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^)\s'"]*))\s*\)"#).unwrap()
});

/// What the `css` step needs from the build
pub struct CssContext<'a> {
    pub resolver: &'a Resolver,
    pub rules: &'a RuleSet,

    /// Directory of the extracted stylesheet, relative to the output
    /// directory; rewritten URLs are relative to it
    pub stylesheet_dir: PathBuf,

    /// Extra SCSS load paths for imported `.scss` files
    pub load_paths: &'a [PathBuf],
}

/// Result of the `css` step for one stylesheet module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StylesheetOutput {
    /// CSS with local imports inlined and URLs rewritten
    pub css: String,

    /// Remote `@import` rules, which must stay at the top of the output
    pub imports: Vec<String>,

    /// Files referenced through `url()`, in order of first reference
    pub assets: Vec<PathBuf>,
}

/// Run the `css` step over `css`, the content of the file at `path`
pub fn process(css: &str, path: &Path, ctx: &CssContext<'_>) -> Result<StylesheetOutput> {
    debug!("Processing CSS: {}", path.display());

    let mut builder = Builder {
        ctx,
        visited: HashSet::from([path.to_path_buf()]),
        output: StylesheetOutput::default(),
    };
    let body = builder.expand(css, path)?;
    validate(&body, path)?;

    builder.output.css = body;
    Ok(builder.output)
}

struct Builder<'c, 'a> {
    ctx: &'c CssContext<'a>,
    visited: HashSet<PathBuf>,
    output: StylesheetOutput,
}

impl Builder<'_, '_> {
    fn expand(&mut self, css: &str, path: &Path) -> Result<String> {
        let mut body = String::with_capacity(css.len());
        let mut last = 0;
        let inert = inert_spans(css);

        for caps in IMPORT_RULE.captures_iter(css) {
            let Some(whole) = caps.get(0) else { continue };
            if is_inert(&inert, whole.start()) {
                continue;
            }
            body.push_str(&self.rewrite_urls(&css[last..whole.start()], path)?);
            last = whole.end();

            let request = first_group(&caps, &["u1", "u2", "u3", "q1", "q2"]);
            let media = caps.name("media").map(|m| m.as_str().trim()).unwrap_or("");

            if is_external(request) {
                self.output.imports.push(whole.as_str().trim().to_string());
                continue;
            }

            let (request, _) = split_suffix(request);
            let target = self.ctx.resolver.resolve_style_request(request, path)?;
            if !self.visited.insert(target.clone()) {
                debug!("Skipping repeated import of {}", target.display());
                continue;
            }

            let source = self.load(&target)?;
            let nested = self.expand(&source, &target)?;
            if media.is_empty() {
                body.push_str(&nested);
                body.push('\n');
            } else {
                let _ = write!(body, "@media {} {{\n{}\n}}\n", media, nested);
            }
        }

        body.push_str(&self.rewrite_urls(&css[last..], path)?);
        Ok(body)
    }

    /// Read an imported stylesheet, compiling it first when its rule says so
    fn load(&self, path: &Path) -> Result<String> {
        match self.ctx.rules.classify(path)? {
            ModuleType::Stylesheet { loaders } if loaders.contains(&LoaderKind::Sass) => {
                Ok(sass::compile(path, self.ctx.load_paths)?)
            }
            ModuleType::Stylesheet { .. } => fs::read_to_string(path)
                .with_context(|| format!("Failed to read stylesheet: {}", path.display())),
            _ => Err(BuildError::NoMatchingRule(path.to_path_buf()).into()),
        }
    }

    fn rewrite_urls(&mut self, css: &str, path: &Path) -> Result<String> {
        let mut out = String::with_capacity(css.len());
        let mut last = 0;
        let inert = inert_spans(css);

        for caps in URL_FUNCTION.captures_iter(css) {
            let Some(whole) = caps.get(0) else { continue };
            if is_inert(&inert, whole.start()) {
                continue;
            }
            let value = first_group(&caps, &["dq", "sq", "bare"]);

            out.push_str(&css[last..whole.start()]);
            last = whole.end();

            if is_external(value) || value.is_empty() {
                out.push_str(whole.as_str());
                continue;
            }

            let (request, suffix) = split_suffix(value);
            let target = self.ctx.resolver.resolve_style_request(request, path)?;
            let template = self
                .ctx
                .rules
                .asset_template(&target)
                .ok_or_else(|| BuildError::NoMatchingRule(target.clone()))?;
            let content = fs::read(&target)
                .with_context(|| format!("Failed to read asset: {}", target.display()))?;
            let name = asset::render_name(template, &target, &content);

            if !self.output.assets.contains(&target) {
                self.output.assets.push(target);
            }

            let url = relative_url(&self.ctx.stylesheet_dir, &name);
            let _ = write!(out, "url(\"{}{}\")", url, suffix);
        }

        out.push_str(&css[last..]);
        Ok(out)
    }
}

fn first_group<'t>(caps: &Captures<'t>, names: &[&str]) -> &'t str {
    names
        .iter()
        .find_map(|name| caps.name(name))
        .map(|m| m.as_str().trim())
        .unwrap_or("")
}

/// Byte ranges of comments and string literals. `@import` and `url()`
/// starting inside one are plain text.
fn inert_spans(css: &str) -> Vec<Range<usize>> {
    let bytes = css.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = css[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |offset| i + 2 + offset + 2);
                spans.push(i..end);
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != quote && bytes[j] != b'\n' {
                    if bytes[j] == b'\\' {
                        j += 1;
                    }
                    j += 1;
                }
                let end = (j + 1).min(bytes.len());
                spans.push(i..end);
                i = end;
            }
            _ => i += 1,
        }
    }

    spans
}

fn is_inert(spans: &[Range<usize>], pos: usize) -> bool {
    spans.iter().any(|span| span.contains(&pos))
}

/// URLs the bundler leaves untouched
fn is_external(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("data:")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("//")
        || lower.starts_with('#')
        || lower.starts_with('/')
        || lower.starts_with("about:")
}

/// Split `font.eot?#iefix` into `font.eot` and `?#iefix`
fn split_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(index) => url.split_at(index),
        None => (url, ""),
    }
}

fn validate(css: &str, path: &Path) -> Result<(), BuildError> {
    StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map(|_| ())
    .map_err(|e| BuildError::Stylesheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

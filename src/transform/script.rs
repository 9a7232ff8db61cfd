//! Script import rewriting
//!
//! Static imports, re-exports, `require` and dynamic `import()` are turned
//! into calls to the bundle runtime so every module can live inside a
//! plain function wrapper.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::BuildError;

/// Name of the runtime's require function inside the bundle
pub const REQUIRE_FN: &str = "__assetpack_require__";

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)import\s+(?:([\w$*{}\s,]+?)\s+from\s+)?["']([^"']+)["'][ \t]*;?"#)
        .unwrap()
});

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s+(\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+["']([^"']+)["'][ \t]*;?"#)
        .unwrap()
});

static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)export\s+default\s+").unwrap());

static DYNAMIC_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap());

static REQUIRE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap());

/// Rewrite the imports of the script at `path`.
///
/// `ids` maps every specifier the script uses to the bundle id of the
/// module it resolved to.
pub fn rewrite_imports(source: &str, path: &Path, ids: &HashMap<String, String>) -> Result<String> {
    let mut rewriter = Rewriter { path, ids, temps: 0 };

    let code = replace_all(&STATIC_IMPORT, source, |caps| {
        let indent = &caps[1];
        let require = rewriter.require(&caps[3])?;
        Ok(match caps.get(2) {
            None => format!("{}{};", indent, require),
            Some(clause) => format!("{}{}", indent, rewriter.bind_clause(clause.as_str(), &require)),
        })
    })?;

    let code = replace_all(&EXPORT_FROM, &code, |caps| {
        let require = rewriter.require(&caps[3])?;
        Ok(format!("{}{}", &caps[1], rewriter.reexport(&caps[2], &require)))
    })?;

    let code = EXPORT_DEFAULT
        .replace_all(&code, "${1}module.exports.default = ")
        .into_owned();

    let code = replace_all(&DYNAMIC_IMPORT, &code, |caps| {
        let require = rewriter.require(&caps[1])?;
        Ok(format!("Promise.resolve().then(function () {{ return {}; }})", require))
    })?;

    replace_all(&REQUIRE_CALL, &code, |caps| rewriter.require(&caps[1]))
}

struct Rewriter<'a> {
    path: &'a Path,
    ids: &'a HashMap<String, String>,
    temps: usize,
}

impl Rewriter<'_> {
    fn require(&self, specifier: &str) -> Result<String> {
        let id = self.ids.get(specifier).ok_or_else(|| BuildError::UnresolvedImport {
            specifier: specifier.to_string(),
            importer: self.path.to_path_buf(),
        })?;
        Ok(format!("{}({})", REQUIRE_FN, Value::String(id.clone())))
    }

    fn temp(&mut self) -> String {
        self.temps += 1;
        format!("__assetpack_m{}__", self.temps)
    }

    /// `a, { b, c as d }` / `* as ns` / `a` bound to `require`
    fn bind_clause(&mut self, clause: &str, require: &str) -> String {
        let clause = clause.trim();
        let (default, rest) = if clause.starts_with('{') || clause.starts_with('*') {
            (None, clause)
        } else {
            match clause.split_once(',') {
                Some((default, rest)) => (Some(default.trim()), rest.trim()),
                None => (Some(clause), ""),
            }
        };

        let temp = self.temp();
        let mut out = format!("var {} = {};", temp, require);

        if let Some(name) = default {
            out.push_str(&format!(
                " var {name} = \"default\" in Object({t}) ? {t}.default : {t};",
                name = name,
                t = temp
            ));
        }

        if let Some(namespace) = rest.strip_prefix('*') {
            if let Some(name) = namespace.split_whitespace().last() {
                out.push_str(&format!(" var {} = {};", name, temp));
            }
        } else {
            for (imported, local) in named_bindings(rest) {
                out.push_str(&format!(" var {} = {}.{};", local, temp, imported));
            }
        }

        out
    }

    fn reexport(&mut self, clause: &str, require: &str) -> String {
        let clause = clause.trim();
        if let Some(namespace) = clause.strip_prefix('*') {
            return match namespace.split_whitespace().last() {
                Some(name) if namespace.trim_start().starts_with("as") => {
                    format!("module.exports.{} = {};", name, require)
                }
                _ => format!("Object.assign(module.exports, {});", require),
            };
        }

        let temp = self.temp();
        let mut out = format!("var {} = {};", temp, require);
        for (imported, exported) in named_bindings(clause) {
            out.push_str(&format!(" module.exports.{} = {}.{};", exported, temp, imported));
        }
        out
    }
}

/// `{ a, b as c }` -> `[(a, a), (b, c)]`
fn named_bindings(clause: &str) -> Vec<(String, String)> {
    clause
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|part| {
            let words: Vec<&str> = part.split_whitespace().collect();
            match words.as_slice() {
                [name] => Some((name.to_string(), name.to_string())),
                [imported, "as", local] => Some((imported.to_string(), local.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// `Regex::replace_all` with a fallible replacement
fn replace_all(
    re: &Regex,
    text: &str,
    mut replace: impl FnMut(&Captures<'_>) -> Result<String>,
) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replace(&caps)?);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

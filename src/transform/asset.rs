//! Asset filename templates

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::hash_content;

static HASH_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?:content)?hash(?::(\d+))?\]").unwrap());

/// Render an output name such as `assets/[name][ext]` for a source file.
///
/// `[ext]` includes the leading dot. `[hash]` is the content hash,
/// `[hash:N]` its first N characters.
pub fn render_name(template: &str, path: &Path, content: &[u8]) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let named = template.replace("[name]", &stem).replace("[ext]", &ext);

    if !HASH_TOKEN.is_match(&named) {
        return named;
    }

    let hash = hash_content(content);
    HASH_TOKEN
        .replace_all(&named, |caps: &regex::Captures| {
            let len = caps
                .get(1)
                .and_then(|n| n.as_str().parse::<usize>().ok())
                .unwrap_or(hash.len())
                .min(hash.len());
            hash[..len].to_string()
        })
        .into_owned()
}

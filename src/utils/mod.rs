//! Utility functions and helpers

use std::path::Path;

use sha2::{Digest, Sha256};

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Check if a path is within a directory
pub fn is_subpath(path: &Path, base: &Path) -> bool {
    path.canonicalize()
        .ok()
        .and_then(|p| {
            base.canonicalize()
                .ok()
                .map(|b| p.starts_with(&b))
        })
        .unwrap_or(false)
}

/// URL of `target` (relative to the output directory) as seen from a file
/// in `from_dir` (also relative to the output directory)
pub fn relative_url(from_dir: &Path, target: &str) -> String {
    pathdiff::diff_paths(target, from_dir)
        .map(|p| to_slash(&p))
        .unwrap_or_else(|| target.to_string())
}

/// Stable module name: the path relative to the project root, with `/`
/// separators
pub fn module_name(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => to_slash(relative),
        Err(_) => pathdiff::diff_paths(path, root)
            .map(|p| to_slash(&p))
            .unwrap_or_else(|| to_slash(path)),
    }
}

fn to_slash(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content() {
        let hash = hash_content(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_content(b"hello world"));
        assert_ne!(hash, hash_content(b"hello there"));
    }

    #[test]
    fn test_relative_url() {
        assert_eq!(relative_url(Path::new(""), "assets/a.woff"), "assets/a.woff");
        assert_eq!(relative_url(Path::new("css"), "assets/a.woff"), "../assets/a.woff");
        assert_eq!(relative_url(Path::new("css/app"), "css/img.png"), "../img.png");
    }

    #[test]
    fn test_module_name() {
        let root = Path::new("/project");
        assert_eq!(
            module_name(root, Path::new("/project/frontend/index.js")),
            "frontend/index.js"
        );
        assert_eq!(
            module_name(root, Path::new("/shared/theme.css")),
            "../shared/theme.css"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}

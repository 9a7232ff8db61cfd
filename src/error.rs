//! Fatal build conditions
//!
//! Every variant aborts the build. Callers receive them wrapped in
//! `anyhow::Error` and can recover the kind with `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Entry module not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("Can't resolve '{specifier}' in {}", .importer.display())]
    UnresolvedImport { specifier: String, importer: PathBuf },

    #[error("No rule matches {}; add a rule for its extension", .0.display())]
    NoMatchingRule(PathBuf),

    #[error("Failed to process stylesheet {}: {message}", .path.display())]
    Stylesheet { path: PathBuf, message: String },

    #[error("Conflict: multiple assets emit different content to the same filename '{0}'")]
    AssetConflict(String),

    #[error("Copy source does not exist: {}", .0.display())]
    CopySourceMissing(PathBuf),

    #[error("Refusing to clean output directory {}: it contains the project root", .0.display())]
    UnsafeOutputDir(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

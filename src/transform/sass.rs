//! SCSS preprocessing

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BuildError;

/// Compile an SCSS file to CSS.
///
/// Imports are looked up next to the file first, then in `load_paths`.
pub fn compile(path: &Path, load_paths: &[PathBuf]) -> Result<String, BuildError> {
    debug!("Compiling SCSS: {}", path.display());

    let options = load_paths
        .iter()
        .filter(|dir| dir.is_dir())
        .fold(grass::Options::default(), |options, dir| options.load_path(dir));

    grass::from_path(path, &options).map_err(|e| BuildError::Stylesheet {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

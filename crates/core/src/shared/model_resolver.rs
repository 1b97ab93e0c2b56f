use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("explicit model path does not exist: {0}")]
    MissingExplicit(PathBuf),
    #[error("model {name} not found; searched: {searched}")]
    NotFound { name: String, searched: String },
}

/// Resolve a model or resource file by name.
///
/// Resolution order:
/// 1. Explicit path (must exist when given)
/// 2. User cache directory (platform-specific)
/// 3. `./models/` relative to the working directory
pub fn resolve(name: &str, explicit: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    let mut search_dirs = Vec::new();
    if let Some(dir) = model_cache_dir() {
        search_dirs.push(dir);
    }
    search_dirs.push(PathBuf::from("models"));
    resolve_in(name, explicit, &search_dirs)
}

fn resolve_in(
    name: &str,
    explicit: Option<&Path>,
    search_dirs: &[PathBuf],
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ModelResolveError::MissingExplicit(path.to_path_buf()));
    }

    for dir in search_dirs {
        let candidate = dir.join(name);
        if candidate.exists() {
            log::debug!("Resolved {name} at {}", candidate.display());
            return Ok(candidate);
        }
    }

    Err(ModelResolveError::NotFound {
        name: name.to_string(),
        searched: search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceMood/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceMood/models/` or `~/.cache/FaceMood/models/`
/// - Windows: `%LOCALAPPDATA%/FaceMood/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join("FaceMood").join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join("FaceMood").join("models"))
    }
}

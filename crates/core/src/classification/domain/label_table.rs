use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelTableError {
    #[error("failed to read label file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("label file {0} contains no labels")]
    Empty(PathBuf),
}

/// Class id → display label, in file order, 0-based.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Loads a "one label per line" file, taking the first comma-separated
    /// column of each non-blank line.
    pub fn load(path: &Path) -> Result<Self, LabelTableError> {
        let text = fs::read_to_string(path).map_err(|e| LabelTableError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(LabelTableError::Empty(path.to_path_buf()));
        }
        log::info!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let labels = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let first = line.split(',').next().unwrap_or_default();
                first.trim().trim_matches('"').to_string()
            })
            .collect();
        Self { labels }
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

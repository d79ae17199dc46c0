//! Template fragments and where their text comes from.

use crate::Result;
use std::path::{Path, PathBuf};

/// One piece of fragment script, evaluated once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Script text.
    pub source: String,

    /// File the text was read from, if any.
    pub origin: Option<PathBuf>,
}

impl Fragment {
    /// Create a fragment from literal text.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            origin: None,
        }
    }

    /// Record the file the fragment was read from.
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Human-readable label for logs and errors.
    pub fn label(&self) -> String {
        match &self.origin {
            Some(path) => path.display().to_string(),
            None => "<inline>".to_string(),
        }
    }
}

/// Reads fragment text from storage.
pub trait FragmentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;
}

/// Reads fragments from the local filesystem as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFragmentReader;

impl FragmentReader for FsFragmentReader {
    fn read(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }
}

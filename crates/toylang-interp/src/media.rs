//! Import URI resolution against mounted directories.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolves import URIs against a set of mounted directories, tried in
/// mount order, with the literal path as a final fallback.
#[derive(Debug, Default)]
pub struct Media {
    mounted: Vec<PathBuf>,
}

impl Media {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a directory; idempotent on the absolutized path. Returns
    /// false when the path is not a directory.
    pub fn mount(&mut self, path: impl AsRef<Path>) -> bool {
        let Ok(abs) = std::path::absolute(path.as_ref()) else {
            return false;
        };
        if self.mounted.contains(&abs) {
            return true;
        }
        if !abs.is_dir() {
            return false;
        }
        debug!(path = %abs.display(), "mount");
        self.mounted.push(abs);
        true
    }

    pub fn is_mounted(&self, path: impl AsRef<Path>) -> bool {
        self.mounted.iter().any(|m| m == path.as_ref())
    }

    pub fn exists(&self, uri: &str) -> bool {
        self.resolve(uri).is_some()
    }

    /// Fills `out` with the contents of `uri`; false when it resolves
    /// nowhere or cannot be read.
    pub fn read_to(&self, out: &mut String, uri: &str) -> bool {
        let Some(path) = self.resolve(uri) else {
            debug!(%uri, "uri not found");
            return false;
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                *out = text;
                true
            }
            Err(_) => false,
        }
    }

    fn resolve(&self, uri: &str) -> Option<PathBuf> {
        for mount in &self.mounted {
            let candidate = mount.join(uri);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        let literal = PathBuf::from(uri);
        literal.is_file().then_some(literal)
    }
}

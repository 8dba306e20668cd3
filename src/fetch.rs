//! Checkpoint retrieval.
//!
//! Pretrained weights reach the orchestrator through an injected fetch
//! capability rather than a hardwired download location, so tests and
//! offline deployments can substitute their own artifact stores.

use std::path::{Path, PathBuf};

use crate::utils::error::{Error, Result};

/// Extension of stored checkpoint artifacts.
pub const ARTIFACT_EXTENSION: &str = "mpk";

/// Named-artifact retrieval: resolves a pretrained checkpoint name to a
/// local file. Failure is fatal to model construction; there are no
/// fallback weights.
pub trait CheckpointFetcher {
    /// Local path of the named artifact, or `Error::ArtifactFetch` when it
    /// cannot be produced.
    fn fetch(&self, name: &str) -> Result<PathBuf>;
}

/// Serves checkpoints from a local artifact directory.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CheckpointFetcher for DirectoryFetcher {
    fn fetch(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(format!("{name}.{ARTIFACT_EXTENSION}"));
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::ArtifactFetch(format!(
                "checkpoint '{name}' not found under {:?}",
                self.root
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_existing_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("contextpred.mpk");
        std::fs::write(&path, b"weights").unwrap();

        let fetcher = DirectoryFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("contextpred").unwrap(), path);
    }

    #[test]
    fn test_missing_artifact_is_a_fetch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let fetcher = DirectoryFetcher::new(dir.path());

        let err = fetcher.fetch("contextpred").unwrap_err();
        assert!(matches!(err, Error::ArtifactFetch(_)));
    }
}

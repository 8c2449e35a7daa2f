//! Installed model list (`models.json`).
//!
//! ```json
//! [
//!   { "name": "model1", "description": "model1 description", "path": "/path/to/model1" }
//! ]
//! ```
//!
//! The file is re-read on every refresh. A missing or broken file keeps the
//! last successfully parsed list.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ModelManifest {
    path: PathBuf,
    models: RwLock<Vec<ModelDescriptor>>,
}

impl ModelManifest {
    /// Read `path` once; a missing file starts with an empty list.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let manifest = Self {
            path: path.as_ref().to_path_buf(),
            models: RwLock::new(Vec::new()),
        };
        manifest.refresh();
        manifest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the manifest file and return the current list.
    pub fn refresh(&self) -> Vec<ModelDescriptor> {
        match Self::read(&self.path) {
            Ok(models) => {
                debug!("models: {:?}", models);
                *self.models.write().unwrap_or_else(PoisonError::into_inner) = models;
            }
            Err(e) => error!("{e}; keeping last known model list"),
        }
        self.models()
    }

    fn read(path: &Path) -> Result<Vec<ModelDescriptor>, ModelError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ModelError::ManifestMissing(path.to_path_buf()),
            _ => ModelError::ManifestUnreadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        serde_json::from_str(&text).map_err(|source| ModelError::ManifestInvalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn models(&self) -> Vec<ModelDescriptor> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| m.name.clone())
            .collect()
    }

    /// First model with this display name.
    pub fn resolve(&self, name: &str) -> Option<ModelDescriptor> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MODELS: &str = r#"[
        { "name": "alice", "description": "first", "path": "/models/alice" },
        { "name": "bob", "path": "/models/bob" }
    ]"#;

    #[test]
    fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, TWO_MODELS).unwrap();

        let manifest = ModelManifest::load(&path);
        assert_eq!(manifest.names(), vec!["alice", "bob"]);
        let bob = manifest.resolve("bob").unwrap();
        assert_eq!(bob.path, PathBuf::from("/models/bob"));
        assert_eq!(bob.description, "");
        assert!(manifest.resolve("carol").is_none());
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModelManifest::load(dir.path().join("models.json"));
        assert!(manifest.models().is_empty());
    }

    #[test]
    fn test_missing_file_keeps_stale_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, TWO_MODELS).unwrap();
        let manifest = ModelManifest::load(&path);

        fs::remove_file(&path).unwrap();
        let models = manifest.refresh();
        assert_eq!(models.len(), 2);
        assert_eq!(manifest.names(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_broken_file_keeps_stale_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, TWO_MODELS).unwrap();
        let manifest = ModelManifest::load(&path);

        fs::write(&path, "[{ \"name\": ").unwrap();
        assert_eq!(manifest.refresh().len(), 2);
    }

    #[test]
    fn test_refresh_replaces_whole_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        fs::write(&path, TWO_MODELS).unwrap();
        let manifest = ModelManifest::load(&path);

        fs::write(&path, r#"[{ "name": "carol", "path": "/models/carol" }]"#).unwrap();
        assert_eq!(manifest.refresh().len(), 1);
        assert_eq!(manifest.names(), vec!["carol"]);
        assert!(manifest.resolve("alice").is_none());
    }
}

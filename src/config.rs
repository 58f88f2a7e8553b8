//! Resolution of the environment-provided storage backend.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::persist::{FileStorage, StorageBackend};

/// Environment variable naming the directory used by the default backend.
pub const STORAGE_DIR_ENV: &str = "DYNAMIXX_STORAGE_DIR";

/// Where the default storage backend lives, if anywhere.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Read the configuration from `DYNAMIXX_STORAGE_DIR`. An unset or
    /// empty variable means no default backend.
    pub fn from_env() -> Self {
        let dir = env::var_os(STORAGE_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        Self { dir }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Build the backend this configuration describes.
    pub fn backend(&self) -> Option<Arc<dyn StorageBackend>> {
        self.dir.as_ref().map(|dir| {
            debug!("Using file storage at {}", dir.display());
            Arc::new(FileStorage::new(dir.clone())) as Arc<dyn StorageBackend>
        })
    }
}

/// The environment-provided backend, if one is configured.
pub fn default_backend() -> Option<Arc<dyn StorageBackend>> {
    StorageConfig::from_env().backend()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_dir_means_no_backend() {
        assert!(StorageConfig::default().backend().is_none());
    }

    #[test]
    fn dir_builds_file_backend() {
        let dir = std::env::temp_dir().join(format!("dynamixx-config-{}", std::process::id()));
        let backend = StorageConfig::with_dir(&dir).backend().unwrap();

        backend.set_item("probe", "1").unwrap();
        assert!(dir.join("probe.json").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}

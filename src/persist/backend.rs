use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, StoreError};

/// A durable key-value backend holding serialized snapshots.
///
/// Calls are synchronous; writes to the same identifier must be applied
/// in the order they were issued.
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `id`, or `None` if there is none.
    fn get_item(&self, id: &str) -> Result<Option<String>>;

    /// Store `value` under `id`, replacing any previous value.
    fn set_item(&self, id: &str, value: &str) -> Result<()>;

    /// Remove `id`. Removing a missing identifier is not an error.
    fn remove_item(&self, id: &str) -> Result<()>;
}

/// In-process backend. Clones share the same underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored identifiers.
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, id: &str) -> Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(id).cloned())
    }

    fn set_item(&self, id: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(id.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, id: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(id);
        Ok(())
    }
}

/// Backend storing each identifier as `<dir>/<id>.json`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create a backend rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the file path for an identifier.
    fn item_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(StoreError::Config(format!(
                "invalid storage identifier: {:?}",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl StorageBackend for FileStorage {
    fn get_item(&self, id: &str) -> Result<Option<String>> {
        let path = self.item_path(id)?;
        match fs::read_to_string(&path) {
            Ok(contents) if contents.is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `<id>.json.tmp` and renames it over `<id>.json`, so a crash
    /// mid-write leaves the previous snapshot intact.
    fn set_item(&self, id: &str, value: &str) -> Result<()> {
        let path = self.item_path(id)?;
        let tmp = path.with_extension("json.tmp");
        fs::create_dir_all(&self.dir)?;
        fs::write(&tmp, value)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove_item(&self, id: &str) -> Result<()> {
        let path = self.item_path(id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

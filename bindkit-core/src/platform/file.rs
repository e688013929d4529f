//! File-backed blob store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{AtomicBlobStore, StoreError};

/// Blob store writing one file per blob under a root directory.
///
/// Writes go through a temporary sibling file followed by a rename, which
/// is atomic on the platforms this SDK targets.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl AtomicBlobStore for FileBlobStore {
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(format!("reading blob '{name}'"), err)),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .map_err(|err| StoreError::io("creating blob store root", err))?;
        let path = self.path_for(name);
        let tmp = self.path_for(&format!("{name}.tmp"));
        fs::write(&tmp, bytes)
            .map_err(|err| StoreError::io(format!("writing blob '{name}'"), err))?;
        fs::rename(&tmp, &path)
            .map_err(|err| StoreError::io(format!("publishing blob '{name}'"), err))
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::io(format!("deleting blob '{name}'"), err)),
        }
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path_for(name).exists())
    }

    fn writable(&self) -> bool {
        fs::create_dir_all(&self.root).is_ok()
    }
}

impl std::fmt::Debug for FileBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlobStore")
            .field("root", &self.root.display())
            .finish()
    }
}

/// Returns the root path used by a store, mainly for diagnostics.
impl AsRef<Path> for FileBlobStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}

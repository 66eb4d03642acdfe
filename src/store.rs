use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WorkflowError;

/// Boundary to wherever document, photo, and PDF bytes live. The workflow
/// only holds opaque refs; any failure surfaces as a storage error and the
/// surrounding operation rolls back.
pub trait FileStore {
    fn store(&self, bytes: &[u8], path: &str) -> Result<String, WorkflowError>;
    fn delete(&self, file_ref: &str) -> Result<(), WorkflowError>;
    fn exists(&self, file_ref: &str) -> bool;
}

/// Filesystem-backed store used by the CLI. Refs are paths relative to the
/// store root.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileStore { root: root.into() }
    }

    fn resolve(&self, file_ref: &str) -> PathBuf {
        self.root.join(file_ref)
    }
}

impl FileStore for LocalFileStore {
    fn store(&self, bytes: &[u8], path: &str) -> Result<String, WorkflowError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        Ok(path.to_string())
    }

    fn delete(&self, file_ref: &str) -> Result<(), WorkflowError> {
        fs::remove_file(self.resolve(file_ref))?;
        Ok(())
    }

    fn exists(&self, file_ref: &str) -> bool {
        self.resolve(file_ref).is_file()
    }
}

/// Reads a file that is about to be handed to the store, surfacing the
/// usual storage error on failure.
pub fn read_upload(path: &Path) -> Result<Vec<u8>, WorkflowError> {
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_exists_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let file_ref = store
            .store(b"transcript bytes", "documents/app-1/transcript.pdf")
            .unwrap();
        assert!(store.exists(&file_ref));

        store.delete(&file_ref).unwrap();
        assert!(!store.exists(&file_ref));
    }

    #[test]
    fn deleting_a_missing_ref_is_a_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let err = store.delete("documents/missing.pdf").unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
    }

    #[test]
    fn nested_ref_directories_are_created_on_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());
        let file_ref = store
            .store(b"photo", "photos/app-1/entry-9/01.jpg")
            .unwrap();
        assert!(store.exists(&file_ref));
    }
}

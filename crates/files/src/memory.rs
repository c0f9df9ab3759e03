//! In-process blob store for tests and dry runs.

use crate::store::{validate_container_name, validate_key, BlobMetadata, BlobStore};
use crate::FilesError;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Blob store holding everything in memory.
///
/// Applies the same container and key validation as [`crate::FsBlobStore`].
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored in `container`, sorted.
    pub fn keys(&self, container: &str) -> Vec<String> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<BlobMetadata, FilesError> {
        validate_container_name(container)?;
        validate_key(key)?;

        let metadata = BlobMetadata::describe(container, key, bytes);
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((container.to_owned(), key.to_owned()), bytes.to_vec());
        Ok(metadata)
    }

    fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, FilesError> {
        validate_container_name(container)?;
        validate_key(key)?;

        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(container.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| FilesError::NotFound {
                container: container.to_owned(),
                key: key.to_owned(),
            })
    }
}

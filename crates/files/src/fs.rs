//! Filesystem-backed blob store.
//!
//! # Storage Layout
//!
//! ```text
//! <root>/
//! └── <container>/
//!     ├── <key>
//!     └── .meta/
//!         └── <key>.yaml
//! ```
//!
//! # Write Discipline
//!
//! Blobs are written to a uniquely named temporary file inside the container directory and then
//! renamed over the final path, so readers never observe a partially written blob and two
//! concurrent uploads never share a temporary path. The metadata sidecar is written the same way
//! after the blob itself.

use crate::store::{validate_container_name, validate_key, BlobMetadata, BlobStore};
use crate::{FilesError, METADATA_FOLDER_NAME};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root_directory: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root_directory`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The root directory does not exist or is not a directory
    /// - Path canonicalisation fails
    pub fn new(root_directory: &Path) -> Result<Self, FilesError> {
        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Creates the root directory if needed, then opens the store.
    pub fn create(root_directory: &Path) -> Result<Self, FilesError> {
        fs::create_dir_all(root_directory)?;
        Self::new(root_directory)
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Read the metadata sidecar written by the last successful `put`.
    pub fn metadata(&self, container: &str, key: &str) -> Result<BlobMetadata, FilesError> {
        validate_container_name(container)?;
        validate_key(key)?;

        let path = self.metadata_path(container, key);
        if !path.is_file() {
            return Err(FilesError::NotFound {
                container: container.to_owned(),
                key: key.to_owned(),
            });
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        self.root_directory.join(container)
    }

    fn blob_path(&self, container: &str, key: &str) -> PathBuf {
        self.container_dir(container).join(key)
    }

    fn metadata_path(&self, container: &str, key: &str) -> PathBuf {
        self.container_dir(container)
            .join(METADATA_FOLDER_NAME)
            .join(format!("{key}.yaml"))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<BlobMetadata, FilesError> {
        validate_container_name(container)?;
        validate_key(key)?;

        let container_dir = self.container_dir(container);
        let metadata_dir = container_dir.join(METADATA_FOLDER_NAME);
        fs::create_dir_all(&metadata_dir).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create container directory {}: {}",
                    container_dir.display(),
                    e
                ),
            ))
        })?;

        let blob_path = self.blob_path(container, key);
        write_atomically(&container_dir, &blob_path, bytes)?;

        let metadata = BlobMetadata::describe(container, key, bytes);
        let yaml = serde_yaml::to_string(&metadata)?;
        write_atomically(&metadata_dir, &self.metadata_path(container, key), yaml.as_bytes())?;

        tracing::debug!(
            container,
            key,
            size_bytes = metadata.size_bytes,
            sha256 = %metadata.sha256,
            "stored blob"
        );
        Ok(metadata)
    }

    fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, FilesError> {
        validate_container_name(container)?;
        validate_key(key)?;

        let path = self.blob_path(container, key);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FilesError::NotFound {
                container: container.to_owned(),
                key: key.to_owned(),
            }),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read blob from {}: {}", path.display(), e),
            ))),
        }
    }
}

/// Write `bytes` to a fresh temp file in `dir`, then rename it over `target`.
///
/// The temp file is removed by its drop guard if any step before the rename fails.
fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), FilesError> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| {
        FilesError::Io(std::io::Error::new(
            e.error.kind(),
            format!("Failed to move blob into place at {}: {}", target.display(), e.error),
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            FsBlobStore::new(&missing),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn put_then_get_returns_same_bytes_and_writes_sidecar() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();

        let meta = store
            .put("patienthealthdata", "123 health data.pdf", b"%PDF-1.7 body")
            .unwrap();
        assert_eq!(meta.size_bytes, 13);
        assert_eq!(meta.media_type.as_ref().map(|m| m.as_str()), Some("application/pdf"));

        let bytes = store.get("patienthealthdata", "123 health data.pdf").unwrap();
        assert_eq!(bytes, b"%PDF-1.7 body");

        let sidecar = store.metadata("patienthealthdata", "123 health data.pdf").unwrap();
        assert_eq!(sidecar, meta);
    }

    #[test]
    fn put_replaces_existing_blob() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();

        store.put("feedbackforms", "1 feedback request.md", b"first").unwrap();
        let meta = store.put("feedbackforms", "1 feedback request.md", b"second").unwrap();

        assert_eq!(store.get("feedbackforms", "1 feedback request.md").unwrap(), b"second");
        assert_eq!(meta.size_bytes, 6);
    }

    #[test]
    fn put_leaves_no_temp_files_behind() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();
        store.put("patientinfo", "9 details.md", b"# Details").unwrap();

        let mut names: Vec<String> = fs::read_dir(temp.path().join("patientinfo"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec![".meta".to_string(), "9 details.md".to_string()]);
    }

    #[test]
    fn get_missing_blob_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();
        let err = store.get("feedbackforms", "nothing.pdf").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rejects_invalid_container_and_key() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path()).unwrap();
        assert!(matches!(
            store.put("Bad_Container", "x.pdf", b"x"),
            Err(FilesError::InvalidContainerName { .. })
        ));
        assert!(matches!(
            store.put("feedbackforms", "../escape.pdf", b"x"),
            Err(FilesError::InvalidKey { .. })
        ));
        assert!(!temp.path().join("escape.pdf").exists());
    }

    #[test]
    fn create_makes_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("blobs").join("nested");
        let store = FsBlobStore::create(&root).unwrap();
        assert!(store.root_directory().is_dir());
    }
}

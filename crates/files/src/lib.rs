//! Patient document blob storage
//!
//! This crate provides the storage collaborator that generated patient documents are uploaded
//! to and downloaded from.
//!
//! ## Storage Model
//!
//! Blobs are addressed by a **container** (one per document kind, e.g. `feedbackforms`) and a
//! **key** (the artifact name, e.g. `123 health data.pdf`). Uploading to an existing key
//! replaces the blob. Every successful upload is described by a [`BlobMetadata`] record.
//!
//! ```text
//! <storage_root>/
//! └── <container>/
//!     ├── 123 feedback request.pdf
//!     └── .meta/
//!         └── 123 feedback request.pdf.yaml
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use pdoc_files::{BlobStore, FsBlobStore};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FsBlobStore::new(Path::new("/var/lib/pdoc/blobs"))?;
//! let meta = store.put("patienthealthdata", "123 health data.pdf", b"%PDF-1.7")?;
//! assert_eq!(store.get(&meta.container, &meta.key)?, b"%PDF-1.7");
//! # Ok(())
//! # }
//! ```

mod fs;
mod memory;
mod store;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use store::{validate_container_name, validate_key, BlobMetadata, BlobStore};

/// Directory (inside each container) holding YAML metadata sidecars.
pub const METADATA_FOLDER_NAME: &str = ".meta";

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Container name is not a valid blob container name
    #[error("Invalid container name '{name}': {reason}")]
    InvalidContainerName { name: String, reason: &'static str },

    /// Blob key would escape its container or is otherwise unusable
    #[error("Invalid blob key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// No blob stored under this container and key
    #[error("Blob not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Metadata sidecar could not be (de)serialised
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_yaml::Error),

    /// The store rejected the operation (used by stores that are not backed by a filesystem)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    /// True when the error means "nothing stored here" rather than a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FilesError::NotFound { .. })
    }
}

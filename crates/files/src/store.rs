//! The [`BlobStore`] collaborator contract and shared validation.

use crate::FilesError;
use chrono::{DateTime, Utc};
use pdoc_types::NonEmptyText;
use sha2::{Digest, Sha256};

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Metadata for a stored blob
///
/// This structure is serialised to YAML alongside the blob by [`crate::FsBlobStore`]. It records
/// what was stored and when, without any clinical content.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    /// Container the blob was stored in
    pub container: String,

    /// Key within the container
    pub key: String,

    /// Hexadecimal SHA-256 digest of the blob content
    pub sha256: String,

    /// Size of the blob in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection from magic bytes and should not be considered
    /// authoritative. Text formats such as Markdown are not detected.
    pub media_type: Option<NonEmptyText>,

    /// UTC timestamp when the blob was stored
    pub stored_at: DateTime<Utc>,
}

impl BlobMetadata {
    /// Describe `bytes` as stored now under `container`/`key`.
    pub fn describe(container: &str, key: &str, bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Self {
            container: container.to_owned(),
            key: key.to_owned(),
            sha256: hex::encode(digest),
            size_bytes: bytes.len() as u64,
            media_type,
            stored_at: Utc::now(),
        }
    }
}

/// Durable key/value object store keyed by container and name.
///
/// Implementations must be safe to share between concurrent requests.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `container`/`key`, replacing any existing blob.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError`] if the container name or key is invalid, or the write fails.
    fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<BlobMetadata, FilesError>;

    /// Read the blob stored under `container`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] when nothing is stored there.
    fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, FilesError>;
}

/// Validate a container name.
///
/// Container names follow the common object-store convention: 3 to 63 characters of lowercase
/// ASCII letters, digits and `-`, starting and ending with a letter or digit, with no `--`.
pub fn validate_container_name(name: &str) -> Result<(), FilesError> {
    let invalid = |reason| FilesError::InvalidContainerName {
        name: name.to_owned(),
        reason,
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be 3 to 63 characters long"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("may only contain lowercase letters, digits and '-'"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("--") {
        return Err(invalid("must not contain consecutive '-'"));
    }
    Ok(())
}

/// Validate a blob key.
///
/// Keys become file names in [`crate::FsBlobStore`], so they must be a single, visible path
/// component: non-empty, no separators, no leading `.`, no control characters.
pub fn validate_key(key: &str) -> Result<(), FilesError> {
    let invalid = |reason| FilesError::InvalidKey {
        key: key.to_owned(),
        reason,
    };

    if key.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid("must be at most 255 bytes"));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(invalid("must not contain path separators"));
    }
    if key.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if key.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_default_container_names() {
        for name in ["feedbackforms", "patienthealthdata", "patientinfo", "health-data-2"] {
            validate_container_name(name).unwrap();
        }
    }

    #[test]
    fn rejects_bad_container_names() {
        let long = "a".repeat(64);
        for name in ["ab", "Feedback", "has space", "-lead", "trail-", "dou--ble", long.as_str()] {
            assert!(
                matches!(validate_container_name(name), Err(FilesError::InvalidContainerName { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_artifact_names_with_spaces() {
        validate_key("123 health data.pdf").unwrap();
        validate_key("123 feedback request.md").unwrap();
    }

    #[test]
    fn rejects_keys_that_escape_the_container() {
        for key in ["", "  ", "../x", "a/b", "a\\b", ".meta", "..", "tab\there"] {
            assert!(
                matches!(validate_key(key), Err(FilesError::InvalidKey { .. })),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn describe_hashes_and_detects_pdf() {
        let meta = BlobMetadata::describe("patientinfo", "1 details.pdf", b"%PDF-1.7\n");
        assert_eq!(meta.size_bytes, 9);
        assert_eq!(meta.sha256.len(), 64);
        assert_eq!(meta.media_type.as_ref().map(|m| m.as_str()), Some("application/pdf"));

        let text = BlobMetadata::describe("patientinfo", "1 details.md", b"# Title");
        assert_eq!(text.media_type, None);
    }
}

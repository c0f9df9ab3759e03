//! Render-and-upload of document artifacts.
//!
//! The persister is the only component that touches storage. It renders a [`DocumentModel`]
//! into memory, optionally stages the bytes in a uniquely named scratch file, uploads them under
//! the artifact name, and guarantees the scratch file is gone afterwards whether the upload
//! succeeded or not. Concurrent requests never share a scratch file.

use crate::constants::SCRATCH_FILE_PREFIX;
use crate::document::DocumentModel;
use crate::render::DocumentRenderer;
use crate::{DocumentError, DocumentResult};
use pdoc_files::{BlobMetadata, BlobStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// An artifact that has been uploaded.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StoredArtifact {
    pub container: String,
    pub key: String,
    pub media_type: &'static str,
    pub metadata: BlobMetadata,
}

/// Renders document models and uploads the result.
#[derive(Clone)]
pub struct ArtifactPersister {
    renderer: Arc<dyn DocumentRenderer>,
    store: Arc<dyn BlobStore>,
    scratch_dir: Option<PathBuf>,
}

impl ArtifactPersister {
    /// Create a persister.
    ///
    /// # Arguments
    ///
    /// * `renderer` - Output format backend.
    /// * `store` - Blob store artifacts are uploaded to.
    /// * `scratch_dir` - Where to stage rendered bytes before upload; `None` uploads from memory.
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        store: Arc<dyn BlobStore>,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            store,
            scratch_dir,
        }
    }

    /// File extension of artifacts this persister produces, without the dot.
    pub fn extension(&self) -> &'static str {
        self.renderer.extension()
    }

    /// MIME type of artifacts this persister produces.
    pub fn media_type(&self) -> &'static str {
        self.renderer.media_type()
    }

    /// Render `model` and upload it to `container` under `file_name`.
    ///
    /// # Arguments
    ///
    /// * `model` - The assembled document.
    /// * `file_name` - Artifact name, e.g. `"123 health data.pdf"`.
    /// * `container` - Target container, e.g. `"patienthealthdata"`.
    ///
    /// # Returns
    ///
    /// The [`StoredArtifact`] describing the uploaded blob.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Rendering`] if the renderer fails; nothing is uploaded.
    /// - [`DocumentError::Scratch`] if the scratch file cannot be written.
    /// - [`DocumentError::StorageUploadFailure`] if the store rejects the upload.
    pub fn persist(
        &self,
        model: &DocumentModel,
        file_name: &str,
        container: &str,
    ) -> DocumentResult<StoredArtifact> {
        let bytes = self.renderer.render(model)?;

        let metadata = match &self.scratch_dir {
            Some(dir) => {
                let scratch = self.stage(dir, &bytes)?;
                let staged = std::fs::read(scratch.path()).map_err(DocumentError::Scratch);
                let uploaded = staged.and_then(|staged| self.upload(container, file_name, &staged));
                discard(scratch);
                uploaded?
            }
            None => self.upload(container, file_name, &bytes)?,
        };

        tracing::info!(
            container,
            key = file_name,
            size_bytes = metadata.size_bytes,
            sha256 = %metadata.sha256,
            "uploaded document artifact"
        );

        Ok(StoredArtifact {
            container: container.to_owned(),
            key: file_name.to_owned(),
            media_type: self.media_type(),
            metadata,
        })
    }

    /// Download a previously stored artifact.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::ArtifactNotFound`] if nothing is stored under the name, or
    /// [`DocumentError::StorageRead`] if the store fails.
    pub fn fetch(&self, container: &str, file_name: &str) -> DocumentResult<Vec<u8>> {
        self.store.get(container, file_name).map_err(|err| {
            if err.is_not_found() {
                DocumentError::ArtifactNotFound {
                    container: container.to_owned(),
                    key: file_name.to_owned(),
                }
            } else {
                DocumentError::StorageRead(err)
            }
        })
    }

    fn stage(&self, dir: &Path, bytes: &[u8]) -> DocumentResult<NamedTempFile> {
        let suffix = format!(".{}", self.extension());
        let mut scratch = tempfile::Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(DocumentError::Scratch)?;
        scratch.write_all(bytes).map_err(DocumentError::Scratch)?;
        scratch.flush().map_err(DocumentError::Scratch)?;
        tracing::debug!(path = %scratch.path().display(), "staged scratch file");
        Ok(scratch)
    }

    fn upload(&self, container: &str, file_name: &str, bytes: &[u8]) -> DocumentResult<BlobMetadata> {
        self.store
            .put(container, file_name, bytes)
            .map_err(|source| DocumentError::StorageUploadFailure {
                container: container.to_owned(),
                key: file_name.to_owned(),
                source,
            })
    }
}

/// Remove a scratch file, logging rather than failing if removal does not succeed.
fn discard(scratch: NamedTempFile) {
    let path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        tracing::warn!(path = %path.display(), error = %err, "failed to remove scratch file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Paragraph;
    use pdoc_files::{FilesError, MemoryBlobStore};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct TextRenderer;

    impl DocumentRenderer for TextRenderer {
        fn render(&self, model: &DocumentModel) -> DocumentResult<Vec<u8>> {
            let text: Vec<String> = model.paragraphs().map(Paragraph::plain_text).collect();
            Ok(text.join("\n").into_bytes())
        }

        fn extension(&self) -> &'static str {
            "docx"
        }

        fn media_type(&self) -> &'static str {
            "text/plain"
        }
    }

    struct BrokenRenderer;

    impl DocumentRenderer for BrokenRenderer {
        fn render(&self, _model: &DocumentModel) -> DocumentResult<Vec<u8>> {
            Err(DocumentError::Rendering("no fonts".into()))
        }

        fn extension(&self) -> &'static str {
            "pdf"
        }

        fn media_type(&self) -> &'static str {
            "application/pdf"
        }
    }

    /// Records how many scratch files existed at upload time, then optionally fails.
    struct ProbeStore {
        scratch_dir: PathBuf,
        fail: bool,
        scratch_files_seen: Mutex<Vec<usize>>,
        inner: MemoryBlobStore,
    }

    impl ProbeStore {
        fn new(scratch_dir: &Path, fail: bool) -> Self {
            Self {
                scratch_dir: scratch_dir.to_path_buf(),
                fail,
                scratch_files_seen: Mutex::new(Vec::new()),
                inner: MemoryBlobStore::new(),
            }
        }
    }

    impl BlobStore for ProbeStore {
        fn put(&self, container: &str, key: &str, bytes: &[u8]) -> Result<BlobMetadata, FilesError> {
            let count = scratch_files(&self.scratch_dir);
            self.scratch_files_seen.lock().unwrap().push(count);
            if self.fail {
                return Err(FilesError::Unavailable("injected failure".into()));
            }
            self.inner.put(container, key, bytes)
        }

        fn get(&self, container: &str, key: &str) -> Result<Vec<u8>, FilesError> {
            self.inner.get(container, key)
        }
    }

    fn scratch_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_FILE_PREFIX))
            .count()
    }

    fn model() -> DocumentModel {
        let mut model = DocumentModel::new("123 Patient Health Data");
        model.paragraph(Paragraph::text("Name: Ms. Ann Smith"));
        model
    }

    #[test]
    fn uploads_under_artifact_name_and_cleans_scratch() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ProbeStore::new(temp.path(), false));
        let persister = ArtifactPersister::new(
            Arc::new(TextRenderer),
            store.clone(),
            Some(temp.path().to_path_buf()),
        );

        let stored = persister
            .persist(&model(), "123 health data.docx", "patienthealthdata")
            .unwrap();

        assert_eq!(stored.container, "patienthealthdata");
        assert_eq!(stored.key, "123 health data.docx");
        assert_eq!(stored.metadata.size_bytes, "Name: Ms. Ann Smith".len() as u64);
        assert_eq!(*store.scratch_files_seen.lock().unwrap(), vec![1]);
        assert_eq!(scratch_files(temp.path()), 0);
        assert_eq!(
            persister.fetch("patienthealthdata", "123 health data.docx").unwrap(),
            b"Name: Ms. Ann Smith"
        );
    }

    #[test]
    fn failed_upload_reports_target_and_still_cleans_scratch() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ProbeStore::new(temp.path(), true));
        let persister = ArtifactPersister::new(
            Arc::new(TextRenderer),
            store.clone(),
            Some(temp.path().to_path_buf()),
        );

        let err = persister
            .persist(&model(), "123 health data.docx", "patienthealthdata")
            .unwrap_err();

        match err {
            DocumentError::StorageUploadFailure { container, key, .. } => {
                assert_eq!(container, "patienthealthdata");
                assert_eq!(key, "123 health data.docx");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*store.scratch_files_seen.lock().unwrap(), vec![1]);
        assert_eq!(scratch_files(temp.path()), 0);
    }

    #[test]
    fn rendering_failure_uploads_nothing() {
        let store = Arc::new(MemoryBlobStore::new());
        let persister = ArtifactPersister::new(Arc::new(BrokenRenderer), store.clone(), None);

        let err = persister.persist(&model(), "123 health data.pdf", "patienthealthdata");
        assert!(matches!(err, Err(DocumentError::Rendering(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn in_memory_upload_without_scratch_dir() {
        let store = Arc::new(MemoryBlobStore::new());
        let persister = ArtifactPersister::new(Arc::new(TextRenderer), store.clone(), None);

        persister
            .persist(&model(), "123 feedback request.docx", "feedbackforms")
            .unwrap();
        assert_eq!(store.keys("feedbackforms"), vec!["123 feedback request.docx"]);
    }

    #[test]
    fn concurrent_persists_never_share_scratch_files() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let persister = ArtifactPersister::new(
            Arc::new(TextRenderer),
            store.clone(),
            Some(temp.path().to_path_buf()),
        );

        std::thread::scope(|scope| {
            for id in 0..8 {
                let persister = &persister;
                scope.spawn(move || {
                    persister
                        .persist(&model(), &format!("{id} health data.docx"), "patienthealthdata")
                        .unwrap();
                });
            }
        });

        assert_eq!(store.len(), 8);
        assert_eq!(scratch_files(temp.path()), 0);
    }

    #[test]
    fn fetch_distinguishes_missing_from_failure() {
        let persister =
            ArtifactPersister::new(Arc::new(TextRenderer), Arc::new(MemoryBlobStore::new()), None);
        let err = persister.fetch("patienthealthdata", "999 health data.pdf").unwrap_err();
        assert!(matches!(err, DocumentError::ArtifactNotFound { .. }));
    }
}

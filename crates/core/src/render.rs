//! Document rendering seam.

use crate::document::DocumentModel;
use crate::DocumentResult;

/// Turns a [`DocumentModel`] into a binary document.
pub trait DocumentRenderer: Send + Sync {
    /// Render the whole model into memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DocumentError::Rendering`] if the backend fails. Nothing is persisted in
    /// that case.
    fn render(&self, model: &DocumentModel) -> DocumentResult<Vec<u8>>;

    /// File extension of rendered artifacts, without the dot.
    fn extension(&self) -> &'static str;

    /// MIME type of rendered artifacts.
    fn media_type(&self) -> &'static str;
}

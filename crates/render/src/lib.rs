//! # Patient Documents Rendering
//!
//! Concrete backends for the rendering seams defined in `pdoc-core`:
//!
//! - [`PdfRenderer`]: paginated A4 PDF via `printpdf`
//! - [`MarkdownRenderer`]: deterministic Markdown with inline base64 images
//! - [`PlottersChartRenderer`]: PNG scatter charts of a vital-sign series via `plotters`, labelled
//!   with a bundled DejaVu Sans font
//!
//! Every backend renders fully in memory. Backend failures are reported as
//! [`pdoc_core::DocumentError::Rendering`].

mod chart;
mod markdown;
mod pdf;

pub use chart::{register_chart_font, PlottersChartRenderer};
pub use markdown::MarkdownRenderer;
pub use pdf::PdfRenderer;

use pdoc_core::DocumentRenderer;
use std::str::FromStr;
use std::sync::Arc;

/// Document output format selectable at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Markdown,
}

impl OutputFormat {
    /// The renderer for this format.
    pub fn renderer(self) -> Arc<dyn DocumentRenderer> {
        match self {
            OutputFormat::Pdf => Arc::new(PdfRenderer::default()),
            OutputFormat::Markdown => Arc::new(MarkdownRenderer),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = pdoc_core::DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(pdoc_core::DocumentError::InvalidConfig(format!(
                "unknown output format '{other}' (expected 'pdf' or 'markdown')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parses_and_selects_renderer() {
        assert_eq!("PDF".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("docx".parse::<OutputFormat>().is_err());

        assert_eq!(OutputFormat::Pdf.renderer().extension(), "pdf");
        assert_eq!(OutputFormat::Markdown.renderer().media_type(), "text/markdown");
    }
}

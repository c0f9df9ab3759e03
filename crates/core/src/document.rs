//! Renderer-neutral document model.
//!
//! A [`DocumentModel`] is an ordered list of blocks produced by a builder, handed once to a
//! [`crate::DocumentRenderer`], and then dropped. It carries exactly the structure that affects
//! what a patient reads: which text appears, in what order, in which table cell, with which
//! emphasis. Page geometry and fonts are the renderer's business.

use pdoc_types::PatientId;
use std::fmt;
use std::str::FromStr;

use crate::config::ContainerNames;
use crate::DocumentError;

// ============================================================================
// DocumentKind
// ============================================================================

/// The three patient-facing documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Feedback,
    HealthData,
    PatientInfo,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Feedback,
        DocumentKind::HealthData,
        DocumentKind::PatientInfo,
    ];

    /// Label used in artifact names.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Feedback => "feedback request",
            DocumentKind::HealthData => "health data",
            DocumentKind::PatientInfo => "details",
        }
    }

    /// Short identifier used on the command line and in URLs.
    pub fn slug(self) -> &'static str {
        match self {
            DocumentKind::Feedback => "feedback",
            DocumentKind::HealthData => "health-data",
            DocumentKind::PatientInfo => "details",
        }
    }

    /// Artifact name: `"{patient id} {label}.{ext}"`, e.g. `"123 health data.pdf"`.
    pub fn artifact_name(self, patient_id: &PatientId, extension: &str) -> String {
        format!("{} {}.{}", patient_id, self.label(), extension)
    }

    /// The configured container for this kind.
    pub fn container(self, containers: &ContainerNames) -> &str {
        match self {
            DocumentKind::Feedback => containers.feedback(),
            DocumentKind::HealthData => containers.health_data(),
            DocumentKind::PatientInfo => containers.patient_info(),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for DocumentKind {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(DocumentKind::Feedback),
            "health-data" | "health" => Ok(DocumentKind::HealthData),
            "details" | "patient-info" => Ok(DocumentKind::PatientInfo),
            other => Err(DocumentError::InvalidConfig(format!(
                "unknown document kind '{other}' (expected feedback, health-data or details)"
            ))),
        }
    }
}

// ============================================================================
// Blocks
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// A run of text on its own line within a paragraph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// Lines of text, optionally followed by a blank line and a response line to write on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub lines: Vec<TextRun>,
    pub alignment: Alignment,
    pub response_line: bool,
}

impl Paragraph {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            lines: vec![TextRun::plain(text)],
            ..Self::default()
        }
    }

    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(TextRun::plain).collect(),
            ..Self::default()
        }
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_response_line(mut self) -> Self {
        self.response_line = true;
        self
    }

    /// Plain text of all lines joined with `\n`.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Cell text; embedded `\n` add blank lines, which is how answer boxes get their height.
    pub text: String,
    pub bold: bool,
    pub centered: bool,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Bold, centred header cell.
    pub fn header(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            centered: true,
        }
    }

    /// Number of text lines the cell occupies (at least one).
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count().max(1)
    }
}

/// Fixed-layout table. Every row has the same number of cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    rows: Vec<Vec<Cell>>,
    /// Draw cell borders.
    pub grid: bool,
}

impl Table {
    /// A `rows` x `columns` table of empty cells.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows: vec![vec![Cell::default(); columns]; rows],
            grid: true,
        }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Replace one cell; out-of-range positions are ignored so the layout never changes shape.
    pub fn set(&mut self, row: usize, column: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *slot = cell;
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// An embedded raster image.
#[derive(Clone, PartialEq)]
pub struct Image {
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    /// Height the image should occupy on the page.
    pub display_height_inches: f32,
    pub alt: String,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("png", &format_args!("<{} bytes>", self.png.len()))
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("display_height_inches", &self.display_height_inches)
            .field("alt", &self.alt)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// Document title, rendered large.
    Title(String),
    /// Bold sub-heading.
    Heading(String),
    Paragraph(Paragraph),
    Table(Table),
    Image(Image),
}

// ============================================================================
// DocumentModel
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentModel {
    /// Document metadata title (the visible title is a [`Block::Title`]).
    pub title: String,
    pub blocks: Vec<Block>,
}

impl DocumentModel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn title_block(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Block::Title(text.into()))
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(Block::Heading(text.into()))
    }

    pub fn paragraph(&mut self, paragraph: Paragraph) -> &mut Self {
        self.push(Block::Paragraph(paragraph))
    }

    pub fn table(&mut self, table: Table) -> &mut Self {
        self.push(Block::Table(table))
    }

    pub fn image(&mut self, image: Image) -> &mut Self {
        self.push(Block::Image(image))
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Heading(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Image(i) => Some(i),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_id_label_extension() {
        let id = PatientId::parse("123").unwrap();
        assert_eq!(DocumentKind::Feedback.artifact_name(&id, "pdf"), "123 feedback request.pdf");
        assert_eq!(DocumentKind::HealthData.artifact_name(&id, "docx"), "123 health data.docx");
        assert_eq!(DocumentKind::PatientInfo.artifact_name(&id, "md"), "123 details.md");
    }

    #[test]
    fn kinds_parse_from_slugs() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.slug().parse::<DocumentKind>().unwrap(), kind);
        }
        assert!("letters".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn table_keeps_its_shape() {
        let mut table = Table::new(2, 4);
        table.set(0, 3, Cell::header("Extremely Unlikely"));
        table.set(5, 5, Cell::text("ignored"));
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 4);
        assert!(table.cell(0, 3).unwrap().bold);
        assert_eq!(Cell::text("\n\n").line_count(), 3);
        assert_eq!(Cell::default().line_count(), 1);
    }
}

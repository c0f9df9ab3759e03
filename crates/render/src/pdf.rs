//! PDF document backend via `printpdf`.
//!
//! A simple top-to-bottom flow layout on A4 pages. Text uses the built-in Helvetica faces, so
//! line widths are estimated from an average glyph width rather than measured.

use pdoc_core::{
    Alignment, Block, DocumentError, DocumentModel, DocumentRenderer, DocumentResult, Image,
    Paragraph, Table,
};
use printpdf::{
    BuiltinFont, Color, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use std::io::BufWriter;

// ============================================================================
// Page geometry
// ============================================================================

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

const TITLE_PT: f32 = 18.0;
const HEADING_PT: f32 = 13.0;
const BODY_PT: f32 = 11.0;
const TABLE_PT: f32 = 10.0;

const PT_TO_MM: f32 = 0.352_778;
const LINE_SPACING: f32 = 1.4;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;
const CELL_PADDING_MM: f32 = 2.0;
const BLOCK_GAP_MM: f32 = 3.0;
const LAYER_NAME: &str = "Layer 1";

fn line_height(size_pt: f32) -> f32 {
    size_pt * PT_TO_MM * LINE_SPACING
}

fn text_width(text: &str, size_pt: f32) -> f32 {
    text.chars().count() as f32 * size_pt * PT_TO_MM * AVG_GLYPH_EM
}

fn chars_per_line(width_mm: f32, size_pt: f32) -> usize {
    ((width_mm / (size_pt * PT_TO_MM * AVG_GLYPH_EM)).floor() as usize).max(1)
}

/// Greedy word wrap. Words longer than a line are split; blank input yields one blank line.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..max_chars).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

// ============================================================================
// PdfRenderer
// ============================================================================

/// Renders a document model as an A4 PDF.
#[derive(Clone, Debug, Default)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, model: &DocumentModel) -> DocumentResult<Vec<u8>> {
        layout(model)?.finish()
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn media_type(&self) -> &'static str {
        "application/pdf"
    }
}

fn layout(model: &DocumentModel) -> DocumentResult<PageWriter> {
    let mut writer = PageWriter::new(&model.title)?;
    for block in &model.blocks {
        match block {
            Block::Title(text) => writer.heading(text, TITLE_PT),
            Block::Heading(text) => writer.heading(text, HEADING_PT),
            Block::Paragraph(paragraph) => writer.paragraph(paragraph),
            Block::Table(table) => writer.table(table),
            Block::Image(image) => writer.image(image)?,
        }
    }
    Ok(writer)
}

fn pdf_error(context: &str) -> impl FnOnce(printpdf::Error) -> DocumentError + '_ {
    move |err| DocumentError::Rendering(format!("PDF {context} error: {err}"))
}

// ============================================================================
// PageWriter
// ============================================================================

/// Flow-layout cursor over the pages of one document.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Top of the next line, in mm from the bottom of the page.
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> DocumentResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error("font"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error("font"))?;

        let writer = Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT_MM - MARGIN_MM,
            pages: 1,
        };
        writer.reset_colors();
        Ok(writer)
    }

    fn reset_colors(&self) {
        self.layer.set_fill_color(black());
        self.layer.set_outline_color(black());
        self.layer.set_outline_thickness(0.5);
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        self.pages += 1;
        self.reset_colors();
    }

    /// Start a new page unless `needed` mm fit above the bottom margin.
    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < MARGIN_MM && self.y < PAGE_HEIGHT_MM - MARGIN_MM {
            self.new_page();
        }
    }

    fn font(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    /// Write one already-wrapped line at the cursor and advance.
    fn line(&mut self, text: &str, size_pt: f32, bold: bool, alignment: Alignment) {
        let height = line_height(size_pt);
        self.ensure_space(height);

        let x = match alignment {
            Alignment::Left => MARGIN_MM,
            Alignment::Center => MARGIN_MM + (CONTENT_WIDTH_MM - text_width(text, size_pt)) / 2.0,
            Alignment::Right => PAGE_WIDTH_MM - MARGIN_MM - text_width(text, size_pt),
        }
        .max(MARGIN_MM);
        let baseline = self.y - size_pt * PT_TO_MM;

        if !text.is_empty() {
            self.layer
                .use_text(text, size_pt, Mm(x), Mm(baseline), self.font(bold));
        }
        self.y -= height;
    }

    fn rule(&self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(y1)), false),
                (Point::new(Mm(x2), Mm(y2)), false),
            ],
            is_closed: false,
        });
    }

    fn heading(&mut self, text: &str, size_pt: f32) {
        for line in wrap(text, chars_per_line(CONTENT_WIDTH_MM, size_pt)) {
            self.line(&line, size_pt, true, Alignment::Left);
        }
        self.y -= BLOCK_GAP_MM;
    }

    fn paragraph(&mut self, paragraph: &Paragraph) {
        let max_chars = chars_per_line(CONTENT_WIDTH_MM, BODY_PT);
        for run in &paragraph.lines {
            for line in wrap(&run.text, max_chars) {
                self.line(&line, BODY_PT, run.bold, paragraph.alignment);
            }
        }

        if paragraph.response_line {
            let gap = line_height(BODY_PT);
            self.ensure_space(gap);
            self.y -= gap;
            self.rule(MARGIN_MM, self.y, PAGE_WIDTH_MM - MARGIN_MM, self.y);
        }
        self.y -= BLOCK_GAP_MM;
    }

    fn table(&mut self, table: &Table) {
        let columns = table.column_count();
        if columns == 0 {
            return;
        }
        let column_width = CONTENT_WIDTH_MM / columns as f32;
        let max_chars = chars_per_line(column_width - 2.0 * CELL_PADDING_MM, TABLE_PT);
        let height = line_height(TABLE_PT);

        for row in table.rows() {
            let cells: Vec<Vec<String>> = row
                .iter()
                .map(|cell| {
                    cell.text
                        .split('\n')
                        .flat_map(|segment| wrap(segment, max_chars))
                        .collect()
                })
                .collect();
            let row_lines = cells.iter().map(Vec::len).max().unwrap_or(1);
            let row_height = row_lines as f32 * height + 2.0 * CELL_PADDING_MM;
            self.ensure_space(row_height);

            let top = self.y;
            for (column, (cell, lines)) in row.iter().zip(&cells).enumerate() {
                let left = MARGIN_MM + column as f32 * column_width;
                for (index, line) in lines.iter().enumerate() {
                    if line.is_empty() {
                        continue;
                    }
                    let x = if cell.centered {
                        left + (column_width - text_width(line, TABLE_PT)) / 2.0
                    } else {
                        left + CELL_PADDING_MM
                    };
                    let baseline =
                        top - CELL_PADDING_MM - index as f32 * height - TABLE_PT * PT_TO_MM;
                    self.layer
                        .use_text(line, TABLE_PT, Mm(x.max(left)), Mm(baseline), self.font(cell.bold));
                }
                if table.grid {
                    self.layer.add_line(Line {
                        points: vec![
                            (Point::new(Mm(left), Mm(top)), false),
                            (Point::new(Mm(left + column_width), Mm(top)), false),
                            (Point::new(Mm(left + column_width), Mm(top - row_height)), false),
                            (Point::new(Mm(left), Mm(top - row_height)), false),
                        ],
                        is_closed: true,
                    });
                }
            }
            self.y = top - row_height;
        }
        self.y -= BLOCK_GAP_MM;
    }

    fn image(&mut self, image: &Image) -> DocumentResult<()> {
        let decoded = printpdf::image_crate::load_from_memory(&image.png)
            .map_err(|e| DocumentError::Rendering(format!("invalid chart image '{}': {e}", image.alt)))?;

        let display_inches = if image.display_height_inches > 0.0 {
            image.display_height_inches
        } else {
            1.0
        };
        let mut dpi = image.height_px.max(1) as f32 / display_inches;
        let mut width_mm = image.width_px as f32 / dpi * 25.4;
        let mut height_mm = display_inches * 25.4;
        if width_mm > CONTENT_WIDTH_MM {
            let scale = CONTENT_WIDTH_MM / width_mm;
            dpi /= scale;
            width_mm = CONTENT_WIDTH_MM;
            height_mm *= scale;
        }

        self.ensure_space(height_mm);
        let x = MARGIN_MM + (CONTENT_WIDTH_MM - width_mm) / 2.0;
        printpdf::Image::from_dynamic_image(&decoded).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(self.y - height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.y -= height_mm + BLOCK_GAP_MM;
        Ok(())
    }

    fn finish(self) -> DocumentResult<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(pdf_error("save"))?;
        buf.into_inner()
            .map_err(|e| DocumentError::Rendering(format!("PDF buffer error: {e}")))
    }
}

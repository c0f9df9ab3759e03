//! Markdown document backend.

use base64::Engine as _;
use pdoc_core::constants::RESPONSE_LINE;
use pdoc_core::{
    Alignment, Block, DocumentModel, DocumentRenderer, DocumentResult, Image, Paragraph, Table,
    TextRun,
};

/// Renders a document model as Markdown.
///
/// Output is deterministic: the same model always yields the same bytes. Aligned paragraphs
/// become `<p align=...>` blocks, tables become pipe tables with the first row as the header,
/// and images are embedded as base64 `data:` URIs so the artifact is self-contained.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn render(&self, model: &DocumentModel) -> DocumentResult<Vec<u8>> {
        let sections: Vec<String> = model.blocks.iter().map(render_block).collect();
        let mut out = sections.join("\n\n");
        out.push('\n');
        Ok(out.into_bytes())
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn media_type(&self) -> &'static str {
        "text/markdown"
    }
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Title(text) => format!("# {}", escape(text)),
        Block::Heading(text) => format!("## {}", escape(text)),
        Block::Paragraph(paragraph) => render_paragraph(paragraph),
        Block::Table(table) => render_table(table),
        Block::Image(image) => render_image(image),
    }
}

fn render_run(run: &TextRun) -> String {
    if run.bold && !run.text.trim().is_empty() {
        format!("**{}**", escape(&run.text))
    } else {
        escape(&run.text)
    }
}

fn render_paragraph(paragraph: &Paragraph) -> String {
    let runs: Vec<String> = paragraph.lines.iter().map(render_run).collect();

    let mut out = match paragraph.alignment {
        Alignment::Left => runs.join("  \n"),
        Alignment::Center => format!("<p align=\"center\">{}</p>", runs.join("<br>")),
        Alignment::Right => format!("<p align=\"right\">{}</p>", runs.join("<br>")),
    };
    if paragraph.response_line {
        out.push_str("\n\n");
        out.push_str(RESPONSE_LINE);
    }
    out
}

fn render_table(table: &Table) -> String {
    let rows = table.rows();
    let Some(header) = rows.first() else {
        return String::new();
    };

    let render_row = |row: &[pdoc_core::Cell]| {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                let text = escape(&cell.text).replace('|', "\\|").replace('\n', "<br>");
                if cell.bold && !cell.text.trim().is_empty() {
                    format!("**{text}**")
                } else {
                    text
                }
            })
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let separator: Vec<&str> = header
        .iter()
        .map(|cell| if cell.centered { ":---:" } else { "---" })
        .collect();

    let mut lines = vec![render_row(header.as_slice()), format!("| {} |", separator.join(" | "))];
    lines.extend(rows.iter().skip(1).map(|row| render_row(row.as_slice())));
    lines.join("\n")
}

fn render_image(image: &Image) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image.png);
    format!("![{}](data:image/png;base64,{})", escape(&image.alt), encoded)
}

/// Escape characters that would otherwise start Markdown emphasis or links.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '_' | '[' | ']' | '`' | '#' | '<' | '>') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdoc_core::{Cell, Paragraph, Table};

    fn render(model: &DocumentModel) -> String {
        String::from_utf8(MarkdownRenderer.render(model).unwrap()).unwrap()
    }

    #[test]
    fn renders_blocks_in_order() {
        let mut model = DocumentModel::new("123 Patient Details");
        model
            .title_block("Patient Details")
            .heading("Heart rate")
            .paragraph(Paragraph::text("Patient ID: 123").with_response_line());

        assert_eq!(
            render(&model),
            format!("# Patient Details\n\n## Heart rate\n\nPatient ID: 123\n\n{RESPONSE_LINE}\n")
        );
    }

    #[test]
    fn right_aligned_multi_line_paragraph() {
        let mut model = DocumentModel::new("letter");
        model.paragraph(Paragraph::lines(["12 High Street", "Leeds"]).aligned(Alignment::Right));
        assert_eq!(render(&model), "<p align=\"right\">12 High Street<br>Leeds</p>\n");
    }

    #[test]
    fn tables_use_first_row_as_header() {
        let mut table = Table::new(2, 2);
        table.set(0, 0, Cell::header("Likely"));
        table.set(0, 1, Cell::header("Unlikely"));
        table.set(1, 0, Cell::text("\n"));
        let mut model = DocumentModel::new("t");
        model.table(table);

        assert_eq!(
            render(&model),
            "| **Likely** | **Unlikely** |\n| :---: | :---: |\n| <br> |  |\n"
        );
    }

    #[test]
    fn images_are_inline_data_uris() {
        let mut model = DocumentModel::new("img");
        model.image(Image {
            png: vec![1, 2, 3],
            width_px: 1,
            height_px: 1,
            display_height_inches: 3.5,
            alt: "Heart rate chart".into(),
        });
        assert_eq!(render(&model), "![Heart rate chart](data:image/png;base64,AQID)\n");
    }

    #[test]
    fn markdown_metacharacters_are_escaped() {
        let mut model = DocumentModel::new("x");
        model.paragraph(Paragraph::text("a_b *c*"));
        assert_eq!(render(&model), "a\\_b \\*c\\*\n");
    }
}

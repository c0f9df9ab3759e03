use super::{join_words, DocumentBuilder};
use crate::catalog::FeedbackText;
use crate::document::{Alignment, Cell, DocumentKind, DocumentModel, Paragraph, Table};
use crate::DocumentResult;
use fhir::PatientIdentity;
use pdoc_types::PatientId;

/// Feedback request letter.
///
/// Layout, top to bottom: right-aligned address block, title, greeting, intro, hospital and
/// clinic questions each with a response line, the recommendation question with its tick
/// instruction and a 2x4 Likert table, then the comment prompt and a single-cell answer box.
#[derive(Debug)]
pub struct FeedbackDocument<'a> {
    patient_id: &'a PatientId,
    identity: &'a PatientIdentity,
    text: &'a FeedbackText,
}

impl<'a> FeedbackDocument<'a> {
    pub fn new(patient_id: &'a PatientId, identity: &'a PatientIdentity, text: &'a FeedbackText) -> Self {
        Self {
            patient_id,
            identity,
            text,
        }
    }

    fn address_block(&self) -> Paragraph {
        let address = &self.identity.address;
        let lines = address
            .address_lines
            .iter()
            .chain([&address.city, &address.state, &address.postcode, &address.country])
            .map(|line| line.trim())
            .filter(|line| !line.is_empty());
        Paragraph::lines(lines).aligned(Alignment::Right)
    }

    fn greeting(&self) -> Paragraph {
        let name = join_words([
            self.identity.prefix.as_str(),
            self.identity.first_name.as_str(),
            self.identity.last_name.as_str(),
        ]);
        Paragraph::text(format!("{} {},", self.text.greeting.trim_end(), name))
    }

    fn likert_table(&self) -> Table {
        let mut table = Table::new(2, self.text.likert_options.len());
        for (column, option) in self.text.likert_options.iter().enumerate() {
            table.set(0, column, Cell::header(option.as_str()));
            table.set(1, column, Cell::text("\n"));
        }
        table
    }

    fn comment_box(&self) -> Table {
        let mut table = Table::new(1, 1);
        table.set(0, 0, Cell::text("\n".repeat(self.text.comment_box_lines)));
        table
    }
}

impl DocumentBuilder for FeedbackDocument<'_> {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Feedback
    }

    fn build(&self) -> DocumentResult<DocumentModel> {
        let questions = &self.text.questions;
        let mut model = DocumentModel::new(format!("{} {}", self.patient_id, self.text.title));

        model
            .paragraph(self.address_block())
            .title_block(self.text.title.as_str())
            .paragraph(self.greeting())
            .paragraph(Paragraph::text(questions.intro.as_str()))
            .paragraph(Paragraph::text(questions.hospital.as_str()).with_response_line())
            .paragraph(Paragraph::text(questions.clinic.as_str()).with_response_line())
            .paragraph(Paragraph::lines([
                questions.recommendation.as_str(),
                self.text.tick_instruction.as_str(),
            ]))
            .table(self.likert_table())
            .paragraph(Paragraph::lines(["", questions.comment.as_str()]))
            .table(self.comment_box());

        tracing::debug!(patient_id = %self.patient_id, blocks = model.blocks.len(), "built feedback document");
        Ok(model)
    }
}

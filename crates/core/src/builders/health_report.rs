use super::DocumentBuilder;
use crate::catalog::HealthReportText;
use crate::chart::{ChartImage, ChartRenderer};
use crate::constants::CHART_DISPLAY_HEIGHT_INCHES;
use crate::document::{DocumentKind, DocumentModel, Image, Paragraph};
use crate::vitals::VitalSeriesSet;
use crate::{DocumentError, DocumentResult};
use pdoc_types::PatientId;

/// Vital-signs report: one section (heading + chart) per series, in aggregation order.
///
/// Charts are rendered in parallel on scoped threads, one per series, and assembled in series
/// order. A series whose timestamps cannot be parsed keeps its heading and gets a "chart
/// unavailable" paragraph instead of an image; any other chart failure fails the report.
pub struct HealthReportDocument<'a> {
    patient_id: &'a PatientId,
    full_name: &'a str,
    series: &'a VitalSeriesSet,
    charts: &'a dyn ChartRenderer,
    text: &'a HealthReportText,
}

impl<'a> HealthReportDocument<'a> {
    pub fn new(
        patient_id: &'a PatientId,
        full_name: &'a str,
        series: &'a VitalSeriesSet,
        charts: &'a dyn ChartRenderer,
        text: &'a HealthReportText,
    ) -> Self {
        Self {
            patient_id,
            full_name,
            series,
            charts,
            text,
        }
    }

    /// Render every chart, returning results in series order.
    fn render_charts(&self) -> Vec<DocumentResult<ChartImage>> {
        let charts = self.charts;

        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .series
                .iter()
                .map(|series| scope.spawn(move || charts.render_chart(series, series.label())))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(DocumentError::Rendering("chart renderer panicked".into()))
                    })
                })
                .collect()
        })
    }
}

impl DocumentBuilder for HealthReportDocument<'_> {
    fn kind(&self) -> DocumentKind {
        DocumentKind::HealthData
    }

    fn build(&self) -> DocumentResult<DocumentModel> {
        let mut model = DocumentModel::new(format!("{} {}", self.patient_id, self.text.title));
        model
            .title_block(self.text.title.as_str())
            .paragraph(Paragraph::text(format!("{}{}", self.text.name_label, self.full_name)))
            .paragraph(Paragraph::text(format!("{}{}", self.text.id_label, self.patient_id)))
            .paragraph(Paragraph::text(self.text.explanation.as_str()));

        let rendered = self.render_charts();
        for (series, chart) in self.series.iter().zip(rendered) {
            model.heading(series.label());
            match chart {
                Ok(chart) => {
                    model.image(Image {
                        png: chart.png,
                        width_px: chart.width_px,
                        height_px: chart.height_px,
                        display_height_inches: CHART_DISPLAY_HEIGHT_INCHES,
                        alt: format!("{} chart", series.label()),
                    });
                }
                Err(DocumentError::MalformedTimestamp { series: label, value }) => {
                    tracing::warn!(
                        patient_id = %self.patient_id,
                        vital_sign = %label,
                        timestamp = %value,
                        "skipping chart with malformed timestamp"
                    );
                    model.paragraph(Paragraph::text(self.text.chart_unavailable.as_str()));
                }
                Err(other) => return Err(other),
            }
        }

        tracing::debug!(
            patient_id = %self.patient_id,
            sections = self.series.len(),
            "built health report"
        );
        Ok(model)
    }
}

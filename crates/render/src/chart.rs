//! Vital-sign charts via `plotters`.

use chrono::{DateTime, NaiveDateTime};
use pdoc_core::{parse_series, ChartImage, ChartRenderer, DocumentError, DocumentResult, VitalSignSeries};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use printpdf::image_crate::{DynamicImage, ImageFormat, RgbImage};
use std::ops::Range;
use std::sync::Once;

const SECONDS_PER_DAY: f64 = 86_400.0;
const POINT_COLOR: RGBColor = RGBColor(255, 165, 0);
const FONT_FAMILY: &str = "sans-serif";

/// DejaVu Sans, see `assets/DejaVuSans-LICENSE.txt`.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
static BUNDLED_FONT_REGISTERED: Once = Once::new();

fn register_bundled_font() {
    BUNDLED_FONT_REGISTERED.call_once(|| {
        if register_font(FONT_FAMILY, FontStyle::Normal, BUNDLED_FONT).is_err() {
            tracing::warn!("bundled chart font could not be loaded");
        }
    });
}

/// Replace the bundled chart font with a TrueType/OpenType font of your own.
///
/// The font bytes live for the rest of the process, so call this once at startup.
///
/// # Errors
///
/// Returns [`DocumentError::InvalidConfig`] if the bytes are not a usable font. The bundled
/// font stays in place in that case.
pub fn register_chart_font(font: Vec<u8>) -> DocumentResult<()> {
    register_bundled_font();
    let bytes: &'static [u8] = Box::leak(font.into_boxed_slice());
    register_font(FONT_FAMILY, FontStyle::Normal, bytes).map_err(|_| {
        DocumentError::InvalidConfig("chart font is not a valid TrueType/OpenType font".into())
    })
}

/// Date-scaled scatter chart of one series, encoded as PNG.
///
/// The X axis is the reading date, the Y axis is labelled with the series unit and the caption
/// is the chart title. Text uses the bundled DejaVu Sans unless [`register_chart_font`] has
/// installed another font. If labels cannot be drawn the chart is drawn without text rather
/// than failing the report.
#[derive(Clone, Copy, Debug)]
pub struct PlottersChartRenderer {
    width: u32,
    height: u32,
}

impl PlottersChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        register_bundled_font();
        Self { width, height }
    }
}

impl Default for PlottersChartRenderer {
    fn default() -> Self {
        Self::new(800, 500)
    }
}

impl ChartRenderer for PlottersChartRenderer {
    fn render_chart(&self, series: &VitalSignSeries, title: &str) -> DocumentResult<ChartImage> {
        let readings = parse_series(series)?;
        let points: Vec<(f64, f64)> = readings
            .iter()
            .map(|(at, value)| (day_number(at), *value))
            .collect();

        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];
        let labelled = draw(&mut buffer, (self.width, self.height), &points, Some((title, series.unit())));
        if let Err(err) = labelled {
            tracing::warn!(
                vital_sign = series.label(),
                error = %err,
                "drawing chart without labels"
            );
            draw(&mut buffer, (self.width, self.height), &points, None)
                .map_err(|e| DocumentError::Rendering(format!("chart for {}: {e}", series.label())))?;
        }

        let png = encode_png(buffer, self.width, self.height)?;
        Ok(ChartImage {
            png,
            width_px: self.width,
            height_px: self.height,
        })
    }
}

/// Fractional days since the Unix epoch.
fn day_number(at: &NaiveDateTime) -> f64 {
    at.and_utc().timestamp() as f64 / SECONDS_PER_DAY
}

fn format_day(day: &f64) -> String {
    DateTime::from_timestamp((day * SECONDS_PER_DAY) as i64, 0)
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Axis range covering `values`, padded so single readings and flat series stay visible.
fn padded_range(values: impl Iterator<Item = f64>, empty: Range<f64>, min_pad: f64) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return empty;
    }
    let pad = ((hi - lo) * 0.1).max(min_pad);
    (lo - pad)..(hi + pad)
}

/// Draw the chart into an RGB buffer; `labels` carries `(title, unit)` when text is wanted.
fn draw(
    buffer: &mut [u8],
    size: (u32, u32),
    points: &[(f64, f64)],
    labels: Option<(&str, &str)>,
) -> Result<(), String> {
    let today = day_number(&chrono::Utc::now().naive_utc()).floor();
    let x_range = padded_range(points.iter().map(|p| p.0), (today - 1.0)..(today + 1.0), 1.0);
    let y_range = padded_range(points.iter().map(|p| p.1), 0.0..1.0, 1.0);

    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if let Some((title, _)) = labels {
        builder
            .caption(title, (FONT_FAMILY, 24))
            .x_label_area_size(40)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| e.to_string())?;

    if let Some((_, unit)) = labels {
        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&format_day)
            .x_desc("Date")
            .y_desc(unit)
            .draw()
            .map_err(|e| e.to_string())?;
    }

    chart
        .draw_series(points.iter().map(|(x, y)| Circle::new((*x, *y), 4, POINT_COLOR.filled())))
        .map_err(|e| e.to_string())?;

    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> DocumentResult<Vec<u8>> {
    let img = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| DocumentError::Rendering("chart buffer has the wrong size".into()))?;

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DocumentError::Rendering(format!("PNG encode error: {e}")))?;
    Ok(png)
}

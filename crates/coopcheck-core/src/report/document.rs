use std::ops::Range;

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

use crate::error::{PipelineError, Result};
use crate::report::{column_text, format_number, format_percentage, ReportContext, GUIDANCE};
use crate::validation::ComplianceCheck;

// A4 landscape, in millimetres.
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MAX_PAGE_W: f32 = 5000.0;
const MARGIN: f32 = 12.0;

const TITLE_PT: f32 = 16.0;
const HEADING_PT: f32 = 12.0;
const BODY_PT: f32 = 9.0;
const TABLE_PT: f32 = 7.0;

const LINE_H: f32 = 5.5;
const ROW_H: f32 = 4.5;
const TABLE_TOP: f32 = 22.0;

const MIN_COL_W: f32 = 14.0;
const MAX_COL_W: f32 = 48.0;
/// Approximate Helvetica advance per character at 1 pt, in millimetres.
const CHAR_W_PER_PT: f32 = 0.5 * 0.3528;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Builtin PDF fonts only cover Latin-1; anything else is replaced.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn truncate(text: &str, width_mm: f32, size_pt: f32) -> String {
    let max_chars = ((width_mm - 1.5) / (size_pt * CHAR_W_PER_PT)).floor().max(1.0) as usize;
    let text = printable(text);
    if text.chars().count() <= max_chars {
        text
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{kept}~")
    }
}

fn column_width(texts: &[String], header: &str) -> f32 {
    let longest = texts
        .iter()
        .map(|text| text.chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0) as f32;
    (longest * TABLE_PT * CHAR_W_PER_PT + 3.0).clamp(MIN_COL_W, MAX_COL_W)
}

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, size: f32, x: f32, y: f32, txt: &str) {
    layer.use_text(printable(txt), size, Mm(x), Mm(y), font);
}

fn rule(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32) {
    let line = Line::from_iter(
        std::iter::once((Point::new(Mm(x1), Mm(y)), false))
            .chain(std::iter::once((Point::new(Mm(x2), Mm(y)), false))),
    );
    layer.add_line(line);
}

/// Page cursor that writes lines top-down and opens a new A4 page when full.
struct TextPage<'a> {
    doc: &'a PdfDocumentReference,
    fonts: &'a Fonts,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> TextPage<'a> {
    fn new(doc: &'a PdfDocumentReference, fonts: &'a Fonts, layer: PdfLayerReference) -> Self {
        Self {
            doc,
            fonts,
            layer,
            y: PAGE_H - MARGIN,
        }
    }

    fn open(doc: &'a PdfDocumentReference, fonts: &'a Fonts) -> Self {
        let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        Self::new(doc, fonts, layer)
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - MARGIN;
        }
    }

    fn title(&mut self, txt: &str) {
        self.ensure_room(LINE_H * 2.0);
        self.y -= TITLE_PT * 0.3528;
        text(&self.layer, &self.fonts.bold, TITLE_PT, MARGIN, self.y, txt);
        self.y -= LINE_H;
    }

    fn heading(&mut self, txt: &str) {
        self.ensure_room(LINE_H * 2.0);
        self.y -= LINE_H;
        text(&self.layer, &self.fonts.bold, HEADING_PT, MARGIN, self.y, txt);
        self.y -= LINE_H * 0.5;
    }

    fn line(&mut self, txt: &str) {
        self.ensure_room(LINE_H);
        self.y -= LINE_H;
        text(&self.layer, &self.fonts.regular, BODY_PT, MARGIN, self.y, txt);
    }

    /// Fixed-width columns, header in bold.
    fn table(&mut self, header: &[String], rows: &[Vec<String>], widths: &[f32]) {
        self.ensure_room(ROW_H * 2.0);
        self.y -= ROW_H;
        let mut x = MARGIN;
        for (cell, width) in header.iter().zip(widths) {
            let cell = truncate(cell, *width, BODY_PT);
            text(&self.layer, &self.fonts.bold, BODY_PT, x, self.y, &cell);
            x += width;
        }
        rule(&self.layer, MARGIN, x, self.y - 1.2);

        for row in rows {
            self.ensure_room(ROW_H);
            self.y -= ROW_H + 0.5;
            let mut x = MARGIN;
            for (cell, width) in row.iter().zip(widths) {
                let cell = truncate(cell, *width, BODY_PT);
                text(&self.layer, &self.fonts.regular, BODY_PT, x, self.y, &cell);
                x += width;
            }
        }
    }
}

/// Renders the paginated PDF report: summary, merged data chunks,
/// correlation matrix, compliance summary and guidance.
pub fn render_document(context: &ReportContext<'_>) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(printable(context.title), Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| PipelineError::Document(err.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|err| PipelineError::Document(err.to_string()))?,
    };

    let first = doc.get_page(first_page).get_layer(first_layer);
    write_summary(&mut TextPage::new(&doc, &fonts, first), context);
    write_merged_pages(&doc, &fonts, context)?;

    let mut page = TextPage::open(&doc, &fonts);
    write_correlation(&mut page, context);
    write_compliance(&mut page, context);
    write_guidance(&mut page);

    doc.save_to_bytes()
        .map_err(|err| PipelineError::Document(err.to_string()))
}

fn write_summary(page: &mut TextPage<'_>, context: &ReportContext<'_>) {
    let sizing = context.fan_sizing;
    page.title(context.title);
    page.line(&format!(
        "Generated: {}",
        context.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    page.line(&format!("Cycle: {}", context.cycle));
    page.line(&format!("Merged rows: {}", context.merged.height()));

    page.heading("Fan sizing inputs");
    page.line(&format!(
        "Housing area: {} m2",
        format_number(sizing.housing_area_m2)
    ));
    page.line(&format!(
        "Fan capacity: {} m3/h",
        format_number(sizing.fan_capacity_m3h)
    ));
    page.line(&format!("Installed fans: {}", sizing.installed_fans));
    page.line(&format!("Population: {}", sizing.population));

    page.heading("Warnings");
    if context.warnings.is_empty() {
        page.line("None.");
    }
    for warning in context.warnings {
        page.line(&format!("- {warning}"));
    }
}

/// Row ranges of the merged-data pages, `rows_per_page` rows each. An empty
/// table still gets one (empty) page.
pub fn merged_page_ranges(total_rows: usize, rows_per_page: usize) -> Vec<Range<usize>> {
    let rows_per_page = rows_per_page.max(1);
    if total_rows == 0 {
        return vec![0..0];
    }
    (0..total_rows)
        .step_by(rows_per_page)
        .map(|start| start..(start + rows_per_page).min(total_rows))
        .collect()
}

fn write_merged_pages(
    doc: &PdfDocumentReference,
    fonts: &Fonts,
    context: &ReportContext<'_>,
) -> Result<()> {
    let df = context.merged;
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = df
        .get_columns()
        .iter()
        .map(column_text)
        .collect::<Result<Vec<Vec<String>>>>()?;
    let widths: Vec<f32> = columns
        .iter()
        .zip(&headers)
        .map(|(texts, header)| column_width(texts, header))
        .collect();

    let table_w: f32 = widths.iter().sum();
    let page_w = (table_w + 2.0 * MARGIN).clamp(PAGE_W, MAX_PAGE_W);
    let total = df.height();

    for range in merged_page_ranges(total, context.rows_per_page) {
        let (start, end) = (range.start, range.end);
        let rows = end - start;
        let page_h = (2.0 * MARGIN + TABLE_TOP + (rows as f32 + 1.0) * ROW_H).max(PAGE_H);

        let (page, layer) = doc.add_page(Mm(page_w), Mm(page_h), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let mut y = page_h - MARGIN - HEADING_PT * 0.3528;
        let caption = if total == 0 {
            "Merged data: no rows".to_string()
        } else {
            format!("Merged data: rows {}-{} of {}", start + 1, end, total)
        };
        text(&layer, &fonts.bold, HEADING_PT, MARGIN, y, &caption);

        y = page_h - MARGIN - TABLE_TOP;
        let mut x = MARGIN;
        for (header, width) in headers.iter().zip(&widths) {
            text(&layer, &fonts.bold, TABLE_PT, x, y, &truncate(header, *width, TABLE_PT));
            x += width;
        }
        rule(&layer, MARGIN, x, y - 1.2);

        for row in start..end {
            y -= ROW_H;
            let mut x = MARGIN;
            for (texts, width) in columns.iter().zip(&widths) {
                if !texts[row].is_empty() {
                    text(&layer, &fonts.regular, TABLE_PT, x, y, &truncate(&texts[row], *width, TABLE_PT));
                }
                x += width;
            }
        }
    }

    Ok(())
}

fn write_correlation(page: &mut TextPage<'_>, context: &ReportContext<'_>) {
    page.title("Environment vs production correlation (Pearson)");
    let Some(matrix) = context.correlation else {
        page.line("Some columns required for the correlation analysis were not found.");
        return;
    };

    let mut header = vec![String::new()];
    header.extend(matrix.production.iter().cloned());
    let rows: Vec<Vec<String>> = matrix
        .environment
        .iter()
        .zip(&matrix.values)
        .map(|(name, values)| {
            let mut row = vec![name.clone()];
            row.extend(values.iter().map(|value| {
                if value.is_finite() {
                    format!("{value:.2}")
                } else {
                    "n/a".to_string()
                }
            }));
            row
        })
        .collect();

    let first_w = 42.0;
    let rest_w = ((PAGE_W - 2.0 * MARGIN - first_w) / matrix.production.len().max(1) as f32)
        .min(MAX_COL_W);
    let mut widths = vec![first_w];
    widths.extend(std::iter::repeat(rest_w).take(matrix.production.len()));

    page.table(&header, &rows, &widths);
    page.line("Values near 1 or -1 indicate a strong linear relationship; n/a means undefined.");
}

fn write_compliance(page: &mut TextPage<'_>, context: &ReportContext<'_>) {
    let summary = context.compliance;
    page.heading("Environmental compliance");

    let header: Vec<String> = ["Check", "Passed", "Failed", "Unknown", "Compliance"]
        .iter()
        .map(|title| title.to_string())
        .collect();
    let rows: Vec<Vec<String>> = ComplianceCheck::ALL
        .iter()
        .map(|check| {
            let flag = summary.flag(*check);
            vec![
                check.label().to_string(),
                flag.passed.to_string(),
                flag.failed.to_string(),
                flag.unknown.to_string(),
                format_percentage(flag.percentage),
            ]
        })
        .collect();

    page.table(&header, &rows, &[40.0, 25.0, 25.0, 25.0, 30.0]);
    page.line(&format!(
        "Non-compliant rows: {} of {}",
        summary.non_compliant_rows, summary.total_rows
    ));
}

fn write_guidance(page: &mut TextPage<'_>) {
    page.heading("Guidance");
    for line in GUIDANCE {
        page.line(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_rows_are_chunked_per_page() {
        assert_eq!(merged_page_ranges(250, 100), vec![0..100, 100..200, 200..250]);
        assert_eq!(merged_page_ranges(100, 100), vec![0..100]);
        assert_eq!(merged_page_ranges(3, 1), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn empty_table_keeps_one_page() {
        assert_eq!(merged_page_ranges(0, 100), vec![0..0]);
        assert_eq!(merged_page_ranges(5, 0), vec![0..5]);
    }
}

use std::io::BufWriter;

use printpdf::*;

use crate::error::{DuesError, Result};
use crate::report::{ReconciliationReport, ReportColumn};

// US Letter dimensions (mm)
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN_TOP: f32 = 25.4;
const MARGIN_BOTTOM: f32 = 25.4;
const MARGIN_LEFT: f32 = 19.05;
const MARGIN_RIGHT: f32 = 19.05;
const ROW_H: f32 = 5.0;
const FONT_SIZE: f32 = 8.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.len() as f32 * size * 0.18
}

/// Cut text down to what fits in `width` at `size`.
fn fit(text: &str, width: f32, size: f32) -> String {
    let max_chars = (width / (size * 0.18)).floor() as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(2);
    let mut s: String = text.chars().take(keep).collect();
    s.push_str("..");
    s
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

impl ReportColumn {
    /// Relative share of the printable width.
    fn weight(&self) -> f32 {
        match self {
            Self::Description => 4.0,
            Self::Reference => 2.0,
            Self::Status => 2.2,
            Self::Date | Self::SystemDate => 1.8,
            Self::BankAmount | Self::SystemAmount => 1.8,
            Self::Row | Self::DayDelta | Self::DueId => 0.9,
        }
    }
}

fn layout(columns: &[ReportColumn]) -> Vec<Col> {
    let usable = PAGE_W - MARGIN_LEFT - MARGIN_RIGHT;
    let total: f32 = columns.iter().map(|c| c.weight()).sum();
    columns
        .iter()
        .map(|c| Col {
            width: usable * c.weight() / total,
            align: if c.is_numeric() { Align::Right } else { Align::Left },
        })
        .collect()
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| DuesError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| DuesError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    /// Returns true when a page break happened.
    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
            return true;
        }
        false
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { self.font_bold.clone() } else { self.font.clone() };
        let layer = self.doc.get_page(self.current_page).get_layer(self.current_layer);
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), &font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self.doc.get_page(self.current_page).get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn header(&mut self, title: &str, subtitle: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        self.text(subtitle, MARGIN_LEFT, SUBTITLE_SIZE, false);
        self.y += 5.0;
        let ts = chrono::Local::now().format("Generated %Y-%m-%d %H:%M").to_string();
        self.text(&ts, MARGIN_LEFT, FONT_SIZE, false);
        self.y += 5.0;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 5.0;
    }

    fn row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            let value = fit(value, col.width - 1.0, FONT_SIZE);
            match col.align {
                Align::Left => self.text(&value, x, FONT_SIZE, bold),
                Align::Right => {
                    let tw = approx_text_width(&value, FONT_SIZE);
                    self.text(&value, x + col.width - tw - 1.0, FONT_SIZE, bold);
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        self.row(cols, headers, true);
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 2.0;
    }

    /// Data row; repeats the header after a page break.
    fn table_row(&mut self, cols: &[Col], headers: &[&str], values: &[&str]) {
        if self.ensure_space(ROW_H) {
            self.table_header(cols, headers);
        }
        self.row(cols, values, false);
    }

    fn section_label(&mut self, label: &str) {
        self.ensure_space(ROW_H * 2.0);
        self.text(label, MARGIN_LEFT, SUBTITLE_SIZE, true);
        self.y += ROW_H + 1.0;
    }

    fn line(&mut self, s: &str) {
        self.ensure_space(ROW_H);
        self.text(s, MARGIN_LEFT, FONT_SIZE, false);
        self.y += ROW_H;
    }

    fn blank_row(&mut self) {
        self.y += ROW_H;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| DuesError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| DuesError::Pdf(e.to_string()))
    }
}

pub fn render_reconciliation(report: &ReconciliationReport, columns: &[ReportColumn]) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Bank Reconciliation")?;
    pdf.header("Bank Reconciliation", &report.source);

    let c = &report.counts;
    pdf.section_label("Summary");
    pdf.line(&format!("Rows reconciled: {}", c.total()));
    pdf.line(&format!(
        "Match: {}   Date drift: {}   Distant match: {}   Unmatched: {}",
        c.matched, c.date_drift, c.distant_match, c.unmatched
    ));
    pdf.line(&format!("Skipped rows: {}", report.skipped.len()));
    pdf.blank_row();

    let cols = layout(columns);
    let headers: Vec<&str> = columns.iter().map(|c| c.header()).collect();
    pdf.table_header(&cols, &headers);
    for row in report.project(columns) {
        let values: Vec<&str> = row.iter().map(String::as_str).collect();
        pdf.table_row(&cols, &headers, &values);
    }

    if !report.skipped.is_empty() {
        pdf.blank_row();
        pdf.section_label("Skipped Rows");
        for s in &report.skipped {
            pdf.line(&format!("Row {}: {}", s.row_number, s.reason));
        }
    }

    pdf.to_bytes()
}

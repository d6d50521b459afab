//! File exports of the (filtered) grant list.
//!
//! DESIGN
//! ======
//! Each format renders the same six columns in the same order as the
//! dashboard table. Rendering is pure: it takes the already-filtered rows and
//! returns the file bytes, so the route decides what is exported.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_xlsxwriter::{Format, Workbook};
use time::Date;

use super::filter::total_amount;
use super::grant::GrantView;

pub const HEADERS: [&str; 6] = ["Grant Name", "Type", "Amount", "Date", "Assignee", "Status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "excel" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("xlsx export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("pdf export failed: {0}")]
    Pdf(String),
}

/// Download name, e.g. `grants-2025-03-01.csv`.
#[must_use]
pub fn export_filename(format: ExportFormat, today: Date) -> String {
    format!("grants-{today}.{}", format.extension())
}

/// Plain two-decimal amount; empty when missing.
#[must_use]
pub fn format_amount(amount: Option<f64>) -> String {
    amount.map(|a| format!("{a:.2}")).unwrap_or_default()
}

/// `$1,234.50` style amount for printed output.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

fn row_cells(grant: &GrantView) -> [String; 6] {
    [
        grant.name.clone(),
        grant.grant_type.clone().unwrap_or_default(),
        format_amount(grant.amount),
        grant.date.map(|d| d.to_string()).unwrap_or_default(),
        grant.assignee.clone().unwrap_or_default(),
        grant.status.as_str().to_owned(),
    ]
}

/// Render `grants` in `format`.
///
/// # Errors
///
/// Returns the underlying writer's error if rendering fails.
pub fn render(format: ExportFormat, grants: &[GrantView]) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => render_csv(grants),
        ExportFormat::Xlsx => render_xlsx(grants),
        ExportFormat::Pdf => render_pdf(grants),
    }
}

// =============================================================================
// CSV
// =============================================================================

fn render_csv(grants: &[GrantView]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;
    for grant in grants {
        writer.write_record(row_cells(grant))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))
}

// =============================================================================
// XLSX
// =============================================================================

fn render_xlsx(grants: &[GrantView]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Grants")?;
        for (col, header) in (0_u16..).zip(HEADERS) {
            sheet.write_string_with_format(0, col, header, &bold)?;
        }
        for (row, grant) in (1_u32..).zip(grants) {
            let cells = row_cells(grant);
            for (col, cell) in (0_u16..).zip(&cells) {
                match (col, grant.amount) {
                    (2, Some(amount)) => sheet.write_number(row, col, amount)?,
                    _ => sheet.write_string(row, col, cell)?,
                };
            }
        }
        sheet.autofit();
    }
    Ok(workbook.save_to_buffer()?)
}

// =============================================================================
// PDF
// =============================================================================

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const ROW_HEIGHT: f32 = 6.0;
const FONT_SIZE: f32 = 9.0;
const COLUMNS: [(f32, usize); 6] = [(12.0, 34), (72.0, 14), (98.0, 14), (126.0, 10), (148.0, 18), (182.0, 14)];

struct PdfFonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut clipped: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    clipped.push('~');
    clipped
}

fn write_row(layer: &PdfLayerReference, cells: &[String; 6], y: f32, font: &IndirectFontRef) {
    for ((x, width), cell) in COLUMNS.iter().zip(cells) {
        layer.use_text(clip(cell, *width), FONT_SIZE, Mm(*x), Mm(y), font);
    }
}

fn pdf_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Pdf(e.to_string())
}

fn render_pdf(grants: &[GrantView]) -> Result<Vec<u8>, ExportError> {
    let (doc, page, layer) = PdfDocument::new("Grants", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = PdfFonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
    };
    let headers = HEADERS.map(str::to_owned);

    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text("Grants", 16.0, Mm(12.0), Mm(TOP), &fonts.bold);
    let mut y = TOP - 10.0;
    write_row(&current, &headers, y, &fonts.bold);
    y -= ROW_HEIGHT;

    for grant in grants {
        if y < BOTTOM {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = TOP;
            write_row(&current, &headers, y, &fonts.bold);
            y -= ROW_HEIGHT;
        }
        write_row(&current, &row_cells(grant), y, &fonts.regular);
        y -= ROW_HEIGHT;
    }

    let total = format!("Total amount: {}", format_currency(total_amount(grants)));
    current.use_text(total, 11.0, Mm(12.0), Mm((y - 4.0).max(BOTTOM / 2.0)), &fonts.bold);

    doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;

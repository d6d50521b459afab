use time::macros::date;

use super::*;
use crate::services::grant::GrantStatus;

fn view(id: i64, name: &str, amount: Option<f64>) -> GrantView {
    GrantView {
        id,
        name: name.into(),
        agency: "Agency".into(),
        amount,
        date: Some(date!(2025 - 05 - 20)),
        grant_type: Some("Federal".into()),
        assignee: None,
        status: GrantStatus::NotGranted,
        is_active: true,
    }
}

// =============================================================================
// ExportFormat
// =============================================================================

#[test]
fn format_parse_is_case_insensitive() {
    assert_eq!(ExportFormat::parse("CSV"), Some(ExportFormat::Csv));
    assert_eq!(ExportFormat::parse(" xlsx "), Some(ExportFormat::Xlsx));
    assert_eq!(ExportFormat::parse("Pdf"), Some(ExportFormat::Pdf));
    assert_eq!(ExportFormat::parse("docx"), None);
}

#[test]
fn filename_carries_date_and_extension() {
    assert_eq!(export_filename(ExportFormat::Pdf, date!(2025 - 01 - 09)), "grants-2025-01-09.pdf");
    assert_eq!(export_filename(ExportFormat::Xlsx, date!(2025 - 12 - 31)), "grants-2025-12-31.xlsx");
}

// =============================================================================
// amounts
// =============================================================================

#[test]
fn amount_formats() {
    assert_eq!(format_amount(Some(1500.0)), "1500.00");
    assert_eq!(format_amount(None), "");
    assert_eq!(format_currency(1_234_567.5), "$1,234,567.50");
    assert_eq!(format_currency(999.0), "$999.00");
    assert_eq!(format_currency(0.0), "$0.00");
}

// =============================================================================
// render
// =============================================================================

#[test]
fn csv_has_header_and_quoted_rows() {
    let bytes = render(ExportFormat::Csv, &[view(1, "Arts, Culture & More", Some(10.0)), view(2, "Plain", None)]).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "Grant Name,Type,Amount,Date,Assignee,Status");
    assert_eq!(lines[1], "\"Arts, Culture & More\",Federal,10.00,2025-05-20,,Not Granted");
    assert_eq!(lines[2], "Plain,Federal,,2025-05-20,,Not Granted");
    assert_eq!(lines.len(), 3);
}

#[test]
fn csv_of_empty_list_is_header_only() {
    let text = String::from_utf8(render(ExportFormat::Csv, &[]).unwrap()).unwrap();
    assert_eq!(text, "Grant Name,Type,Amount,Date,Assignee,Status\n");
}

#[test]
fn xlsx_is_a_zip_container() {
    let bytes = render(ExportFormat::Xlsx, &[view(1, "Arts", Some(10.0))]).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn pdf_has_header_and_spans_pages() {
    let one = render(ExportFormat::Pdf, &[view(1, "Arts", Some(10.0))]).unwrap();
    assert!(one.starts_with(b"%PDF"));

    let many: Vec<_> = (0..120).map(|i| view(i, "A very long grant name that will certainly be clipped", Some(1.0))).collect();
    let big = render(ExportFormat::Pdf, &many).unwrap();
    assert!(big.starts_with(b"%PDF"));
    assert!(big.len() > one.len());
}

#[test]
fn clip_marks_truncated_text() {
    assert_eq!(clip("short", 10), "short");
    assert_eq!(clip("abcdefghij", 5), "abcd~");
}

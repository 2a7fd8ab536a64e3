use rust_xlsxwriter::{Workbook, XlsxError};

use crate::utils::report::ExportRow;

/// Render header + rows into a single-sheet workbook and return the
/// serialized bytes.
pub fn build_workbook(headers: &[&str], rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Attendance")?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, cell) in row.cells().iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col as u16, *cell)?;
        }
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::report::EXPORT_HEADERS;

    #[test]
    fn test_build_workbook_produces_xlsx_bytes() {
        let rows = vec![ExportRow {
            date: "2024-01-01".to_string(),
            time: "08:00".to_string(),
            employee: "alice".to_string(),
            status: "On time".to_string(),
            location: "HQ".to_string(),
            flag_comment: String::new(),
        }];
        let bytes = build_workbook(&EXPORT_HEADERS, &rows).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_empty_export_still_has_headers() {
        let bytes = build_workbook(&EXPORT_HEADERS, &[]).unwrap();
        assert!(!bytes.is_empty());
    }
}

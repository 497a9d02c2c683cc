use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet, XlsxError};

use crate::records::{BillRecord, COLUMNS};

/// Export the filtered view to CSV.
///
/// Header row first, comma-separated, no index column. Fields containing
/// commas, quotes or newlines are quoted with doubled quotes. Deterministic:
/// the same rows in the same order produce identical output.
pub fn to_csv(rows: &[BillRecord]) -> String {
    let mut csv = String::new();
    csv.push_str(&COLUMNS.join(","));
    csv.push('\n');

    for row in rows {
        let fields = [
            escape_csv(&row.bill_no),
            escape_csv(&row.service_no),
            escape_csv(&row.ero),
            escape_csv(&row.bill_month),
            format_amount(row.bill_amt),
            format_amount(row.tot_amt),
        ];
        csv.push_str(&fields.join(","));
        csv.push('\n');
    }

    csv
}

/// Export the filtered view to XLSX: a single sheet named "data" with a
/// header row and no index column, built entirely in memory.
///
/// # Errors
/// * `XlsxError` when the workbook cannot be serialized.
pub fn to_xlsx(rows: &[BillRecord]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    // Fixed creation timestamp keeps repeated exports byte-identical.
    let properties =
        DocProperties::new().set_creation_datetime(&ExcelDateTime::from_ymd(2024, 1, 1)?);
    workbook.set_properties(&properties);

    let mut worksheet = Worksheet::new();
    worksheet.set_name("data")?;

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *name)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, &row.bill_no)?;
        worksheet.write_string(r, 1, &row.service_no)?;
        worksheet.write_string(r, 2, &row.ero)?;
        worksheet.write_string(r, 3, &row.bill_month)?;
        worksheet.write_number(r, 4, row.bill_amt)?;
        worksheet.write_number(r, 5, row.tot_amt)?;
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer()
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// Shortest round-trip form so whole numbers keep their decimal point
// (100.0 exports as "100.0", not "100").
fn format_amount(value: f64) -> String {
    format!("{:?}", value)
}

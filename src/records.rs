use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column order used by the table view and both export formats.
pub const COLUMNS: [&str; 6] = ["billNo", "serviceNo", "ero", "billMonth", "billAmt", "totAmt"];

/// One row of the remote bill table, after normalization.
///
/// Numeric fields default to `0.0` and string fields to `""`; missing values
/// never reach the filters or sums as null markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRecord {
    /// Bill identifier.
    pub bill_no: String,

    /// Service connection number.
    pub service_no: String,

    /// Organizational/billing unit code.
    pub ero: String,

    /// Billing period, expected in a sortable `YYYY-MM` form.
    pub bill_month: String,

    /// Bill amount for the period.
    pub bill_amt: f64,

    /// Total amount including arrears/charges.
    pub tot_amt: f64,
}

/// Coerce raw REST rows into the fixed column schema.
///
/// Pure function: empty input yields an empty sequence, never null. Values
/// that fail to parse fall back to the per-column default.
pub fn normalize(rows: &[Value]) -> Vec<BillRecord> {
    rows.iter().map(normalize_row).collect()
}

fn normalize_row(row: &Value) -> BillRecord {
    BillRecord {
        bill_no: string_field(row, "billNo"),
        service_no: string_field(row, "serviceNo"),
        ero: string_field(row, "ero"),
        bill_month: string_field(row, "billMonth"),
        bill_amt: numeric_field(row, "billAmt"),
        tot_amt: numeric_field(row, "totAmt"),
    }
}

fn numeric_field(row: &Value, key: &str) -> f64 {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn string_field(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

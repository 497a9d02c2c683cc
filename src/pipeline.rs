use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;
use crate::records::BillRecord;

/// Page sizes offered by the UI.
pub const ROWS_PER_PAGE_OPTIONS: [usize; 4] = [10, 20, 50, 100];

/// Page size used when the requested one is not a recognized option.
pub const DEFAULT_ROWS_PER_PAGE: usize = 20;

/// User-selected filter parameters for one interaction.
///
/// `None` for months/EROs means "all options selected" (the UI default);
/// an explicit empty selection halts the pipeline with a prompt.
#[derive(Debug, Clone)]
pub struct FilterParams {
    pub months: Option<Vec<String>>,
    pub eros: Option<Vec<String>>,
    pub search: String,
    /// 1-indexed; clamped into `[1, total_pages]`.
    pub page: usize,
    pub rows_per_page: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            months: None,
            eros: None,
            search: String::new(),
            page: 1,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

/// One bar/point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub total: f64,
}

/// Everything the presentation layer needs for one interaction: the page
/// slice, pagination metadata, aggregate totals, chart series and the
/// candidate filter options.
#[derive(Debug, Serialize)]
pub struct BillView {
    pub rows: Vec<BillRecord>,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub page: usize,
    pub total_pages: usize,
    pub rows_per_page: usize,
    /// 1-indexed row range shown; `(0, 0)` when the filtered set is empty.
    pub row_start: usize,
    pub row_end: usize,
    pub total_bill_amt: f64,
    pub total_tot_amt: f64,
    pub month_options: Vec<String>,
    pub ero_options: Vec<String>,
    pub ero_totals: Vec<ChartPoint>,
    pub month_totals: Vec<ChartPoint>,
}

/// Sorted distinct non-empty `billMonth` values over the full dataset.
pub fn month_options(records: &[BillRecord]) -> Vec<String> {
    distinct_options(records.iter().map(|r| r.bill_month.as_str()))
}

/// Sorted distinct non-empty `ero` values over the given subset.
pub fn ero_options(records: &[&BillRecord]) -> Vec<String> {
    distinct_options(records.iter().map(|r| r.ero.as_str()))
}

// "nan" is what stringly-typed upstream cleaning turns missing values into;
// it is never offered as a selectable option.
fn distinct_options<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let set: BTreeSet<&str> = values
        .filter(|v| !v.trim().is_empty() && v.trim() != "nan")
        .collect();
    set.into_iter().map(str::to_string).collect()
}

/// Total pages for a filtered set; minimum 1 even when empty.
pub fn total_pages(filtered_rows: usize, rows_per_page: usize) -> usize {
    filtered_rows.div_ceil(rows_per_page).max(1)
}

/// Run the full filter/aggregate/paginate pipeline.
///
/// Pure: recomputed from scratch on every parameter change, never mutates
/// the source records.
///
/// # Errors
/// * `AppError::Selection` when zero months or zero EROs are selected.
pub fn build_view(records: &[BillRecord], params: &FilterParams) -> Result<BillView, AppError> {
    // Before any fetch there is nothing to select; render an empty view
    // instead of prompting for a selection.
    if records.is_empty() {
        return Ok(empty_view(params));
    }

    let month_opts = month_options(records);
    let (filtered, ero_opts) = apply_filters(records, params, &month_opts)?;

    let rows_per_page = if ROWS_PER_PAGE_OPTIONS.contains(&params.rows_per_page) {
        params.rows_per_page
    } else {
        DEFAULT_ROWS_PER_PAGE
    };

    let pages = total_pages(filtered.len(), rows_per_page);
    let page = params.page.clamp(1, pages);
    let start = (page - 1) * rows_per_page;
    let end = (start + rows_per_page).min(filtered.len());
    let rows: Vec<BillRecord> = if start < filtered.len() {
        filtered[start..end].iter().map(|r| (*r).clone()).collect()
    } else {
        Vec::new()
    };

    // Totals and chart series run over the filtered set, not the page.
    let total_bill_amt = filtered.iter().map(|r| r.bill_amt).sum();
    let total_tot_amt = filtered.iter().map(|r| r.tot_amt).sum();

    Ok(BillView {
        total_rows: records.len(),
        filtered_rows: filtered.len(),
        page,
        total_pages: pages,
        rows_per_page,
        row_start: if rows.is_empty() { 0 } else { start + 1 },
        row_end: end,
        total_bill_amt,
        total_tot_amt,
        ero_totals: ero_totals(&filtered),
        month_totals: month_totals(&filtered),
        month_options: month_opts,
        ero_options: ero_opts,
        rows,
    })
}

/// The filtered (pre-pagination) view, cloned for export.
///
/// # Errors
/// * `AppError::Selection` when zero months or zero EROs are selected.
pub fn filtered_records(
    records: &[BillRecord],
    params: &FilterParams,
) -> Result<Vec<BillRecord>, AppError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let month_opts = month_options(records);
    let (filtered, _) = apply_filters(records, params, &month_opts)?;
    Ok(filtered.into_iter().cloned().collect())
}

fn empty_view(params: &FilterParams) -> BillView {
    let rows_per_page = if ROWS_PER_PAGE_OPTIONS.contains(&params.rows_per_page) {
        params.rows_per_page
    } else {
        DEFAULT_ROWS_PER_PAGE
    };

    BillView {
        rows: Vec::new(),
        total_rows: 0,
        filtered_rows: 0,
        page: 1,
        total_pages: 1,
        rows_per_page,
        row_start: 0,
        row_end: 0,
        total_bill_amt: 0.0,
        total_tot_amt: 0.0,
        month_options: Vec::new(),
        ero_options: Vec::new(),
        ero_totals: Vec::new(),
        month_totals: Vec::new(),
    }
}

fn apply_filters<'a>(
    records: &'a [BillRecord],
    params: &FilterParams,
    month_opts: &[String],
) -> Result<(Vec<&'a BillRecord>, Vec<String>), AppError> {
    let selected_months: Vec<String> = match &params.months {
        Some(months) => months.clone(),
        None => month_opts.to_vec(),
    };
    if selected_months.is_empty() {
        return Err(AppError::Selection(
            "Please select at least one billMonth.".to_string(),
        ));
    }

    let by_month: Vec<&BillRecord> = records
        .iter()
        .filter(|r| selected_months.iter().any(|m| *m == r.bill_month))
        .collect();

    // ERO options narrow with the month selection, as the filters are
    // presented to the user in that order.
    let ero_opts = ero_options(&by_month);
    let selected_eros: Vec<String> = match &params.eros {
        Some(eros) => eros.clone(),
        None => ero_opts.clone(),
    };
    if selected_eros.is_empty() {
        return Err(AppError::Selection(
            "Please select at least one ERO.".to_string(),
        ));
    }

    let by_ero = by_month
        .into_iter()
        .filter(|r| selected_eros.iter().any(|e| *e == r.ero));

    let search = params.search.trim();
    let filtered: Vec<&BillRecord> = if search.is_empty() {
        by_ero.collect()
    } else {
        by_ero
            .filter(|r| r.bill_no.contains(search) || r.service_no.contains(search))
            .collect()
    };

    Ok((filtered, ero_opts))
}

/// Per-ERO `totAmt` sums, sorted descending by sum, for the bar chart.
pub fn ero_totals(filtered: &[&BillRecord]) -> Vec<ChartPoint> {
    let mut series = group_totals(filtered, |r| &r.ero);
    series.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));
    series
}

/// Per-month `totAmt` sums for the trend chart, sorted chronologically when
/// the month parses as a date, with unparseable keys last in lexicographic
/// order.
pub fn month_totals(filtered: &[&BillRecord]) -> Vec<ChartPoint> {
    let mut series = group_totals(filtered, |r| &r.bill_month);
    series.sort_by(|a, b| {
        match (parse_bill_month(&a.label), parse_bill_month(&b.label)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.label.cmp(&b.label),
        }
    });
    series
}

fn group_totals<'a>(
    rows: &[&'a BillRecord],
    key: impl Fn(&'a BillRecord) -> &'a String,
) -> Vec<ChartPoint> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows.iter().copied() {
        *sums.entry(key(row).as_str()).or_insert(0.0) += row.tot_amt;
    }
    sums.into_iter()
        .map(|(label, total)| ChartPoint {
            label: label.to_string(),
            total,
        })
        .collect()
}

fn parse_bill_month(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bill_no: &str, service_no: &str, ero: &str, month: &str, tot: f64) -> BillRecord {
        BillRecord {
            bill_no: bill_no.to_string(),
            service_no: service_no.to_string(),
            ero: ero.to_string(),
            bill_month: month.to_string(),
            bill_amt: tot - 10.0,
            tot_amt: tot,
        }
    }

    fn sample() -> Vec<BillRecord> {
        vec![
            record("A1", "S1", "North", "2024-01", 110.0),
            record("A2", "S2", "North", "2024-02", 210.0),
            record("B1", "S3", "South", "2024-01", 310.0),
            record("B2", "S4", "South", "2024-03", 410.0),
            record("C1", "S5", "East", "2024-02", 510.0),
        ]
    }

    #[test]
    fn options_are_sorted_and_skip_blanks() {
        let mut records = sample();
        records.push(record("X", "Y", "", "nan", 1.0));
        records.push(record("X", "Y", "  ", "", 1.0));

        assert_eq!(
            month_options(&records),
            vec!["2024-01", "2024-02", "2024-03"]
        );
    }

    #[test]
    fn default_params_keep_everything() {
        let records = sample();
        let view = build_view(&records, &FilterParams::default()).unwrap();
        assert_eq!(view.filtered_rows, 5);
        assert_eq!(view.total_rows, 5);
        assert_eq!(view.total_tot_amt, 1550.0);
        assert_eq!(view.total_pages, 1);
    }

    #[test]
    fn zero_selected_months_is_a_prompt() {
        let records = sample();
        let params = FilterParams {
            months: Some(Vec::new()),
            ..FilterParams::default()
        };
        let err = build_view(&records, &params).unwrap_err();
        assert!(matches!(err, AppError::Selection(_)));
    }

    #[test]
    fn zero_selected_eros_is_a_prompt() {
        let records = sample();
        let params = FilterParams {
            eros: Some(Vec::new()),
            ..FilterParams::default()
        };
        assert!(matches!(
            build_view(&records, &params),
            Err(AppError::Selection(_))
        ));
    }

    #[test]
    fn ero_options_narrow_with_month_selection() {
        let records = sample();
        let params = FilterParams {
            months: Some(vec!["2024-03".to_string()]),
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.ero_options, vec!["South"]);
        assert_eq!(view.filtered_rows, 1);
    }

    #[test]
    fn search_matches_bill_no_or_service_no() {
        let records = sample();
        let params = FilterParams {
            search: "S3".to_string(),
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.filtered_rows, 1);
        assert_eq!(view.rows[0].bill_no, "B1");

        // Case-sensitive literal match: lowercase does not hit.
        let params = FilterParams {
            search: "s3".to_string(),
            ..FilterParams::default()
        };
        assert_eq!(build_view(&records, &params).unwrap().filtered_rows, 0);
    }

    #[test]
    fn filter_order_is_immaterial() {
        // Composing month+ERO+search in the pipeline's fixed order must give
        // the same set as applying them by hand in a different order.
        let records = sample();
        let params = FilterParams {
            months: Some(vec!["2024-01".to_string(), "2024-02".to_string()]),
            eros: Some(vec!["North".to_string(), "East".to_string()]),
            search: "1".to_string(),
            ..FilterParams::default()
        };
        let piped = filtered_records(&records, &params).unwrap();

        let by_hand: Vec<BillRecord> = records
            .iter()
            .filter(|r| r.bill_no.contains('1') || r.service_no.contains('1'))
            .filter(|r| r.ero == "North" || r.ero == "East")
            .filter(|r| r.bill_month == "2024-01" || r.bill_month == "2024-02")
            .cloned()
            .collect();

        assert_eq!(piped, by_hand);
    }

    #[test]
    fn empty_filtered_set_still_has_one_page() {
        let records = sample();
        let params = FilterParams {
            search: "does-not-exist".to_string(),
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.filtered_rows, 0);
        assert_eq!(view.total_pages, 1);
        assert!(view.rows.is_empty());
        assert_eq!((view.row_start, view.row_end), (0, 0));
    }

    #[test]
    fn empty_dataset_renders_an_empty_view() {
        let view = build_view(&[], &FilterParams::default()).unwrap();
        assert_eq!(view.total_rows, 0);
        assert_eq!(view.total_pages, 1);
        assert!(view.month_options.is_empty());
        assert!(filtered_records(&[], &FilterParams::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn pagination_slices_and_clamps() {
        let records: Vec<BillRecord> = (0..25)
            .map(|i| record(&format!("A{i}"), "S", "North", "2024-01", 1.0))
            .collect();

        let params = FilterParams {
            page: 2,
            rows_per_page: 10,
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.rows.len(), 10);
        assert_eq!((view.row_start, view.row_end), (11, 20));

        // Page past the end clamps to the last page.
        let params = FilterParams {
            page: 99,
            rows_per_page: 10,
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.page, 3);
        assert_eq!(view.rows.len(), 5);

        // Unrecognized page size falls back to the default.
        let params = FilterParams {
            rows_per_page: 7,
            ..FilterParams::default()
        };
        assert_eq!(build_view(&records, &params).unwrap().rows_per_page, 20);
    }

    #[test]
    fn ero_sums_conserve_the_total() {
        let records = sample();
        let view = build_view(&records, &FilterParams::default()).unwrap();
        let sum_of_groups: f64 = view.ero_totals.iter().map(|p| p.total).sum();
        assert!((sum_of_groups - view.total_tot_amt).abs() < 1e-9);
    }

    #[test]
    fn ero_totals_sorted_descending() {
        let records = sample();
        let view = build_view(&records, &FilterParams::default()).unwrap();
        let labels: Vec<&str> = view.ero_totals.iter().map(|p| p.label.as_str()).collect();
        // South 720, East 510, North 320
        assert_eq!(labels, vec!["South", "East", "North"]);
    }

    #[test]
    fn month_totals_sorted_by_parsed_date_then_lexicographic() {
        let mut records = sample();
        records.push(record("Z1", "S9", "West", "unknown", 5.0));
        records.push(record("Z2", "S9", "West", "archive", 5.0));

        let view = build_view(&records, &FilterParams::default()).unwrap();
        let labels: Vec<&str> = view.month_totals.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["2024-01", "2024-02", "2024-03", "archive", "unknown"]
        );
    }

    #[test]
    fn scenario_single_row_full_pipeline() {
        let raw = vec![serde_json::json!({
            "billNo": "A1",
            "serviceNo": "S1",
            "ero": "North",
            "billMonth": "2024-01",
            "billAmt": "100",
            "totAmt": "110",
        })];
        let records = crate::records::normalize(&raw);

        let params = FilterParams {
            months: Some(vec!["2024-01".to_string()]),
            eros: Some(vec!["North".to_string()]),
            ..FilterParams::default()
        };
        let view = build_view(&records, &params).unwrap();
        assert_eq!(view.filtered_rows, 1);
        assert_eq!(view.total_tot_amt, 110.0);
        assert_eq!(view.ero_totals[0].label, "North");
    }
}

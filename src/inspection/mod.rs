//! Raw data inspection.
//!
//! An independent read-only pass over the source file that renders
//! descriptive statistics as a markdown report. It makes no filtering
//! decisions and never feeds the cleaning pipeline.

pub mod markdown;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::*;
use crate::error::Result;
use crate::pipeline::audit::{format_percentile, Summary};
use crate::pipeline::coerce::parse_timestamp;
use crate::pipeline::source::{read_raw_table, RawTable};
use markdown::{markdown_table, thousands};

const DESCRIBE_PERCENTILES: [f64; 5] = [0.01, 0.05, 0.5, 0.95, 0.99];
const DISTRIBUTION_ROWS: usize = 20;
const NULL_LABEL: &str = "<NA>";

fn infer_type<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> &'static str {
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;
    for cell in cells.flatten() {
        seen = true;
        let s = cell.trim();
        if all_int && s.parse::<i64>().is_err() {
            all_int = false;
        }
        if s.parse::<f64>().is_err() {
            all_float = false;
            break;
        }
    }
    match (seen, all_int, all_float) {
        (false, _, _) => "empty",
        (true, true, _) => "integer",
        (true, false, true) => "float",
        _ => "text",
    }
}

fn numeric_values(table: &RawTable, column: &str) -> Option<Vec<f64>> {
    Some(
        table
            .column(column)?
            .flatten()
            .filter_map(|c| c.trim().parse::<f64>().ok())
            .filter(|v| !v.is_nan())
            .collect(),
    )
}

fn fmt_num(v: f64) -> String {
    format!("{:.6}", v)
}

fn describe_table(table: &RawTable, column: &str) -> String {
    let Some(values) = numeric_values(table, column) else {
        return format!("`{}` column not found.", column);
    };
    let Some(summary) = Summary::describe(&values, &DESCRIBE_PERCENTILES) else {
        return "_No rows_".to_string();
    };
    let mut rows = vec![
        vec!["count".to_string(), summary.count.to_string()],
        vec!["mean".to_string(), fmt_num(summary.mean)],
        vec![
            "std".to_string(),
            summary.std.map(fmt_num).unwrap_or_else(|| "NaN".to_string()),
        ],
        vec!["min".to_string(), fmt_num(summary.min)],
    ];
    for (p, v) in &summary.percentiles {
        rows.push(vec![format_percentile(*p), fmt_num(*v)]);
    }
    rows.push(vec!["max".to_string(), fmt_num(summary.max)]);
    markdown_table(&["index", column], &rows, None)
}

fn sign_flags(table: &RawTable, column: &str, negative_label: &str, zero_label: &str) -> String {
    let values = numeric_values(table, column).unwrap_or_default();
    let negative = values.iter().filter(|v| **v < 0.0).count();
    let zero = values.iter().filter(|v| **v == 0.0).count();
    markdown_table(
        &["metric", "value"],
        &[
            vec![negative_label.to_string(), negative.to_string()],
            vec![zero_label.to_string(), zero.to_string()],
        ],
        None,
    )
}

/// Groups in first-seen order so equal totals keep a stable order after
/// sorting.
fn grouped<T: Copy + std::ops::AddAssign>(
    pairs: impl Iterator<Item = (String, T)>,
) -> Vec<(String, T)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, T)> = Vec::new();
    for (key, value) in pairs {
        match index.get(&key) {
            Some(&i) => groups[i].1 += value,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, value));
            }
        }
    }
    groups
}

fn country_distribution(table: &RawTable) -> String {
    let Some(countries) = table.column(COL_COUNTRY) else {
        return markdown_table(&["country", "row_count"], &[], None);
    };
    let mut counts = grouped(countries.map(|c| (c.unwrap_or(NULL_LABEL).to_string(), 1usize)));
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let rows: Vec<Vec<String>> = counts
        .into_iter()
        .map(|(country, n)| vec![country, n.to_string()])
        .collect();
    markdown_table(&["country", "row_count"], &rows, Some(DISTRIBUTION_ROWS))
}

fn revenue_per_country(table: &RawTable) -> String {
    let (Some(q), Some(p), Some(c)) = (
        table.column_index(COL_QUANTITY),
        table.column_index(COL_PRICE),
        table.column_index(COL_COUNTRY),
    ) else {
        return markdown_table(&["country", "Revenue"], &[], None);
    };
    let num = |cell: &Option<String>| cell.as_deref().and_then(|s| s.trim().parse::<f64>().ok());
    let mut revenue = grouped(table.rows.iter().map(|row| {
        let value = match (num(&row[q]), num(&row[p])) {
            (Some(qty), Some(price)) => qty * price,
            _ => 0.0,
        };
        (row[c].clone().unwrap_or_else(|| NULL_LABEL.to_string()), value)
    }));
    revenue.sort_by(|a, b| b.1.total_cmp(&a.1));
    let rows: Vec<Vec<String>> = revenue
        .into_iter()
        .map(|(country, total)| vec![country, format!("{:.2}", total)])
        .collect();
    markdown_table(&["country", "Revenue"], &rows, Some(DISTRIBUTION_ROWS))
}

fn date_range(table: &RawTable) -> String {
    let Some(cells) = table.column(COL_INVOICE_DATE) else {
        return format!("{} column not found.", COL_INVOICE_DATE);
    };
    let mut min = None;
    let mut max = None;
    let mut unparseable = 0usize;
    for cell in cells {
        match cell.and_then(parse_timestamp) {
            Some(ts) => {
                min = Some(min.map_or(ts, |m: chrono::NaiveDateTime| m.min(ts)));
                max = Some(max.map_or(ts, |m: chrono::NaiveDateTime| m.max(ts)));
            }
            None => unparseable += 1,
        }
    }
    match (min, max) {
        (Some(min), Some(max)) => format!(
            "Min date: {}, Max date: {}, Unparseable rows: {}",
            min.format("%Y-%m-%d %H:%M:%S"),
            max.format("%Y-%m-%d %H:%M:%S"),
            thousands(unparseable)
        ),
        _ => format!(
            "Unable to parse valid dates. Unparseable rows: {}",
            thousands(unparseable)
        ),
    }
}

/// Builds the full markdown report for a raw table. Missing columns yield
/// placeholder sections instead of errors.
pub fn build_report(table: &RawTable, source: &Path, cancellation_prefix: &str) -> String {
    let rows = table.row_count();

    let column_types: Vec<Vec<String>> = table
        .headers
        .iter()
        .map(|h| {
            let kind = table.column(h).map(|c| infer_type(c)).unwrap_or("empty");
            vec![h.clone(), kind.to_string()]
        })
        .collect();

    let mut nulls: Vec<(String, usize)> = table
        .headers
        .iter()
        .map(|h| {
            let n = table.column(h).map(|c| c.filter(|v| v.is_none()).count()).unwrap_or(0);
            (h.clone(), n)
        })
        .collect();
    nulls.sort_by(|a, b| b.1.cmp(&a.1));
    let null_rows: Vec<Vec<String>> = nulls
        .into_iter()
        .map(|(col, n)| {
            let pct = if rows > 0 { n as f64 / rows as f64 * 100.0 } else { 0.0 };
            vec![col, n.to_string(), format!("{:.4}", pct)]
        })
        .collect();

    let cancellations = table
        .column(COL_INVOICE)
        .map(|c| c.flatten().filter(|v| v.starts_with(cancellation_prefix)).count())
        .unwrap_or(0);
    let cancellation_pct = if rows > 0 {
        cancellations as f64 / rows as f64 * 100.0
    } else {
        0.0
    };

    let lines = vec![
        "# Raw Data Inspection Report".to_string(),
        String::new(),
        "## Source".to_string(),
        format!("- File: `{}`", source.display()),
        "- Phase: 1 (Raw Data Inspection)".to_string(),
        String::new(),
        "## Dataset Shape".to_string(),
        format!("- Rows: {}", thousands(rows)),
        format!("- Columns: {}", thousands(table.headers.len())),
        String::new(),
        "## Columns and Data Types".to_string(),
        markdown_table(&["column", "dtype"], &column_types, None),
        String::new(),
        "## Null Count and Percentage".to_string(),
        markdown_table(&["column", "null_count", "null_percent"], &null_rows, None),
        String::new(),
        "## Cancellation Invoices".to_string(),
        format!(
            "- Rows with `{}` starting with `{}`: {} ({:.2}%)",
            COL_INVOICE,
            cancellation_prefix,
            thousands(cancellations),
            cancellation_pct
        ),
        String::new(),
        "## Quantity Distribution".to_string(),
        describe_table(table, COL_QUANTITY),
        String::new(),
        "### Quantity Quality Flags".to_string(),
        sign_flags(table, COL_QUANTITY, "negative_quantity_rows", "zero_quantity_rows"),
        String::new(),
        "## Price Distribution".to_string(),
        describe_table(table, COL_PRICE),
        String::new(),
        "### Price Quality Flags".to_string(),
        sign_flags(table, COL_PRICE, "negative_price_rows", "zero_price_rows"),
        String::new(),
        "## Country Distribution (Rows)".to_string(),
        country_distribution(table),
        String::new(),
        "## Revenue per Country (Raw)".to_string(),
        revenue_per_country(table),
        String::new(),
        "## Date Range Validation".to_string(),
        format!("- {}", date_range(table)),
        String::new(),
        "## Frozen Decisions for Next Phase".to_string(),
        "- Keep UK only".to_string(),
        "- Remove cancelled invoices".to_string(),
        "- Remove negative quantities".to_string(),
        "- Remove zero or negative prices".to_string(),
        "- Temporal boundary already fixed at source (2010-2011 only)".to_string(),
    ];
    lines.join("\n")
}

/// Reads the raw source and writes the inspection report.
pub struct RawInspection {
    source: PathBuf,
    report: PathBuf,
    cancellation_prefix: String,
}

impl RawInspection {
    pub fn new(
        source: impl Into<PathBuf>,
        report: impl Into<PathBuf>,
        cancellation_prefix: &str,
    ) -> Self {
        Self {
            source: source.into(),
            report: report.into(),
            cancellation_prefix: cancellation_prefix.to_string(),
        }
    }

    pub fn run(&self) -> Result<PathBuf> {
        info!("Phase 1 raw inspection started.");
        let table = read_raw_table(&self.source)?;

        if let Some(parent) = self.report.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let report = build_report(&table, &self.source, &self.cancellation_prefix);
        fs::write(&self.report, report)?;

        info!(
            "Phase 1 raw inspection completed. Report saved to {}",
            self.report.display()
        );
        Ok(self.report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::read_raw_from;

    const SAMPLE: &str = "\
Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country
536365,85123A,WHITE HANGING HEART,6,2010-12-01 08:26:00,2.55,17850,United Kingdom
C536379,D,Discount,-1,2010-12-01 09:41:00,27.5,14527,United Kingdom
536380,22961,JAM MAKING SET,0,2010-12-01 09:45:00,1.45,,France
536381,22139,RETROSPOT TEA SET,2,garbage,0,,United Kingdom
";

    fn report() -> String {
        let table = read_raw_from(SAMPLE.as_bytes()).unwrap();
        build_report(&table, Path::new("data/raw/sample.csv"), "C")
    }

    #[test]
    fn report_covers_shape_and_cancellations() {
        let r = report();
        assert!(r.starts_with("# Raw Data Inspection Report"));
        assert!(r.contains("- File: `data/raw/sample.csv`"));
        assert!(r.contains("- Rows: 4"));
        assert!(r.contains("- Columns: 8"));
        assert!(r.contains("- Rows with `Invoice` starting with `C`: 1 (25.00%)"));
    }

    #[test]
    fn report_flags_nulls_and_signs() {
        let r = report();
        assert!(r.contains("| Customer ID | 2 | 50.0000 |"));
        assert!(r.contains("| negative_quantity_rows | 1 |"));
        assert!(r.contains("| zero_quantity_rows | 1 |"));
        assert!(r.contains("| zero_price_rows | 1 |"));
        assert!(r.contains("| Quantity | integer |"));
        assert!(r.contains("| Price | float |"));
        assert!(r.contains("| Country | text |"));
    }

    #[test]
    fn report_groups_countries_and_revenue() {
        let r = report();
        assert!(r.contains("| United Kingdom | 3 |"));
        assert!(r.contains("| France | 1 |"));
        // 6 * 2.55 - 27.5 + 0
        assert!(r.contains("| United Kingdom | -12.20 |"));
    }

    #[test]
    fn report_validates_date_range() {
        let r = report();
        assert!(r.contains(
            "- Min date: 2010-12-01 08:26:00, Max date: 2010-12-01 09:45:00, Unparseable rows: 1"
        ));
    }

    #[test]
    fn missing_columns_do_not_fail() {
        let table = read_raw_from("Invoice,Country\n536365,United Kingdom\n".as_bytes()).unwrap();
        let r = build_report(&table, Path::new("x.csv"), "C");
        assert!(r.contains("`Quantity` column not found."));
        assert!(r.contains("InvoiceDate column not found."));
    }

    #[test]
    fn run_writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("raw.csv");
        fs::write(&source, SAMPLE).unwrap();
        let target = dir.path().join("docs").join(PHASE1_REPORT_FILE);

        let written = RawInspection::new(&source, &target, "C").run().unwrap();
        assert_eq!(written, target);
        assert!(fs::read_to_string(&target)
            .unwrap()
            .contains("## Frozen Decisions for Next Phase"));
    }
}

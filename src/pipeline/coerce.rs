use chrono::{DateTime, NaiveDate, NaiveDateTime};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::constants::*;
use crate::error::{Result, StudyError};
use crate::pipeline::source::RawTable;
use crate::types::{Dataset, Record};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Rows removed (or values nulled) while re-typing the raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    pub rows_in: usize,
    pub quantity_dropped: usize,
    pub price_dropped: usize,
    pub timestamp_dropped: usize,
    pub customer_id_nulled: usize,
    pub rows_out: usize,
}

/// Trims string columns, uppercases identifiers and collapses whitespace in
/// descriptions. Columns that are absent are skipped.
pub fn standardize_strings(table: &mut RawTable) {
    let string_cols: Vec<usize> = STRING_COLUMNS
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    let upper_cols: Vec<usize> = [COL_INVOICE, COL_STOCK_CODE]
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    let description = table.column_index(COL_DESCRIPTION);

    for row in table.rows.iter_mut() {
        for &idx in &string_cols {
            if let Some(cell) = row[idx].as_mut() {
                let trimmed = cell.trim();
                if trimmed.len() != cell.len() {
                    *cell = trimmed.to_string();
                }
            }
        }
        for &idx in &upper_cols {
            if let Some(cell) = row[idx].as_mut() {
                *cell = cell.to_uppercase();
            }
        }
        if let Some(idx) = description {
            if let Some(cell) = row[idx].as_mut() {
                *cell = WHITESPACE_RUN.replace_all(cell, " ").trim().to_string();
            }
        }
    }
}

pub fn parse_quantity(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    integral_float(s)
}

pub fn parse_price(raw: &str) -> Option<f64> {
    match raw.trim().parse::<f64>() {
        Ok(v) if !v.is_nan() => Some(v),
        _ => None,
    }
}

/// Best-effort timestamp parser accepting the export formats seen in the
/// retail datasets. Bare dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn parse_customer_id(raw: &str) -> Option<i64> {
    parse_quantity(raw)
}

fn integral_float(s: &str) -> Option<i64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Converts the standardized raw table into typed records.
///
/// Fields are evaluated in order: quantity, price, timestamp. A row dropped
/// for one field is never counted against a later one. An unparseable
/// customer id only nulls the value.
#[derive(Debug, Default)]
pub struct TypeCoercion;

impl TypeCoercion {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, table: &RawTable) -> Result<(Dataset, CoercionReport)> {
        let idx = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| StudyError::Schema { missing: vec![name.to_string()] })
        };
        let invoice = idx(COL_INVOICE)?;
        let stock = idx(COL_STOCK_CODE)?;
        let description = idx(COL_DESCRIPTION)?;
        let quantity = idx(COL_QUANTITY)?;
        let timestamp = idx(COL_INVOICE_DATE)?;
        let price = idx(COL_PRICE)?;
        let customer = idx(COL_CUSTOMER_ID)?;
        let country = idx(COL_COUNTRY)?;

        let mut report = CoercionReport {
            rows_in: table.row_count(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(table.row_count());

        for row in &table.rows {
            let cell = move |i: usize| row[i].as_deref();

            let Some(qty) = cell(quantity).and_then(parse_quantity) else {
                report.quantity_dropped += 1;
                continue;
            };
            let Some(unit_price) = cell(price).and_then(parse_price) else {
                report.price_dropped += 1;
                continue;
            };
            let Some(ts) = cell(timestamp).and_then(parse_timestamp) else {
                report.timestamp_dropped += 1;
                continue;
            };
            let customer_id = match cell(customer) {
                Some(raw) => {
                    let parsed = parse_customer_id(raw);
                    if parsed.is_none() {
                        report.customer_id_nulled += 1;
                    }
                    parsed
                }
                None => None,
            };

            records.push(Record {
                invoice_id: row[invoice].clone(),
                stock_code: row[stock].clone(),
                description: row[description].clone(),
                quantity: qty,
                invoice_timestamp: ts,
                unit_price,
                customer_id,
                country: row[country].clone(),
            });
        }
        report.rows_out = records.len();

        info!("Dropping rows with non-numeric quantities: {}", report.quantity_dropped);
        info!("Dropping rows with non-numeric prices: {}", report.price_dropped);
        info!("Dropping rows with unparseable invoice dates: {}", report.timestamp_dropped);
        info!("Customer ids nulled during coercion: {}", report.customer_id_nulled);

        counter!("pricing_coercion_drops_total", "field" => "quantity")
            .increment(report.quantity_dropped as u64);
        counter!("pricing_coercion_drops_total", "field" => "price")
            .increment(report.price_dropped as u64);
        counter!("pricing_coercion_drops_total", "field" => "timestamp")
            .increment(report.timestamp_dropped as u64);

        Ok((Dataset::new(records), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::read_raw_from;

    const HEADER: &str =
        "Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country\n";

    fn table(body: &str) -> RawTable {
        let mut t = read_raw_from(format!("{HEADER}{body}").as_bytes()).unwrap();
        standardize_strings(&mut t);
        t
    }

    #[test]
    fn standardizes_identifiers_and_descriptions() {
        let t = table(concat!(
            " c536370 , 85123a ,\"  WHITE   HANGING\tHEART \",",
            "6,2010-12-01 08:26:00,2.55,17850, United Kingdom \n",
        ));
        let row = &t.rows[0];
        assert_eq!(row[0].as_deref(), Some("C536370"));
        assert_eq!(row[1].as_deref(), Some("85123A"));
        assert_eq!(row[2].as_deref(), Some("WHITE HANGING HEART"));
        assert_eq!(row[7].as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn parses_multiple_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(8, 26, 0).unwrap();
        assert_eq!(parse_timestamp("2010-12-01 08:26:00"), Some(expected));
        assert_eq!(parse_timestamp("12/1/2010 8:26"), Some(expected));
        assert_eq!(parse_timestamp("2010-12-01T08:26:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2010-12-01"),
            NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn accepts_fractional_seconds() {
        let base = NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(8, 26, 0).unwrap();
        assert_eq!(parse_timestamp("2010-12-01 08:26:00.000"), Some(base));
        assert_eq!(
            parse_timestamp("2010-12-01T08:26:00.5"),
            Some(base + chrono::Duration::milliseconds(500))
        );
        assert_eq!(
            parse_timestamp("12/1/2010 8:26:00.250"),
            Some(base + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn numeric_parsers() {
        assert_eq!(parse_quantity("6"), Some(6));
        assert_eq!(parse_quantity("-12"), Some(-12));
        assert_eq!(parse_quantity("6.0"), Some(6));
        assert_eq!(parse_quantity("2.5"), None);
        assert_eq!(parse_quantity("six"), None);
        assert_eq!(parse_price("2.55"), Some(2.55));
        assert_eq!(parse_price("-11062.06"), Some(-11062.06));
        assert_eq!(parse_price("NaN"), None);
        assert_eq!(parse_price("inf"), Some(f64::INFINITY));
        assert_eq!(parse_price("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_customer_id("13085.0"), Some(13085));
        assert_eq!(parse_customer_id("guest"), None);
    }

    #[test]
    fn drops_are_counted_per_field_in_order() {
        let t = table(concat!(
            "536365,85123A,A,6,2010-12-01 08:26:00,2.55,17850,United Kingdom\n",
            "536366,85123A,B,x,2010-12-01 08:26:00,oops,17850,United Kingdom\n",
            "536367,85123A,C,1,2010-12-01 08:26:00,free,17850,United Kingdom\n",
            "536368,85123A,D,1,not a date,1.0,17850,United Kingdom\n",
            "536369,85123A,E,1,2010-12-01 08:26:00,1.0,guest,United Kingdom\n",
            "536370,85123A,F,1,2010-12-01 08:26:00,1.0,,United Kingdom\n",
        ));
        let (dataset, report) = TypeCoercion::new().run(&t).unwrap();

        // Row 2 has a bad price too but only counts as a quantity drop
        assert_eq!(report.quantity_dropped, 1);
        assert_eq!(report.price_dropped, 1);
        assert_eq!(report.timestamp_dropped, 1);
        assert_eq!(report.customer_id_nulled, 1);
        assert_eq!(report.rows_in, 6);
        assert_eq!(report.rows_out, 3);
        assert_eq!(dataset.len(), 3);

        let customers: Vec<_> = dataset.records().iter().map(|r| r.customer_id).collect();
        assert_eq!(customers, vec![Some(17850), None, None]);
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let t = RawTable {
            headers: vec!["Invoice".into()],
            rows: vec![],
        };
        assert!(matches!(TypeCoercion::new().run(&t), Err(StudyError::Schema { .. })));
    }
}

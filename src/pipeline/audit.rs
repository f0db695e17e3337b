use std::fmt::Write as _;
use tracing::{info, warn};

use crate::config::AuditConfig;
use crate::error::Result;
use crate::pipeline::Stage;
use crate::types::{Dataset, Record};

/// Descriptive statistics in the shape of a `describe()` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, undefined for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub percentiles: Vec<(f64, f64)>,
    pub max: f64,
}

impl Summary {
    /// Returns `None` for an empty slice.
    pub fn describe(values: &[f64], percentiles: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });

        Some(Self {
            count: n,
            mean,
            std,
            min: sorted[0],
            percentiles: percentiles
                .iter()
                .map(|p| (*p, quantile_sorted(&sorted, *p)))
                .collect(),
            max: sorted[n - 1],
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "count  {}", self.count);
        let _ = writeln!(out, "mean   {:.6}", self.mean);
        match self.std {
            Some(std) => {
                let _ = writeln!(out, "std    {:.6}", std);
            }
            None => {
                let _ = writeln!(out, "std    NaN");
            }
        }
        let _ = writeln!(out, "min    {:.6}", self.min);
        for (p, v) in &self.percentiles {
            let _ = writeln!(out, "{:<6} {:.6}", format_percentile(*p), v);
        }
        let _ = write!(out, "max    {:.6}", self.max);
        out
    }
}

/// Linear interpolation between the closest ranks.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    // Infinite bounds would turn an exact rank into NaN
    if lo == hi || frac == 0.0 || sorted[lo] == sorted[hi] {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `0.995` renders as `99.5%`.
pub fn format_percentile(p: f64) -> String {
    let pct = p * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{}%", pct.round() as i64)
    } else {
        let s = format!("{:.3}", pct);
        format!("{}%", s.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// What the auditor computed over the positive-price rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAudit {
    pub summary: Summary,
    pub top_unique_prices: Vec<f64>,
    pub top_rows: Vec<Record>,
}

/// Read-only stage logging the positive price distribution so the outlier
/// threshold can be reviewed.
pub struct DistributionAuditor {
    config: AuditConfig,
}

impl DistributionAuditor {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn audit(&self, dataset: &Dataset) -> Option<PriceAudit> {
        let positive: Vec<&Record> = dataset
            .records()
            .iter()
            .filter(|r| r.unit_price > 0.0)
            .collect();
        let prices: Vec<f64> = positive.iter().map(|r| r.unit_price).collect();
        let summary = Summary::describe(&prices, &self.config.price_percentiles)?;

        let mut unique = prices.clone();
        unique.sort_by(|a, b| b.total_cmp(a));
        unique.dedup();
        unique.truncate(self.config.top_n);

        // Stable sort, so equal prices keep their original row order
        let mut ranked = positive;
        ranked.sort_by(|a, b| b.unit_price.total_cmp(&a.unit_price));
        let top_rows = ranked
            .into_iter()
            .take(self.config.top_n)
            .cloned()
            .collect();

        Some(PriceAudit {
            summary,
            top_unique_prices: unique,
            top_rows,
        })
    }
}

impl Stage for DistributionAuditor {
    fn name(&self) -> &'static str {
        "distribution_audit"
    }

    fn apply(&self, dataset: Dataset) -> Result<Dataset> {
        let Some(audit) = self.audit(&dataset) else {
            warn!("No positive prices available for outlier inspection.");
            return Ok(dataset);
        };

        info!("Positive price distribution summary:\n{}", audit.summary.render());

        let prices: Vec<String> = audit
            .top_unique_prices
            .iter()
            .map(|p| format!("{:.2}", p))
            .collect();
        info!(
            "Top {} unique positive prices (descending):\n{}",
            self.config.top_n,
            prices.join("\n")
        );

        let mut rows =
            String::from("Invoice | StockCode | Description | Quantity | Price | InvoiceDate");
        for r in &audit.top_rows {
            let _ = write!(
                rows,
                "\n{} | {} | {} | {} | {:.2} | {}",
                r.invoice_id.as_deref().unwrap_or("<NA>"),
                r.stock_code.as_deref().unwrap_or("<NA>"),
                r.description.as_deref().unwrap_or("<NA>"),
                r.quantity,
                r.unit_price,
                r.invoice_timestamp.format("%Y-%m-%d %H:%M:%S"),
            );
        }
        info!("Top {} rows by positive price:\n{}", self.config.top_n, rows);

        Ok(dataset)
    }
}

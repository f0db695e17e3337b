use metrics::counter;
use tracing::{error, info};

use crate::config::CleaningRules;
use crate::error::{QualityGateError, Result, Violation};
use crate::pipeline::Stage;
use crate::types::{Dataset, Record};

/// Terminal whole-dataset checks run before anything is persisted.
///
/// Every check is evaluated; the gate fails with all violations at once.
/// The check itself is pure, so running it twice gives the same verdict.
pub struct QualityGate {
    rules: CleaningRules,
}

impl QualityGate {
    pub fn new(rules: CleaningRules) -> Self {
        Self { rules }
    }

    pub fn check(&self, dataset: &Dataset) -> std::result::Result<(), QualityGateError> {
        let records = dataset.records();
        let count = |pred: &dyn Fn(&Record) -> bool| records.iter().filter(|r| pred(*r)).count();
        let target = self.rules.target_country.as_str();
        let threshold = self.rules.outlier_price_threshold;

        let mut checks: Vec<(&str, usize)> = vec![
            (
                "country_not_target",
                count(&|r: &Record| r.country.as_deref().map_or(true, |c| c != target)),
            ),
            ("negative_quantity", count(&|r: &Record| r.quantity < 0)),
            ("non_positive_price", count(&|r: &Record| r.unit_price <= 0.0)),
            ("price_above_threshold", count(&|r: &Record| r.unit_price > threshold)),
        ];

        // Non-nullable columns; quantity, timestamp and price are typed and
        // cannot hold nulls once coerced.
        checks.push(("null_invoice", count(&|r: &Record| r.invoice_id.is_none())));
        checks.push(("null_stock_code", count(&|r: &Record| r.stock_code.is_none())));
        checks.push(("null_country", count(&|r: &Record| r.country.is_none())));

        let violations: Vec<Violation> = checks
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(check, n)| Violation {
                check: check.to_string(),
                count: n,
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(QualityGateError { violations })
        }
    }
}

impl Stage for QualityGate {
    fn name(&self) -> &'static str {
        "quality_gate"
    }

    fn apply(&self, dataset: Dataset) -> Result<Dataset> {
        match self.check(&dataset) {
            Ok(()) => {
                counter!("pricing_quality_gate_runs_total", "outcome" => "pass").increment(1);
                info!("Quality gate passed for {} rows", dataset.len());
                Ok(dataset)
            }
            Err(err) => {
                counter!("pricing_quality_gate_runs_total", "outcome" => "fail").increment(1);
                for v in &err.violations {
                    error!("Quality check failed: {} | Offending rows: {}", v.check, v.count);
                }
                Err(err.into())
            }
        }
    }
}

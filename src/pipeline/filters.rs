use metrics::counter;
use tracing::info;

use crate::config::CleaningRules;
use crate::error::Result;
use crate::pipeline::Stage;
use crate::types::{Dataset, Record};

/// A single business predicate over one record.
pub trait RowRule {
    fn name(&self) -> &'static str;

    /// Human readable label used in the stage log line.
    fn label(&self) -> String;

    fn rejects(&self, record: &Record) -> bool;
}

/// Keeps only rows whose country matches the target, compared trimmed and
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct GeographyRule {
    target_lower: String,
}

impl GeographyRule {
    pub fn new(target_country: &str) -> Self {
        Self {
            target_lower: target_country.trim().to_lowercase(),
        }
    }
}

impl RowRule for GeographyRule {
    fn name(&self) -> &'static str {
        "geography"
    }

    fn label(&self) -> String {
        "Removed non-target-country rows".to_string()
    }

    fn rejects(&self, record: &Record) -> bool {
        // Second normalization: country is already trimmed by standardization.
        match &record.country {
            Some(country) => country.trim().to_lowercase() != self.target_lower,
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancellationRule {
    prefix: String,
}

impl CancellationRule {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }
}

impl RowRule for CancellationRule {
    fn name(&self) -> &'static str {
        "cancellation"
    }

    fn label(&self) -> String {
        "Removed cancelled invoice rows".to_string()
    }

    fn rejects(&self, record: &Record) -> bool {
        record
            .invoice_id
            .as_deref()
            .map(|id| id.starts_with(&self.prefix))
            .unwrap_or(false)
    }
}

/// Zero quantities are retained.
#[derive(Debug, Clone, Default)]
pub struct NegativeQuantityRule;

impl RowRule for NegativeQuantityRule {
    fn name(&self) -> &'static str {
        "negative_quantity"
    }

    fn label(&self) -> String {
        "Removed negative-quantity rows".to_string()
    }

    fn rejects(&self, record: &Record) -> bool {
        record.quantity < 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct NonPositivePriceRule;

impl RowRule for NonPositivePriceRule {
    fn name(&self) -> &'static str {
        "non_positive_price"
    }

    fn label(&self) -> String {
        "Removed non-positive-price rows".to_string()
    }

    fn rejects(&self, record: &Record) -> bool {
        record.unit_price <= 0.0
    }
}

/// Editorial price ceiling. Rows strictly above the threshold are removed.
#[derive(Debug, Clone)]
pub struct OutlierPriceRule {
    threshold: f64,
}

impl OutlierPriceRule {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl RowRule for OutlierPriceRule {
    fn name(&self) -> &'static str {
        "price_outlier"
    }

    fn label(&self) -> String {
        format!(
            "Removed economically implausible outlier rows (price > {:.2})",
            self.threshold
        )
    }

    fn rejects(&self, record: &Record) -> bool {
        record.unit_price > self.threshold
    }
}

/// Adapts a `RowRule` into a pipeline stage that removes rejected rows and
/// logs the outcome.
pub struct RuleFilter<R> {
    rule: R,
}

impl<R: RowRule> RuleFilter<R> {
    pub fn new(rule: R) -> Self {
        Self { rule }
    }
}

impl<R: RowRule> Stage for RuleFilter<R> {
    fn name(&self) -> &'static str {
        self.rule.name()
    }

    fn apply(&self, mut dataset: Dataset) -> Result<Dataset> {
        let outcome = dataset.reject_where(self.rule.name(), |r| self.rule.rejects(r));
        info!(
            "{}: {} | Remaining: {}",
            self.rule.label(),
            outcome.rows_removed,
            outcome.rows_remaining
        );
        counter!("pricing_rows_removed_total", "stage" => self.rule.name())
            .increment(outcome.rows_removed as u64);
        Ok(dataset)
    }
}

/// The rule filters in their policy order, with the outlier rule separate
/// because the distribution audit runs between them.
pub fn pre_audit_filters(rules: &CleaningRules) -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(RuleFilter::new(GeographyRule::new(&rules.target_country))),
        Box::new(RuleFilter::new(CancellationRule::new(&rules.cancellation_prefix))),
        Box::new(RuleFilter::new(NegativeQuantityRule)),
        Box::new(RuleFilter::new(NonPositivePriceRule)),
    ]
}

pub fn outlier_filter(rules: &CleaningRules) -> Box<dyn Stage> {
    Box::new(RuleFilter::new(OutlierPriceRule::new(rules.outlier_price_threshold)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::record;

    fn invoices(dataset: &Dataset) -> Vec<String> {
        dataset
            .records()
            .iter()
            .map(|r| r.invoice_id.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn geography_matches_trimmed_and_case_insensitive() {
        let rule = GeographyRule::new("United Kingdom");
        assert!(!rule.rejects(&record("1", "United Kingdom", 1, 1.0)));
        assert!(!rule.rejects(&record("1", " united kingdom ", 1, 1.0)));
        assert!(rule.rejects(&record("1", "Germany", 1, 1.0)));

        let mut no_country = record("1", "United Kingdom", 1, 1.0);
        no_country.country = None;
        assert!(rule.rejects(&no_country));
    }

    #[test]
    fn cancellation_uses_prefix_on_uppercased_invoice() {
        let rule = CancellationRule::new("C");
        assert!(rule.rejects(&record("C12345", "United Kingdom", 1, 1.0)));
        assert!(!rule.rejects(&record("A12345", "United Kingdom", 1, 1.0)));
        // Matching is case-sensitive; lowercase input is uppercased upstream
        assert!(!rule.rejects(&record("c12345", "United Kingdom", 1, 1.0)));

        let mut no_invoice = record("C1", "United Kingdom", 1, 1.0);
        no_invoice.invoice_id = None;
        assert!(!rule.rejects(&no_invoice));
    }

    #[test]
    fn zero_quantity_is_kept() {
        let rule = NegativeQuantityRule;
        assert!(!rule.rejects(&record("1", "United Kingdom", 0, 1.0)));
        assert!(rule.rejects(&record("1", "United Kingdom", -5, 1.0)));
    }

    #[test]
    fn price_rules_bound_both_ends() {
        assert!(NonPositivePriceRule.rejects(&record("1", "United Kingdom", 1, 0.0)));
        assert!(NonPositivePriceRule.rejects(&record("1", "United Kingdom", 1, -11062.06)));
        assert!(!NonPositivePriceRule.rejects(&record("1", "United Kingdom", 1, 0.001)));

        let outlier = OutlierPriceRule::new(1000.0);
        assert!(!outlier.rejects(&record("1", "United Kingdom", 1, 1000.0)));
        assert!(outlier.rejects(&record("1", "United Kingdom", 1, 1000.01)));
    }

    #[test]
    fn each_stage_sees_only_survivors() {
        let rules = CleaningRules::default();
        let mut dataset = Dataset::new(vec![
            record("536365", "United Kingdom", 6, 2.55),
            record("C536370", "United Kingdom", 3, 1.5),
            record("536380", "Germany", 2, 5.0),
            record("536390", "United Kingdom", -5, 5.0),
            record("536395", "United Kingdom", 1, 0.0),
            record("C536399", "France", -1, 0.0),
            record("536400", "United Kingdom", 1, 5000.0),
        ]);
        for stage in pre_audit_filters(&rules) {
            dataset = stage.apply(dataset).unwrap();
        }
        dataset = outlier_filter(&rules).apply(dataset).unwrap();

        assert_eq!(invoices(&dataset), vec!["536365"]);

        let removed: Vec<(String, usize)> = dataset
            .history()
            .iter()
            .map(|o| (o.stage.clone(), o.rows_removed))
            .collect();
        // The French cancellation row is only counted by the geography stage
        assert_eq!(
            removed,
            vec![
                ("geography".to_string(), 2),
                ("cancellation".to_string(), 1),
                ("negative_quantity".to_string(), 1),
                ("non_positive_price".to_string(), 1),
                ("price_outlier".to_string(), 1),
            ]
        );
        for outcome in dataset.history() {
            assert_eq!(outcome.rows_entering - outcome.rows_removed, outcome.rows_remaining);
        }
    }
}

use chrono::NaiveDateTime;

/// One typed transaction line.
///
/// String fields stay optional because an empty source cell is a null, and
/// nulls in non-nullable fields are only rejected by the quality gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub invoice_id: Option<String>,
    pub stock_code: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
    pub invoice_timestamp: NaiveDateTime,
    pub unit_price: f64,
    pub customer_id: Option<i64>,
    pub country: Option<String>,
}

/// The audit unit logged after every filtering stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: String,
    pub rows_entering: usize,
    pub rows_removed: usize,
    pub rows_remaining: usize,
}

/// The in-flight set of records plus the outcome of every stage that
/// removed rows from it. Rows can only ever be removed.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    history: Vec<StageOutcome>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            history: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn history(&self) -> &[StageOutcome] {
        &self.history
    }

    /// Removes every record the predicate rejects, keeping relative order,
    /// and appends the resulting outcome to the history.
    pub fn reject_where<F>(&mut self, stage: &str, mut rejects: F) -> &StageOutcome
    where
        F: FnMut(&Record) -> bool,
    {
        let rows_entering = self.records.len();
        self.records.retain(|r| !rejects(r));
        let rows_remaining = self.records.len();
        self.history.push(StageOutcome {
            stage: stage.to_string(),
            rows_entering,
            rows_removed: rows_entering - rows_remaining,
            rows_remaining,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

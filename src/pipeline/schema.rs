use crate::error::{Result, StudyError};
use crate::pipeline::source::RawTable;

/// Confirms every required column is present, reporting all missing ones.
pub fn validate_columns(table: &RawTable, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !table.has_column(col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StudyError::Schema { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUIRED_COLUMNS;

    fn table(headers: &[&str]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    #[test]
    fn full_header_passes() {
        assert!(validate_columns(&table(&REQUIRED_COLUMNS), &REQUIRED_COLUMNS).is_ok());
    }

    #[test]
    fn names_exactly_the_missing_column() {
        let headers: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| *c != "Price")
            .collect();
        match validate_columns(&table(&headers), &REQUIRED_COLUMNS) {
            Err(StudyError::Schema { missing }) => assert_eq!(missing, vec!["Price".to_string()]),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn reports_every_missing_column() {
        match validate_columns(&table(&["Invoice", "StockCode"]), &REQUIRED_COLUMNS) {
            Err(StudyError::Schema { missing }) => assert_eq!(missing.len(), 6),
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}

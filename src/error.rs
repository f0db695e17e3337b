use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Dataset not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error(transparent)]
    QualityGate(#[from] QualityGateError),

    #[error("Failed to persist dataset to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported phase: {0}")]
    UnsupportedPhase(u8),
}

impl StudyError {
    pub fn persistence(
        path: impl Into<PathBuf>,
        err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StudyError::Persistence {
            path: path.into(),
            source: err.into(),
        }
    }
}

/// A single failed whole-dataset check and how many rows violate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub check: String,
    pub count: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} rows)", self.check, self.count)
    }
}

/// Every violated quality check, collected before failing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct QualityGateError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for QualityGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quality gate failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;

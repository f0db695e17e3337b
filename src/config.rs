use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::*;
use crate::error::{Result, StudyError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub paths: PathsConfig,
    pub cleaning: CleaningRules,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    pub clean_data: PathBuf,
    pub docs: PathBuf,
    pub logs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from(DEFAULT_RAW_DATA_FILE),
            clean_data: PathBuf::from(DEFAULT_CLEAN_DATA_FILE),
            docs: PathBuf::from(DEFAULT_DOCS_DIR),
            logs: PathBuf::from(DEFAULT_LOGS_DIR),
        }
    }
}

impl PathsConfig {
    pub fn report_file(&self) -> PathBuf {
        self.docs.join(PHASE1_REPORT_FILE)
    }
}

/// Frozen policy values of the cleaning rule chain.
///
/// - `target_country`: rows whose country does not match are removed.
/// - `cancellation_prefix`: invoices starting with it are cancellations.
/// - `outlier_price_threshold`: absolute upper bound on unit price.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    pub target_country: String,
    pub cancellation_prefix: String,
    pub outlier_price_threshold: f64,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            target_country: DEFAULT_TARGET_COUNTRY.to_string(),
            cancellation_prefix: DEFAULT_CANCELLATION_PREFIX.to_string(),
            outlier_price_threshold: DEFAULT_OUTLIER_PRICE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub price_percentiles: Vec<f64>,
    pub top_n: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            price_percentiles: DEFAULT_PRICE_PERCENTILES.to_vec(),
            top_n: DEFAULT_OUTLIER_REVIEW_TOP_N,
        }
    }
}

impl StudyConfig {
    /// Resolves the configuration file and loads it.
    ///
    /// An explicit path must exist. Without one, `PRICING_STUDY_CONFIG` is
    /// consulted, then `config.toml` in the working directory, and finally
    /// the built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
                _ => {
                    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                    default.exists().then_some(default)
                }
            },
        };

        let config = match candidate {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StudyError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StudyConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rules = &self.cleaning;
        if rules.target_country.trim().is_empty() {
            return Err(StudyError::Config("cleaning.target_country must not be empty".into()));
        }
        if rules.cancellation_prefix.is_empty() {
            return Err(StudyError::Config(
                "cleaning.cancellation_prefix must not be empty".into(),
            ));
        }
        if !rules.outlier_price_threshold.is_finite() || rules.outlier_price_threshold <= 0.0 {
            return Err(StudyError::Config(format!(
                "cleaning.outlier_price_threshold must be a positive number, got {}",
                rules.outlier_price_threshold
            )));
        }
        if let Some(p) = self
            .audit
            .price_percentiles
            .iter()
            .find(|p| !(**p > 0.0 && **p < 1.0))
        {
            return Err(StudyError::Config(format!(
                "audit.price_percentiles must lie strictly between 0 and 1, got {}",
                p
            )));
        }
        if self.audit.top_n == 0 {
            return Err(StudyError::Config("audit.top_n must be at least 1".into()));
        }
        Ok(())
    }
}

/// Column names of the raw transactional export.
/// These are the header names as they appear in the source CSV.
pub const COL_INVOICE: &str = "Invoice";
pub const COL_STOCK_CODE: &str = "StockCode";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_QUANTITY: &str = "Quantity";
pub const COL_INVOICE_DATE: &str = "InvoiceDate";
pub const COL_PRICE: &str = "Price";
pub const COL_CUSTOMER_ID: &str = "Customer ID";
pub const COL_COUNTRY: &str = "Country";

/// Columns the cleaning phase cannot run without, in source order.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    COL_INVOICE,
    COL_STOCK_CODE,
    COL_DESCRIPTION,
    COL_QUANTITY,
    COL_INVOICE_DATE,
    COL_PRICE,
    COL_CUSTOMER_ID,
    COL_COUNTRY,
];

/// Columns that get trimmed during string standardization.
pub const STRING_COLUMNS: [&str; 4] = [COL_INVOICE, COL_STOCK_CODE, COL_DESCRIPTION, COL_COUNTRY];

// Cleaning rule defaults
pub const DEFAULT_TARGET_COUNTRY: &str = "United Kingdom";
pub const DEFAULT_CANCELLATION_PREFIX: &str = "C";
pub const DEFAULT_OUTLIER_PRICE_THRESHOLD: f64 = 1000.0;

// Distribution audit defaults
pub const DEFAULT_PRICE_PERCENTILES: [f64; 6] = [0.5, 0.9, 0.95, 0.99, 0.995, 0.999];
pub const DEFAULT_OUTLIER_REVIEW_TOP_N: usize = 20;

// Paths, relative to the working directory
pub const DEFAULT_RAW_DATA_FILE: &str = "data/raw/online_retail_II.csv";
pub const DEFAULT_CLEAN_DATA_FILE: &str = "data/processed/online_retail_clean.parquet";
pub const DEFAULT_DOCS_DIR: &str = "docs";
pub const DEFAULT_LOGS_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const CONFIG_ENV_VAR: &str = "PRICING_STUDY_CONFIG";

pub const EXPERIMENT_LOG_FILE: &str = "experiment.log";
pub const PHASE1_LOG_FILE: &str = "phase1_raw_inspection.log";
pub const PHASE1_REPORT_FILE: &str = "phase1_raw_inspection.md";

// Phase identifiers used by the dispatcher
pub const PHASE_RAW_INSPECTION: u8 = 1;
pub const PHASE_CLEANING: u8 = 2;

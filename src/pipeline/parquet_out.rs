use parquet::basic::{
    Compression, ConvertedType, LogicalType, Repetition, Type as PhysicalType, ZstdLevel,
};
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{Type, TypePtr};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, StudyError};
use crate::types::{Dataset, Record};

/// Where the dataset ended up and what was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOutput {
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

fn utf8(name: &str, repetition: Repetition) -> std::result::Result<TypePtr, ParquetError> {
    Ok(Arc::new(
        Type::primitive_type_builder(name, PhysicalType::BYTE_ARRAY)
            .with_repetition(repetition)
            .with_logical_type(Some(LogicalType::String))
            .build()?,
    ))
}

fn int64(name: &str, repetition: Repetition) -> std::result::Result<TypePtr, ParquetError> {
    Ok(Arc::new(
        Type::primitive_type_builder(name, PhysicalType::INT64)
            .with_repetition(repetition)
            .build()?,
    ))
}

// invoice_id, stock_code, description?, quantity, invoice_timestamp,
// unit_price, customer_id?, country
fn build_schema() -> std::result::Result<TypePtr, ParquetError> {
    let fields = vec![
        utf8("invoice_id", Repetition::REQUIRED)?,
        utf8("stock_code", Repetition::REQUIRED)?,
        utf8("description", Repetition::OPTIONAL)?,
        int64("quantity", Repetition::REQUIRED)?,
        Arc::new(
            Type::primitive_type_builder("invoice_timestamp", PhysicalType::INT64)
                .with_repetition(Repetition::REQUIRED)
                .with_converted_type(ConvertedType::TIMESTAMP_MICROS)
                .build()?,
        ),
        Arc::new(
            Type::primitive_type_builder("unit_price", PhysicalType::DOUBLE)
                .with_repetition(Repetition::REQUIRED)
                .build()?,
        ),
        int64("customer_id", Repetition::OPTIONAL)?,
        utf8("country", Repetition::REQUIRED)?,
    ];
    Ok(Arc::new(
        Type::group_type_builder("schema").with_fields(fields).build()?,
    ))
}

fn required_text(records: &[Record], field: fn(&Record) -> Option<&String>) -> Vec<ByteArray> {
    // The quality gate guarantees presence; a missing value is written empty.
    records
        .iter()
        .map(|r| ByteArray::from(field(r).map(|s| s.as_str()).unwrap_or("")))
        .collect()
}

fn optional_text(
    records: &[Record],
    field: fn(&Record) -> Option<&String>,
) -> (Vec<ByteArray>, Vec<i16>) {
    let mut values = Vec::new();
    let mut defs = Vec::with_capacity(records.len());
    for r in records {
        match field(r) {
            Some(s) => {
                values.push(ByteArray::from(s.as_str()));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (values, defs)
}

fn write_file(records: &[Record], file: File) -> std::result::Result<(), ParquetError> {
    let schema = build_schema()?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let invoice = required_text(records, |r| r.invoice_id.as_ref());
    let stock = required_text(records, |r| r.stock_code.as_ref());
    let (description, description_defs) = optional_text(records, |r| r.description.as_ref());
    let quantity: Vec<i64> = records.iter().map(|r| r.quantity).collect();
    let timestamp: Vec<i64> = records
        .iter()
        .map(|r| r.invoice_timestamp.and_utc().timestamp_micros())
        .collect();
    let price: Vec<f64> = records.iter().map(|r| r.unit_price).collect();
    let customer: Vec<i64> = records.iter().filter_map(|r| r.customer_id).collect();
    let customer_defs: Vec<i16> = records
        .iter()
        .map(|r| i16::from(r.customer_id.is_some()))
        .collect();
    let country = required_text(records, |r| r.country.as_ref());

    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(props))?;
    let mut rg = writer.next_row_group()?;
    let mut col_index = 0;
    while let Some(mut col) = rg.next_column()? {
        match col_index {
            0 => {
                col.typed::<ByteArrayType>().write_batch(&invoice, None, None)?;
            }
            1 => {
                col.typed::<ByteArrayType>().write_batch(&stock, None, None)?;
            }
            2 => {
                col.typed::<ByteArrayType>().write_batch(
                    &description,
                    Some(description_defs.as_slice()),
                    None,
                )?;
            }
            3 => {
                col.typed::<Int64Type>().write_batch(&quantity, None, None)?;
            }
            4 => {
                col.typed::<Int64Type>().write_batch(&timestamp, None, None)?;
            }
            5 => {
                col.typed::<DoubleType>().write_batch(&price, None, None)?;
            }
            6 => {
                col.typed::<Int64Type>().write_batch(
                    &customer,
                    Some(customer_defs.as_slice()),
                    None,
                )?;
            }
            7 => {
                col.typed::<ByteArrayType>().write_batch(&country, None, None)?;
            }
            _ => {
                return Err(ParquetError::General(
                    "Unexpected column - schema mismatch".to_string(),
                ))
            }
        }
        col.close()?;
        col_index += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.parquet".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Writes the final dataset as a single parquet file.
///
/// Bytes are written to a sibling temporary file that only replaces the
/// destination once the writer has closed cleanly.
pub struct ParquetSink {
    path: PathBuf,
}

impl ParquetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(&self, dataset: Dataset) -> Result<PersistedOutput> {
        let path = &self.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StudyError::persistence(path, e))?;
        }

        let rows = dataset.len();
        let records = dataset.into_records();
        let tmp = temp_path_for(path);

        let written = File::create(&tmp)
            .map_err(|e| StudyError::persistence(path, e))
            .and_then(|file| {
                write_file(&records, file).map_err(|e| StudyError::persistence(path, e))
            })
            .and_then(|_| fs::rename(&tmp, path).map_err(|e| StudyError::persistence(path, e)));

        if let Err(err) = written {
            if tmp.exists() {
                if let Err(e) = fs::remove_file(&tmp) {
                    warn!("Could not remove partial output {}: {}", tmp.display(), e);
                }
            }
            return Err(err);
        }

        let bytes = fs::read(path).map_err(|e| StudyError::persistence(path, e))?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        info!(
            "Persisted {} rows to {} (sha256 {})",
            rows,
            path.display(),
            sha256
        );

        Ok(PersistedOutput {
            path: path.clone(),
            rows,
            sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::record;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use parquet::record::RowAccessor;

    #[test]
    fn writes_readable_parquet_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clean.parquet");

        let mut anonymous = record("536366", "United Kingdom", 2, 3.75);
        anonymous.customer_id = None;
        anonymous.description = None;
        let dataset = Dataset::new(vec![record("536365", "United Kingdom", 6, 2.55), anonymous]);

        let out = ParquetSink::new(&path).persist(dataset).unwrap();
        assert_eq!(out.rows, 2);
        assert_eq!(out.sha256.len(), 64);
        assert!(!temp_path_for(&path).exists());

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);

        let rows: Vec<_> = reader
            .get_row_iter(None)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(rows[0].get_string(0).unwrap(), "536365");
        assert_eq!(rows[0].get_long(3).unwrap(), 6);
        assert_eq!(rows[0].get_double(5).unwrap(), 2.55);
        assert_eq!(rows[0].get_long(6).unwrap(), 17850);
        assert!(rows[1].get_string(2).is_err());
        assert!(rows[1].get_long(6).is_err());
        assert_eq!(rows[1].get_string(7).unwrap(), "United Kingdom");
    }

    #[test]
    fn failed_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should go makes the final rename fail
        let path = dir.path().join("clean.parquet");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let dataset = Dataset::new(vec![record("536365", "United Kingdom", 6, 2.55)]);
        let err = ParquetSink::new(&path).persist(dataset).unwrap_err();
        match &err {
            StudyError::Persistence { source, .. } => {
                assert!(source.downcast_ref::<std::io::Error>().is_some())
            }
            other => panic!("expected persistence error, got {:?}", other),
        }
        assert!(!temp_path_for(&path).exists());
        assert!(path.is_dir());
    }
}

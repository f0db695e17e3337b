// Cleaning pipeline: schema check, coercion, rule filters, audit, gate, sink

pub mod audit;
pub mod coerce;
pub mod filters;
pub mod parquet_out;
pub mod quality_gate;
pub mod schema;
pub mod source;

use std::path::PathBuf;
use tracing::{info, info_span};

use crate::config::StudyConfig;
use crate::constants::REQUIRED_COLUMNS;
use crate::error::Result;
use crate::types::{Dataset, StageOutcome};

pub use audit::DistributionAuditor;
pub use coerce::{CoercionReport, TypeCoercion};
pub use parquet_out::{ParquetSink, PersistedOutput};
pub use quality_gate::QualityGate;
pub use source::RawTable;

/// A step that transforms the in-flight dataset. It may remove rows and may
/// fail fatally, but it never adds rows.
pub trait Stage {
    fn name(&self) -> &'static str;

    fn apply(&self, dataset: Dataset) -> Result<Dataset>;
}

/// Result of a successful cleaning run.
#[derive(Debug, Clone)]
pub struct CleaningReport {
    pub coercion: CoercionReport,
    pub outcomes: Vec<StageOutcome>,
    pub output: PersistedOutput,
}

/// The ordered cleaning pipeline.
///
/// Stages run strictly in sequence, each on the survivors of the previous
/// one. The quality gate always runs last and the sink is only reached when
/// it passes.
pub struct CleaningPipeline {
    input: PathBuf,
    coercion: TypeCoercion,
    stages: Vec<Box<dyn Stage>>,
    gate: QualityGate,
    sink: ParquetSink,
}

impl CleaningPipeline {
    pub fn new(
        input: impl Into<PathBuf>,
        stages: Vec<Box<dyn Stage>>,
        gate: QualityGate,
        sink: ParquetSink,
    ) -> Self {
        Self {
            input: input.into(),
            coercion: TypeCoercion::new(),
            stages,
            gate,
            sink,
        }
    }

    pub fn from_config(config: &StudyConfig) -> Self {
        Self::new(
            config.paths.raw_data.clone(),
            Self::default_stages(config),
            QualityGate::new(config.cleaning.clone()),
            ParquetSink::new(config.paths.clean_data.clone()),
        )
    }

    /// Geography, cancellation, negative quantity, non-positive price, the
    /// distribution audit, then the outlier cut.
    pub fn default_stages(config: &StudyConfig) -> Vec<Box<dyn Stage>> {
        let mut stages = filters::pre_audit_filters(&config.cleaning);
        stages.push(Box::new(DistributionAuditor::new(config.audit.clone())));
        stages.push(filters::outlier_filter(&config.cleaning));
        stages
    }

    /// Drops a stage by name. The quality gate is not part of the stage list
    /// and cannot be removed.
    pub fn without_stage(mut self, name: &str) -> Self {
        self.stages.retain(|s| s.name() != name);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every in-memory step on an already loaded table: schema check,
    /// standardization, coercion, the stage chain and the quality gate.
    pub fn clean(&self, mut table: RawTable) -> Result<(Dataset, CoercionReport)> {
        schema::validate_columns(&table, &REQUIRED_COLUMNS)?;
        coerce::standardize_strings(&mut table);
        let (mut dataset, coercion) = self.coercion.run(&table)?;
        drop(table);
        info!("Initial row count: {}", dataset.len());

        for stage in &self.stages {
            let span = info_span!("stage", name = stage.name());
            let _enter = span.enter();
            dataset = stage.apply(dataset)?;
        }

        dataset = self.gate.apply(dataset)?;
        Ok((dataset, coercion))
    }

    pub fn run(&self) -> Result<CleaningReport> {
        info!("Phase 2 data cleaning started.");
        info!("Input dataset: {}", self.input.display());
        info!("Output dataset: {}", self.sink.path().display());

        let table = source::read_raw_table(&self.input)?;
        let (dataset, coercion) = self.clean(table)?;
        let outcomes = dataset.history().to_vec();
        let output = self.sink.persist(dataset)?;

        info!(
            "Phase 2 data cleaning completed. Saved cleaned data to {}",
            output.path.display()
        );
        Ok(CleaningReport {
            coercion,
            outcomes,
            output,
        })
    }
}

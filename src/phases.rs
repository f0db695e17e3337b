use tracing::info;

use crate::config::StudyConfig;
use crate::constants::{PHASE_CLEANING, PHASE_RAW_INSPECTION};
use crate::error::{Result, StudyError};
use crate::inspection::RawInspection;
use crate::pipeline::CleaningPipeline;

/// The named phases of the study workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    RawInspection,
    Cleaning,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::RawInspection, Phase::Cleaning];

    pub fn number(self) -> u8 {
        match self {
            Phase::RawInspection => PHASE_RAW_INSPECTION,
            Phase::Cleaning => PHASE_CLEANING,
        }
    }

    pub fn from_number(n: u8) -> Result<Self> {
        Phase::ALL
            .into_iter()
            .find(|p| p.number() == n)
            .ok_or(StudyError::UnsupportedPhase(n))
    }

    pub fn run(self, config: &StudyConfig) -> Result<()> {
        match self {
            Phase::RawInspection => {
                RawInspection::new(
                    config.paths.raw_data.clone(),
                    config.paths.report_file(),
                    &config.cleaning.cancellation_prefix,
                )
                .run()?;
            }
            Phase::Cleaning => {
                CleaningPipeline::from_config(config).run()?;
            }
        }
        Ok(())
    }
}

pub fn available_phases() -> Vec<u8> {
    let mut phases: Vec<u8> = Phase::ALL.iter().map(|p| p.number()).collect();
    phases.sort_unstable();
    phases
}

pub fn run_phase(n: u8, config: &StudyConfig) -> Result<()> {
    Phase::from_number(n)?.run(config)
}

/// Runs every phase in order, stopping at the first failure.
pub fn run_workflow(config: &StudyConfig) -> Result<()> {
    for n in available_phases() {
        info!("Starting phase {}", n);
        run_phase(n, config)?;
    }
    Ok(())
}

//! Result types for a batch run.

use crate::discover::Job;
use crate::error::{BatchError, JobError, JobFailure};
use serde::{Deserialize, Serialize};

/// What happened to one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub job: Job,
    /// Size of the written document; `0` on failure.
    pub bytes_written: usize,
    /// Wall time from the start of the job (including waiting for a
    /// converter) to its outcome.
    pub duration_ms: u64,
    /// `None` when the output is on disk.
    pub error: Option<JobError>,
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters over a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
    pub duration_ms: u64,
}

/// Every outcome of a batch run plus derived stats.
///
/// Outcomes are in completion order, which is not meaningful; look jobs up
/// by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub outcomes: Vec<ConversionOutcome>,
    pub stats: BatchStats,
}

impl BatchResult {
    /// Assemble a result, deriving the stats from `outcomes`.
    pub fn from_outcomes(outcomes: Vec<ConversionOutcome>, duration_ms: u64) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let stats = BatchStats {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            bytes_written: outcomes.iter().map(|o| o.bytes_written as u64).sum(),
            duration_ms,
        };
        Self { outcomes, stats }
    }

    /// At least one job ran and none failed.
    pub fn is_success(&self) -> bool {
        self.stats.total > 0 && self.stats.failed == 0
    }

    /// Failing inputs with their causes, sorted by input path.
    pub fn failures(&self) -> Vec<JobFailure> {
        let mut failures: Vec<JobFailure> = self
            .outcomes
            .iter()
            .filter_map(|o| {
                o.error.as_ref().map(|error| JobFailure {
                    input: o.job.input.clone(),
                    error: error.clone(),
                })
            })
            .collect();
        failures.sort_by(|a, b| a.input.cmp(&b.input));
        failures
    }

    /// The outcome recorded for `input`, if it was part of the batch.
    pub fn outcome_for(&self, input: &std::path::Path) -> Option<&ConversionOutcome> {
        self.outcomes.iter().find(|o| o.job.input == input)
    }

    /// Collapse into `Ok(self)` only if every job succeeded.
    ///
    /// # Errors
    /// - [`BatchError::EmptyBatch`] — no job ran
    /// - [`BatchError::JobsFailed`] — naming every failing input
    pub fn into_result(self) -> Result<Self, BatchError> {
        if self.stats.total == 0 {
            return Err(BatchError::EmptyBatch);
        }
        if self.stats.failed > 0 {
            return Err(BatchError::JobsFailed {
                failed: self.stats.failed,
                total: self.stats.total,
                failures: self.failures(),
            });
        }
        Ok(self)
    }
}

//! Batch summary: a pure reducer over per-job reports.

use std::path::PathBuf;
use std::time::Duration;

use crate::job::{ConversionReport, Outcome};

/// Counts and failure details for a finished batch.
///
/// Built from reports in any arrival order; completion order carries no
/// meaning. This is the last internal consumer of job results; the
/// boundary renders it.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Input path and failure reason for each non-successful job.
    pub failures: Vec<(PathBuf, String)>,
    /// Total warning count across all jobs.
    pub warnings: usize,
    /// Sum of per-job wall-clock times.
    pub total_elapsed: Duration,
}

impl BatchSummary {
    /// Reduce a set of reports into a summary.
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a ConversionReport>,
    {
        let mut summary = Self::default();
        for report in reports {
            summary.total_elapsed += report.elapsed;
            summary.warnings += report.warnings.len();
            match &report.outcome {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::Failed(reason) => {
                    summary.failed += 1;
                    summary
                        .failures
                        .push((report.input.clone(), reason.to_string()));
                }
                Outcome::Cancelled => {
                    summary.cancelled += 1;
                    summary
                        .failures
                        .push((report.input.clone(), "cancelled".to_string()));
                }
            }
        }
        summary
    }

    /// Total jobs accounted for.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }

    /// True when every job succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} converted, {} failed, {} cancelled ({} total)",
            self.succeeded,
            self.failed,
            self.cancelled,
            self.total()
        )
    }
}

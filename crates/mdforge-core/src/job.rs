//! Conversion jobs and their per-file results.
//!
//! A job is created per input file when a batch is requested, owned by the
//! facade for its lifetime, and discarded once its report is emitted. The
//! status machine is monotonic: Pending → Running → one terminal state.

use std::path::PathBuf;
use std::time::Duration;

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No registered engine claims the format.
    UnsupportedFormat,
    /// Engines claim the format but none is installed.
    NoEngineAvailable { unavailable: Vec<String> },
    /// Dependency vanished between the registry probe and the call.
    EngineUnavailable,
    /// The backend ran and reported an error.
    ConversionFailed(String),
    /// The job exceeded its allotted duration.
    Timeout,
    /// The output path was not writable.
    IoWriteFailed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::UnsupportedFormat => write!(f, "unsupported format"),
            FailureReason::NoEngineAvailable { unavailable } if !unavailable.is_empty() => {
                write!(
                    f,
                    "no engine available (not installed: {})",
                    unavailable.join(", ")
                )
            }
            FailureReason::NoEngineAvailable { .. } => write!(f, "no engine available"),
            FailureReason::EngineUnavailable => write!(f, "engine is not installed"),
            FailureReason::ConversionFailed(detail) => write!(f, "{}", detail),
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::IoWriteFailed(detail) => write!(f, "output not writable: {}", detail),
        }
    }
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// One file's conversion, tracked by the facade.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Input document path.
    pub input: PathBuf,
    /// Resolved output path.
    pub output: PathBuf,
    /// Engine assigned during selection.
    pub engine_id: Option<String>,
    status: JobStatus,
}

impl ConversionJob {
    /// Create a pending job.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            engine_id: None,
            status: JobStatus::Pending,
        }
    }

    /// Current status.
    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Transition Pending → Running. No-op from any other state.
    pub fn start(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    /// Transition into a terminal state. A terminal state, once entered,
    /// is never re-entered or replaced.
    pub fn finish(&mut self, outcome: &Outcome) {
        debug_assert!(!self.status.is_terminal());
        if self.status.is_terminal() {
            return;
        }
        self.status = match outcome {
            Outcome::Succeeded => JobStatus::Succeeded,
            Outcome::Failed(_) => JobStatus::Failed,
            Outcome::Cancelled => JobStatus::Cancelled,
        };
    }
}

/// What the facade emits per job: the terminal record consumed by the
/// aggregator and the boundary.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Input document path.
    pub input: PathBuf,
    /// Output path the job targeted.
    pub output: PathBuf,
    /// Engine that ran (or would have run), when selection succeeded.
    pub engine_id: Option<String>,
    /// Terminal outcome.
    pub outcome: Outcome,
    /// Non-fatal notes from the engine.
    pub warnings: Vec<String>,
    /// Wall-clock time spent on the job.
    pub elapsed: Duration,
}

impl ConversionReport {
    /// Short failure description, if the job failed.
    pub fn failure_detail(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failed(reason) => Some(reason.to_string()),
            Outcome::Cancelled => Some("cancelled".to_string()),
            Outcome::Succeeded => None,
        }
    }
}

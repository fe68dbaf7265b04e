//! Engine contract: the uniform interface every converter backend implements.
//!
//! An engine wraps one external capability provider (an out-of-process tool
//! or an in-process library). The core never parses documents itself; it only
//! decides which engine to call and how to report the outcome.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::format::normalize_extension;

/// Static description of an engine: identity plus claimed capabilities.
#[derive(Debug, Clone)]
pub struct EngineDescriptor {
    /// Unique engine id, e.g. `pandoc`.
    pub id: String,
    /// Human-readable name, e.g. `Pandoc`.
    pub display_name: String,
    /// Extensions this engine claims to support (normalized).
    pub formats: IndexSet<String>,
}

impl EngineDescriptor {
    /// Create a descriptor with no formats.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            formats: IndexSet::new(),
        }
    }

    /// Add supported extensions.
    pub fn formats<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            self.formats.insert(normalize_extension(ext.as_ref()));
        }
        self
    }

    /// Check if this engine claims support for an extension.
    pub fn supports(&self, extension: &str) -> bool {
        self.formats.contains(&normalize_extension(extension))
    }
}

/// Handle for cancelling a batch.
///
/// Cloned freely; all clones observe the same flag. Checked before each
/// pending job starts and polled by in-flight engines at safe points.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a fresh, uncancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Per-job context handed to an engine's `convert`.
///
/// Carries the batch cancellation handle and the job deadline. Engines that
/// wrap external processes poll `checkpoint` between `try_wait` rounds and
/// kill the child when it returns an error.
#[derive(Debug, Clone)]
pub struct ConvertCtx {
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl ConvertCtx {
    /// Create a context with no deadline.
    pub fn new(cancel: CancelHandle) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set a hard deadline for the job.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Poll for cancellation and deadline expiry.
    ///
    /// Long-running engines call this at safe points; an error means the
    /// job must stop and any backing process be terminated.
    pub fn checkpoint(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout);
            }
        }
        Ok(())
    }
}

/// Successful conversion payload.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Final output path (after the atomic rename).
    pub output_path: PathBuf,
    /// Non-fatal notes for the caller, e.g. about extracted media.
    pub warnings: Vec<String>,
}

impl Conversion {
    /// A clean conversion with no warnings.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            warnings: Vec::new(),
        }
    }

    /// Attach a warning.
    pub fn warning(mut self, note: impl Into<String>) -> Self {
        self.warnings.push(note.into());
        self
    }
}

/// Errors an engine can signal from `convert` or its availability probe.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine dependency is not installed or not runnable")]
    Unavailable,

    #[error("unsupported input format: .{0}")]
    UnsupportedFormat(String),

    #[error("conversion failed: {0}")]
    Failed(String),

    #[error("job exceeded its time limit")]
    Timeout,

    #[error("job was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Uniform contract for converter backends.
///
/// Implementations must write the final output atomically: stage the result
/// at a temporary path (see [`stage_output`]) and rename on success, so a
/// failed or interrupted conversion never leaves a partial file at the
/// destination.
pub trait Engine: Send + Sync {
    /// Identity and claimed capabilities.
    fn descriptor(&self) -> &EngineDescriptor;

    /// Probe whether the underlying dependency is actually present.
    fn is_available(&self) -> bool;

    /// Version string of the underlying dependency, if it can be determined.
    fn version(&self) -> Option<String> {
        None
    }

    /// Convert `input` to Markdown at `output`.
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConvertCtx,
    ) -> Result<Conversion, EngineError>;
}

/// Stage a temporary output file next to the final destination.
///
/// The temp file lives in the destination directory so the final rename
/// stays on one filesystem. Dropping the returned handle without calling
/// [`commit_output`] removes the temp file.
pub fn stage_output(final_path: &Path) -> Result<NamedTempFile, EngineError> {
    let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let staged = NamedTempFile::new_in(dir)?;
    Ok(staged)
}

/// Atomically move a staged file into place.
pub fn commit_output(staged: NamedTempFile, final_path: &Path) -> Result<(), EngineError> {
    staged
        .persist(final_path)
        .map_err(|e| EngineError::Io(e.error))?;
    Ok(())
}

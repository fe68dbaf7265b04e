//! Test doubles shared by the core's unit tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::engine::{
    Conversion, ConvertCtx, Engine, EngineDescriptor, EngineError, commit_output, stage_output,
};

/// What a [`FakeEngine`] does when asked to convert.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Write a small Markdown file atomically and succeed.
    Succeed,
    /// Report a backend failure without producing output.
    Fail(String),
    /// Spin at checkpoints until cancelled or timed out.
    Hang,
}

/// In-process engine double with scriptable availability and behavior.
pub(crate) struct FakeEngine {
    descriptor: EngineDescriptor,
    available: bool,
    behavior: Behavior,
    runs: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub(crate) fn new<I, S>(id: &str, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            descriptor: EngineDescriptor::new(id, id.to_ascii_uppercase()).formats(formats),
            available: true,
            behavior: Behavior::Succeed,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub(crate) fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Counter shared with the engine: how many conversions started.
    pub(crate) fn run_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl Engine for FakeEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn version(&self) -> Option<String> {
        self.available.then(|| "0.0-test".to_string())
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConvertCtx,
    ) -> Result<Conversion, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Succeed => {
                let mut staged = stage_output(output)?;
                use std::io::Write;
                writeln!(staged, "# converted from {}", input.display())?;
                commit_output(staged, output)?;
                Ok(Conversion::new(output))
            }
            Behavior::Fail(detail) => {
                // Stage and drop: a failure must leave nothing behind.
                let _staged = stage_output(output)?;
                Err(EngineError::Failed(detail.clone()))
            }
            Behavior::Hang => loop {
                ctx.checkpoint()?;
                std::thread::sleep(Duration::from_millis(5));
            },
        }
    }
}

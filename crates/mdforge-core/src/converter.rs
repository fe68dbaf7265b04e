//! Conversion facade: per-file and batch orchestration.
//!
//! The facade builds one job per input file, resolves an engine for each
//! through the selection policy, invokes the engine, and emits one report
//! per job. Jobs are independent: a failure never stops siblings. With the
//! `parallel` feature, batches run on a bounded rayon pool.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::{CancelHandle, ConvertCtx, EngineError};
use crate::format::{EnginePreference, default_mapping, normalize_extension};
use crate::job::{ConversionJob, ConversionReport, FailureReason, Outcome};
use crate::registry::Registry;
use crate::selection::{SelectError, resolve};
use crate::settings::{OutputMode, Settings};

/// Where batch outputs are written.
///
/// `Prompt` mode is a boundary concern: the caller resolves it to one of
/// these concrete policies before invoking the facade.
#[derive(Debug, Clone, Default)]
pub enum OutputPolicy {
    /// Next to each input file.
    #[default]
    SameFolder,
    /// Into one fixed directory.
    Directory(PathBuf),
}

impl OutputPolicy {
    /// Derive the concrete policy from settings.
    ///
    /// Returns `None` for `Prompt`: the boundary must ask the user first.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        match settings.output_mode {
            OutputMode::SameFolder => Some(OutputPolicy::SameFolder),
            OutputMode::FixedFolder => match &settings.output_dir {
                Some(dir) => Some(OutputPolicy::Directory(dir.clone())),
                // No folder configured: behave like same-folder rather
                // than failing the batch.
                None => Some(OutputPolicy::SameFolder),
            },
            OutputMode::Prompt => None,
        }
    }

    /// Output path for one input: `<stem>.md` in the chosen directory.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let name = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let file = format!("{}.md", name);

        match self {
            OutputPolicy::SameFolder => input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(file),
            OutputPolicy::Directory(dir) => dir.join(file),
        }
    }
}

/// Per-batch knobs.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker pool size; `None` uses one worker per CPU.
    pub parallelism: Option<usize>,
    /// Hard per-job duration cap.
    pub timeout: Option<Duration>,
    /// Output location policy.
    pub output: OutputPolicy,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = Some(workers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_output(mut self, output: OutputPolicy) -> Self {
        self.output = output;
        self
    }
}

/// Conditions outside any single job that abort a batch before it starts.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("output directory {path} is not usable: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary row about one registered engine, for boundary display.
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub id: String,
    pub display_name: String,
    pub version: Option<String>,
    pub available: bool,
}

/// Facade orchestrating conversions against a probed registry.
pub struct Converter {
    registry: Arc<Registry>,
    defaults: IndexMap<String, EnginePreference>,
}

impl Converter {
    /// Create a facade with the built-in default engine mapping.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_defaults(registry, default_mapping())
    }

    /// Create a facade with an explicit default mapping.
    pub fn with_defaults(
        registry: Arc<Registry>,
        defaults: IndexMap<String, EnginePreference>,
    ) -> Self {
        Self { registry, defaults }
    }

    /// The registry this facade dispatches against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Identity, version, and availability of every registered engine.
    pub fn engine_infos(&self) -> Vec<EngineInfo> {
        self.registry
            .engines()
            .map(|engine| {
                let desc = engine.descriptor();
                EngineInfo {
                    id: desc.id.clone(),
                    display_name: desc.display_name.clone(),
                    version: engine.version(),
                    available: self.registry.is_available(&desc.id),
                }
            })
            .collect()
    }

    /// Available engines capable of converting the given file.
    pub fn engines_for_file(&self, path: &Path) -> Vec<EngineInfo> {
        let ext = extension_of(path);
        let capable = self.registry.lookup(&ext);
        self.engine_infos()
            .into_iter()
            .filter(|info| capable.iter().any(|id| *id == info.id))
            .collect()
    }

    /// Convert one file. Selection and per-job error capture behave exactly
    /// as in a batch of one, without cancellation.
    pub fn convert_file(
        &self,
        input: &Path,
        settings: &Settings,
        opts: &BatchOptions,
    ) -> ConversionReport {
        self.run_job(input, settings, opts, &CancelHandle::new())
    }

    /// Convert a batch of files with partial-failure semantics.
    ///
    /// Only a condition outside any single job (an unusable fixed output
    /// root) fails the batch as a whole; every per-job error is captured
    /// in that job's report. Reports come back in input order.
    pub fn convert_batch(
        &self,
        files: &[PathBuf],
        settings: &Settings,
        opts: &BatchOptions,
        cancel: &CancelHandle,
    ) -> Result<Vec<ConversionReport>, BatchError> {
        self.convert_batch_with(files, settings, opts, cancel, |_| {})
    }

    /// Like [`convert_batch`](Self::convert_batch), invoking `on_result`
    /// as each job reaches a terminal state (completion order, not
    /// submission order).
    pub fn convert_batch_with<F>(
        &self,
        files: &[PathBuf],
        settings: &Settings,
        opts: &BatchOptions,
        cancel: &CancelHandle,
        on_result: F,
    ) -> Result<Vec<ConversionReport>, BatchError>
    where
        F: Fn(&ConversionReport) + Sync,
    {
        if let OutputPolicy::Directory(dir) = &opts.output {
            std::fs::create_dir_all(dir).map_err(|source| BatchError::OutputRoot {
                path: dir.clone(),
                source,
            })?;
        }

        tracing::info!(files = files.len(), "starting batch");

        let run_one = |input: &PathBuf| {
            let report = if cancel.is_cancelled() {
                // Pending job: cancelled before it ever starts running.
                self.cancelled_report(input, opts)
            } else {
                self.run_job(input, settings, opts, cancel)
            };
            on_result(&report);
            report
        };

        let reports = self.run_all(files, opts, run_one);

        tracing::info!(
            succeeded = reports.iter().filter(|r| r.outcome.is_success()).count(),
            total = reports.len(),
            "batch finished"
        );

        Ok(reports)
    }

    #[cfg(feature = "parallel")]
    fn run_all<F>(&self, files: &[PathBuf], opts: &BatchOptions, run_one: F) -> Vec<ConversionReport>
    where
        F: Fn(&PathBuf) -> ConversionReport + Sync,
    {
        use rayon::prelude::*;

        let pool = opts.parallelism.and_then(|workers| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .ok()
        });

        match pool {
            Some(pool) => pool.install(|| files.par_iter().map(&run_one).collect()),
            None => files.par_iter().map(&run_one).collect(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_all<F>(&self, files: &[PathBuf], _opts: &BatchOptions, run_one: F) -> Vec<ConversionReport>
    where
        F: Fn(&PathBuf) -> ConversionReport + Sync,
    {
        files.iter().map(run_one).collect()
    }

    /// Run a single job to a terminal state, capturing every error into
    /// the report.
    fn run_job(
        &self,
        input: &Path,
        settings: &Settings,
        opts: &BatchOptions,
        cancel: &CancelHandle,
    ) -> ConversionReport {
        let started = Instant::now();
        let output = opts.output.output_path_for(input);
        let mut job = ConversionJob::new(input, &output);

        if !input.exists() {
            let outcome = Outcome::Failed(FailureReason::ConversionFailed(format!(
                "input file not found: {}",
                input.display()
            )));
            job.finish(&outcome);
            return self.report(job, outcome, Vec::new(), started);
        }

        let ext = extension_of(input);
        let engine_id = match resolve(&ext, &settings.overrides, &self.defaults, &self.registry) {
            Ok(id) => id,
            Err(SelectError::NoEngineAvailable {
                format,
                unavailable,
            }) => {
                let reason = if unavailable.is_empty() {
                    FailureReason::UnsupportedFormat
                } else {
                    FailureReason::NoEngineAvailable { unavailable }
                };
                tracing::warn!(format = %format, input = %input.display(), "no engine for job");
                let outcome = Outcome::Failed(reason);
                job.finish(&outcome);
                return self.report(job, outcome, Vec::new(), started);
            }
        };

        job.engine_id = Some(engine_id.clone());
        job.start();

        // The id came from the registry a moment ago; a miss here means the
        // dependency raced away between probe and call.
        let Some(engine) = self.registry.get(&engine_id) else {
            let outcome = Outcome::Failed(FailureReason::EngineUnavailable);
            job.finish(&outcome);
            return self.report(job, outcome, Vec::new(), started);
        };

        let mut ctx = ConvertCtx::new(cancel.clone());
        if let Some(timeout) = opts.timeout {
            ctx = ctx.with_timeout(timeout);
        }

        tracing::debug!(engine = %engine_id, input = %input.display(), "converting");

        let (outcome, warnings) = match engine.convert(input, &output, &ctx) {
            Ok(conversion) => (Outcome::Succeeded, conversion.warnings),
            Err(EngineError::Cancelled) => (Outcome::Cancelled, Vec::new()),
            Err(err) => (Outcome::Failed(failure_reason(err)), Vec::new()),
        };

        job.finish(&outcome);
        self.report(job, outcome, warnings, started)
    }

    /// Report for a job cancelled before it started: Pending → Cancelled.
    fn cancelled_report(&self, input: &Path, opts: &BatchOptions) -> ConversionReport {
        let mut job = ConversionJob::new(input, opts.output.output_path_for(input));
        let outcome = Outcome::Cancelled;
        job.finish(&outcome);
        self.report(job, outcome, Vec::new(), Instant::now())
    }

    fn report(
        &self,
        job: ConversionJob,
        outcome: Outcome,
        warnings: Vec<String>,
        started: Instant,
    ) -> ConversionReport {
        ConversionReport {
            input: job.input.clone(),
            output: job.output.clone(),
            engine_id: job.engine_id.clone(),
            outcome,
            warnings,
            elapsed: started.elapsed(),
        }
    }
}

/// Map an engine error into the job failure taxonomy.
fn failure_reason(err: EngineError) -> FailureReason {
    match err {
        EngineError::Unavailable => FailureReason::EngineUnavailable,
        EngineError::UnsupportedFormat(_) => FailureReason::UnsupportedFormat,
        EngineError::Failed(detail) => FailureReason::ConversionFailed(detail),
        EngineError::Timeout => FailureReason::Timeout,
        EngineError::Io(e) => FailureReason::IoWriteFailed(e.to_string()),
        // Mapped before this point; kept for exhaustiveness.
        EngineError::Cancelled => FailureReason::ConversionFailed("cancelled".to_string()),
    }
}

/// Normalized extension of a path (empty when the path has none).
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, FakeEngine};
    use std::fs;

    fn write_input(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"source document").unwrap();
        path
    }

    fn converter_with(engines: Vec<Arc<dyn crate::Engine>>) -> Converter {
        Converter::new(Arc::new(Registry::probe(engines)))
    }

    #[test]
    fn test_output_path_same_folder() {
        let policy = OutputPolicy::SameFolder;
        assert_eq!(
            policy.output_path_for(Path::new("/docs/report.docx")),
            PathBuf::from("/docs/report.md")
        );
    }

    #[test]
    fn test_output_path_fixed_directory() {
        let policy = OutputPolicy::Directory(PathBuf::from("/out"));
        assert_eq!(
            policy.output_path_for(Path::new("/docs/report.docx")),
            PathBuf::from("/out/report.md")
        );
    }

    #[test]
    fn test_output_policy_from_settings() {
        let mut settings = Settings::default();
        assert!(matches!(
            OutputPolicy::from_settings(&settings),
            Some(OutputPolicy::SameFolder)
        ));

        settings.output_mode = OutputMode::FixedFolder;
        settings.output_dir = Some(PathBuf::from("/out"));
        assert!(matches!(
            OutputPolicy::from_settings(&settings),
            Some(OutputPolicy::Directory(_))
        ));

        settings.output_mode = OutputMode::Prompt;
        assert!(OutputPolicy::from_settings(&settings).is_none());
    }

    #[test]
    fn test_single_file_success_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![Arc::new(FakeEngine::new("pandoc", ["docx"]))]);
        let report = converter.convert_file(&input, &Settings::default(), &BatchOptions::new());

        assert!(report.outcome.is_success());
        assert_eq!(report.engine_id.as_deref(), Some("pandoc"));
        assert!(report.output.exists());
    }

    #[test]
    fn test_failed_job_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![Arc::new(
            FakeEngine::new("pandoc", ["docx"]).behavior(Behavior::Fail("backend broke".into())),
        )]);
        let report = converter.convert_file(&input, &Settings::default(), &BatchOptions::new());

        assert!(matches!(
            report.outcome,
            Outcome::Failed(FailureReason::ConversionFailed(ref d)) if d == "backend broke"
        ));
        assert!(!report.output.exists());
        // No stray temp files either
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_input_fails_job() {
        let converter = converter_with(vec![Arc::new(FakeEngine::new("pandoc", ["docx"]))]);
        let report = converter.convert_file(
            Path::new("/nonexistent/a.docx"),
            &Settings::default(),
            &BatchOptions::new(),
        );

        assert!(matches!(
            report.outcome,
            Outcome::Failed(FailureReason::ConversionFailed(_))
        ));
    }

    #[test]
    fn test_batch_partial_failure_never_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write_input(dir.path(), "a.docx"),
            write_input(dir.path(), "b.csv"),
            write_input(dir.path(), "c.docx"),
            write_input(dir.path(), "d.csv"),
            write_input(dir.path(), "e.docx"),
        ];

        // No engine supports csv: exactly those two jobs fail.
        let converter = converter_with(vec![Arc::new(FakeEngine::new("pandoc", ["docx"]))]);
        let reports = converter
            .convert_batch(
                &files,
                &Settings::default(),
                &BatchOptions::new(),
                &CancelHandle::new(),
            )
            .unwrap();

        assert_eq!(reports.len(), 5);
        let failed: Vec<_> = reports
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(FailureReason::UnsupportedFormat)))
            .collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(
            reports.iter().filter(|r| r.outcome.is_success()).count(),
            3
        );
    }

    #[test]
    fn test_unavailable_engine_distinguished_from_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![Arc::new(
            FakeEngine::new("pandoc", ["docx"]).unavailable(),
        )]);
        let report = converter.convert_file(&input, &Settings::default(), &BatchOptions::new());

        assert!(matches!(
            report.outcome,
            Outcome::Failed(FailureReason::NoEngineAvailable { ref unavailable })
                if unavailable == &vec!["pandoc".to_string()]
        ));
    }

    #[test]
    fn test_batch_output_root_error_before_any_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way").unwrap();

        let engine = FakeEngine::new("pandoc", ["docx"]);
        let runs = engine.run_counter();
        let converter = converter_with(vec![Arc::new(engine)]);

        let result = converter.convert_batch(
            &[input],
            &Settings::default(),
            &BatchOptions::new().with_output(OutputPolicy::Directory(blocker)),
            &CancelHandle::new(),
        );

        assert!(matches!(result, Err(BatchError::OutputRoot { .. })));
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_mid_batch_skips_pending_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| write_input(dir.path(), &format!("f{}.docx", i)))
            .collect();

        let engine = FakeEngine::new("pandoc", ["docx"]);
        let runs = engine.run_counter();
        let converter = converter_with(vec![Arc::new(engine)]);

        let cancel = CancelHandle::new();
        let reports = converter
            .convert_batch_with(
                &files,
                &Settings::default(),
                &BatchOptions::new(),
                &cancel,
                |_| cancel.cancel(),
            )
            .unwrap();

        // First job finished before cancellation; the rest never started.
        assert!(reports[0].outcome.is_success());
        for report in &reports[1..] {
            assert_eq!(report.outcome, Outcome::Cancelled);
        }
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_kills_in_flight_job() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![Arc::new(
            FakeEngine::new("pandoc", ["docx"]).behavior(Behavior::Hang),
        )]);

        let cancel = CancelHandle::new();
        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            })
        };

        let reports = converter
            .convert_batch(&[input], &Settings::default(), &BatchOptions::new(), &cancel)
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(reports[0].outcome, Outcome::Cancelled);
        assert!(!reports[0].output.exists());
    }

    #[test]
    fn test_timeout_forces_failed() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![Arc::new(
            FakeEngine::new("pandoc", ["docx"]).behavior(Behavior::Hang),
        )]);

        let reports = converter
            .convert_batch(
                &[input],
                &Settings::default(),
                &BatchOptions::new().with_timeout(Duration::from_millis(50)),
                &CancelHandle::new(),
            )
            .unwrap();

        assert!(matches!(
            reports[0].outcome,
            Outcome::Failed(FailureReason::Timeout)
        ));
    }

    #[test]
    fn test_override_routes_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "a.docx");

        let converter = converter_with(vec![
            Arc::new(FakeEngine::new("pandoc", ["docx"])),
            Arc::new(FakeEngine::new("markitdown", ["docx"])),
        ]);

        let mut settings = Settings::default();
        settings.set_engine_for("docx", "markitdown");

        let report = converter.convert_file(&input, &settings, &BatchOptions::new());
        assert_eq!(report.engine_id.as_deref(), Some("markitdown"));
    }

    #[test]
    fn test_engine_infos_reports_availability() {
        let converter = converter_with(vec![
            Arc::new(FakeEngine::new("pandoc", ["docx"])),
            Arc::new(FakeEngine::new("markitdown", ["csv"]).unavailable()),
        ]);

        let infos = converter.engine_infos();
        assert_eq!(infos.len(), 2);
        assert!(infos[0].available);
        assert!(infos[0].version.is_some());
        assert!(!infos[1].available);
    }

    #[test]
    fn test_engines_for_file() {
        let converter = converter_with(vec![
            Arc::new(FakeEngine::new("pandoc", ["docx"])),
            Arc::new(FakeEngine::new("markitdown", ["docx", "csv"])),
        ]);

        let for_docx = converter.engines_for_file(Path::new("x.docx"));
        assert_eq!(for_docx.len(), 2);

        let for_csv = converter.engines_for_file(Path::new("x.csv"));
        assert_eq!(for_csv.len(), 1);
        assert_eq!(for_csv[0].id, "markitdown");
    }
}

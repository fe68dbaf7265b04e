//! mdforge CLI - convert documents to Markdown

mod store;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mdforge_core::{
    BatchOptions, BatchSummary, CancelHandle, Converter, OutputMode, OutputPolicy, Registry,
    Settings, SettingsStore, is_supported_format, normalize_extension, supported_extensions,
};
use mdforge_markitdown::MarkitdownEngine;
use mdforge_pandoc::PandocEngine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use store::TomlSettingsStore;

/// Output verbosity level.
#[derive(Clone, Copy)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn info(self, msg: &str) {
        if !matches!(self, Verbosity::Quiet) {
            println!("{msg}");
        }
    }

    fn debug(self, msg: &str) {
        if matches!(self, Verbosity::Verbose) {
            println!("[debug] {msg}");
        }
    }
}

#[derive(Parser)]
#[command(name = "mdforge")]
#[command(about = "Convert documents to Markdown", long_about = None)]
struct Cli {
    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to settings file (default: ~/.config/mdforge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert file(s) to Markdown
    Convert {
        /// Input files, directories, or glob patterns
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Output directory (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Force a specific engine for the whole batch
        #[arg(long)]
        engine: Option<String>,
        /// Worker pool size (default: one per CPU)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
        /// Per-file time limit in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Recursively process directories
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// List registered engines and their availability
    Engines,

    /// List supported formats and their resolved engines
    Formats,

    /// Show or change persisted settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Prefer an engine for a file extension
    SetEngine { extension: String, engine: String },
    /// Revert an extension to its default engine
    ClearEngine { extension: String },
    /// Write outputs next to each input
    OutputSame,
    /// Write outputs into a fixed directory
    OutputDir { path: PathBuf },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.verbose, cli.quiet);

    let store = match cli.config {
        Some(path) => TomlSettingsStore::new(path),
        None => TomlSettingsStore::default_location()
            .context("could not determine the user config directory")?,
    };
    let settings = store.load().unwrap_or_else(|e| {
        tracing::warn!("failed to load settings, using defaults: {e}");
        Settings::default()
    });

    let registry = Arc::new(Registry::probe(vec![
        Arc::new(PandocEngine::new()),
        Arc::new(MarkitdownEngine::new()),
    ]));
    let converter = Converter::new(registry);

    match cli.command {
        Commands::Convert {
            inputs,
            output_dir,
            engine,
            jobs,
            timeout,
            recursive,
        } => cmd_convert(
            &converter, &settings, inputs, output_dir, engine, jobs, timeout, recursive, verbosity,
        ),
        Commands::Engines => cmd_engines(&converter, verbosity),
        Commands::Formats => cmd_formats(&converter, &settings, verbosity),
        Commands::Config { action } => cmd_config(&store, settings, action, verbosity),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn cmd_convert(
    converter: &Converter,
    settings: &Settings,
    inputs: Vec<String>,
    output_dir: Option<PathBuf>,
    engine: Option<String>,
    jobs: Option<usize>,
    timeout: Option<u64>,
    recursive: bool,
    v: Verbosity,
) -> Result<()> {
    let files = collect_files(inputs, recursive, v);
    if files.is_empty() {
        bail!("no input files found");
    }

    // --engine becomes a whole-batch override for every format the engine
    // claims; selection still ignores it where the engine can't deliver.
    let mut settings = settings.clone();
    if let Some(id) = &engine {
        let Some(forced) = converter.registry().get(id) else {
            bail!("unknown engine: '{id}'. Use 'mdforge engines' to list.");
        };
        for ext in &forced.descriptor().formats {
            settings.set_engine_for(ext, id.clone());
        }
    }

    let output = match output_dir {
        Some(dir) => OutputPolicy::Directory(dir),
        // Prompt mode is an interactive concern; the CLI falls back to
        // writing next to each input.
        None => OutputPolicy::from_settings(&settings).unwrap_or_default(),
    };

    let mut opts = BatchOptions::new().with_output(output);
    if let Some(workers) = jobs {
        opts = opts.with_parallelism(workers);
    }
    if let Some(secs) = timeout {
        opts = opts.with_timeout(Duration::from_secs(secs));
    }

    let progress = match v {
        Verbosity::Quiet => None,
        _ => {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("=> "),
            );
            Some(pb)
        }
    };

    let cancel = CancelHandle::new();
    let reports = converter
        .convert_batch_with(&files, &settings, &opts, &cancel, |report| {
            if let Some(pb) = &progress {
                pb.set_message(
                    report
                        .input
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                );
                pb.inc(1);
            }
        })
        .context("batch could not start")?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let summary = BatchSummary::from_reports(&reports);
    v.info(&summary.to_string());

    for report in &reports {
        if report.outcome.is_success() {
            v.debug(&format!(
                "{} -> {} [{}]",
                report.input.display(),
                report.output.display(),
                report.engine_id.as_deref().unwrap_or("?")
            ));
            for warning in &report.warnings {
                v.info(&format!("  note: {}: {}", report.input.display(), warning));
            }
        }
    }
    for (input, reason) in &summary.failures {
        eprintln!("failed: {}: {}", input.display(), reason);
    }

    if !summary.is_clean() {
        bail!("{} of {} file(s) not converted", summary.total() - summary.succeeded, summary.total());
    }
    Ok(())
}

fn cmd_engines(converter: &Converter, v: Verbosity) -> Result<()> {
    v.info("Registered engines:\n");

    for info in converter.engine_infos() {
        let status = if info.available {
            format!("available{}", match &info.version {
                Some(version) => format!(", version {version}"),
                None => String::new(),
            })
        } else {
            "not installed".to_string()
        };
        v.info(&format!("  {:<12} {} ({})", info.id, info.display_name, status));
    }
    Ok(())
}

fn cmd_formats(converter: &Converter, settings: &Settings, v: Verbosity) -> Result<()> {
    v.info("Supported formats:\n");

    let defaults = mdforge_core::default_mapping();
    for ext in supported_extensions() {
        let engine = mdforge_core::resolve(&ext, &settings.overrides, &defaults, converter.registry());
        let assigned = match engine {
            Ok(id) => id,
            Err(_) => "(no engine available)".to_string(),
        };
        v.info(&format!(
            "  .{:<6} {:<28} {}",
            ext,
            mdforge_core::format_label(&ext),
            assigned
        ));
    }
    Ok(())
}

fn cmd_config(
    store: &TomlSettingsStore,
    mut settings: Settings,
    action: Option<ConfigAction>,
    v: Verbosity,
) -> Result<()> {
    let Some(action) = action else {
        v.info(&format!("Settings file: {}\n", store.path().display()));
        v.info(&format!("output_mode: {:?}", settings.output_mode));
        if let Some(dir) = &settings.output_dir {
            v.info(&format!("output_dir: {}", dir.display()));
        }
        if settings.overrides.is_empty() {
            v.info("overrides: (none)");
        } else {
            v.info("overrides:");
            for (ext, engine) in &settings.overrides {
                v.info(&format!("  .{ext} -> {engine}"));
            }
        }
        return Ok(());
    };

    match action {
        ConfigAction::SetEngine { extension, engine } => {
            if !is_supported_format(&extension) {
                bail!("unknown format: .{}", normalize_extension(&extension));
            }
            settings.set_engine_for(&extension, engine);
        }
        ConfigAction::ClearEngine { extension } => settings.clear_override(&extension),
        ConfigAction::OutputSame => {
            settings.output_mode = OutputMode::SameFolder;
            settings.output_dir = None;
        }
        ConfigAction::OutputDir { path } => {
            settings.output_mode = OutputMode::FixedFolder;
            settings.output_dir = Some(path);
        }
    }

    store.save(&settings).context("failed to save settings")?;
    v.info("settings saved");
    Ok(())
}

/// Collect files from paths, directories, and glob patterns.
///
/// Directories contribute files with supported extensions (recursively
/// with `-r`); explicit paths and glob matches are kept as-is so the
/// per-job error path reports anything unconvertible.
fn collect_files(patterns: Vec<String>, recursive: bool, v: Verbosity) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for pattern in patterns {
        let path = PathBuf::from(&pattern);

        if path.is_dir() {
            if recursive {
                for entry in walkdir::WalkDir::new(&path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    if has_supported_extension(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else if let Ok(entries) = std::fs::read_dir(&path) {
                for entry in entries.flatten() {
                    let entry_path = entry.path();
                    if entry_path.is_file() && has_supported_extension(&entry_path) {
                        files.push(entry_path);
                    }
                }
            }
        } else if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            match glob::glob(&pattern) {
                Ok(paths) => {
                    let mut matched = false;
                    for entry in paths.flatten() {
                        if entry.is_file() {
                            files.push(entry);
                            matched = true;
                        }
                    }
                    if !matched {
                        v.info(&format!("Warning: pattern '{}' matched no files", pattern));
                    }
                }
                Err(e) => v.info(&format!("Warning: invalid glob pattern '{}': {}", pattern, e)),
            }
        } else {
            files.push(path);
        }
    }

    files.sort();
    files
}

fn has_supported_extension(path: &std::path::Path) -> bool {
    path.extension()
        .map(|e| is_supported_format(&e.to_string_lossy()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files_directory_filters_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.docx"), b"x").unwrap();
        std::fs::write(dir.path().join("b.mkv"), b"x").unwrap();

        let files = collect_files(
            vec![dir.path().to_string_lossy().to_string()],
            false,
            Verbosity::Quiet,
        );

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.docx"));
    }

    #[test]
    fn test_collect_files_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("deep.pdf"), b"x").unwrap();

        let flat = collect_files(
            vec![dir.path().to_string_lossy().to_string()],
            false,
            Verbosity::Quiet,
        );
        assert!(flat.is_empty());

        let walked = collect_files(
            vec![dir.path().to_string_lossy().to_string()],
            true,
            Verbosity::Quiet,
        );
        assert_eq!(walked.len(), 1);
    }

    #[test]
    fn test_collect_files_keeps_explicit_paths() {
        // Explicit paths stay in the batch even when unsupported, so the
        // per-job report carries the failure.
        let files = collect_files(vec!["nope.xyz".to_string()], false, Verbosity::Quiet);
        assert_eq!(files, vec![PathBuf::from("nope.xyz")]);
    }
}

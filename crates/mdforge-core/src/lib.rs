//! mdforge: document-to-Markdown conversion dispatch.
//!
//! The core decides *which* converter backend handles a file, *with what
//! inputs*, and *how the outcome is reported*. Backends ("engines") are
//! opaque capability providers behind the [`Engine`] trait; selection walks
//! a layered policy (user override → default mapping → first available
//! capable engine) and batches run with partial-failure semantics.

mod converter;
mod engine;
mod format;
mod job;
pub mod process;
mod registry;
mod report;
mod selection;
mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use converter::{BatchError, BatchOptions, Converter, EngineInfo, OutputPolicy};
pub use engine::{
    CancelHandle, Conversion, ConvertCtx, Engine, EngineDescriptor, EngineError, commit_output,
    stage_output,
};
pub use format::{
    EnginePreference, Format, default_mapping, format_label, is_supported_format,
    normalize_extension, supported_extensions,
};
pub use job::{ConversionJob, ConversionReport, FailureReason, JobStatus, Outcome};
pub use registry::Registry;
pub use report::BatchSummary;
pub use selection::{SelectError, resolve};
pub use settings::{OutputMode, Settings, SettingsStore, SharedSettings, StoreError, shared};

//! Pandoc conversion engine for mdforge.
//!
//! Wraps the external `pandoc` binary. Output is GitHub Flavored Markdown;
//! embedded media is extracted into a `<stem>_media` directory next to the
//! output file. Binary discovery and flags are this adapter's private
//! concern; the core only sees the [`Engine`] contract.

use std::path::Path;
use std::process::Command;

use mdforge_core::process::{probe_tool, run_tool};
use mdforge_core::{
    Conversion, ConvertCtx, Engine, EngineDescriptor, EngineError, commit_output, stage_output,
};

/// File extensions pandoc is asked to handle.
const FORMATS: &[&str] = &[
    "docx", "doc", "pdf", "html", "htm", "rtf", "odt", "epub", "pptx", "xlsx", "tex", "latex",
    "rst", "org",
];

/// Engine backed by the `pandoc` binary.
pub struct PandocEngine {
    descriptor: EngineDescriptor,
    binary: String,
}

impl Default for PandocEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PandocEngine {
    /// Create an engine that runs `pandoc` from the PATH.
    pub fn new() -> Self {
        Self::with_binary("pandoc")
    }

    /// Create an engine running a specific pandoc binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            descriptor: EngineDescriptor::new("pandoc", "Pandoc").formats(FORMATS),
            binary: binary.into(),
        }
    }

    /// Media directory convention: `<output stem>_media` next to the output.
    fn media_dir(output: &Path) -> std::path::PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}_media", stem))
    }
}

impl Engine for PandocEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        probe_tool(&self.binary, &["--version"]).is_some()
    }

    fn version(&self) -> Option<String> {
        let stdout = probe_tool(&self.binary, &["--version"])?;
        // First line is "pandoc X.Y.Z"
        stdout
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        ctx: &ConvertCtx,
    ) -> Result<Conversion, EngineError> {
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.descriptor.supports(&ext) {
            return Err(EngineError::UnsupportedFormat(ext));
        }

        let staged = stage_output(output)?;
        let media_dir = Self::media_dir(output);

        let mut cmd = Command::new(&self.binary);
        cmd.arg(input)
            .args(["-t", "gfm"])
            .arg("-o")
            .arg(staged.path())
            .arg("--wrap=none")
            .arg(format!("--extract-media={}", media_dir.display()));

        run_tool(cmd, ctx)?.require_success(&self.binary)?;
        commit_output(staged, output)?;

        tracing::debug!(input = %input.display(), output = %output.display(), "pandoc done");

        let mut conversion = Conversion::new(output);
        if media_dir.is_dir()
            && media_dir
                .read_dir()
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false)
        {
            conversion =
                conversion.warning(format!("media files extracted to: {}", media_dir.display()));
        }
        Ok(conversion)
    }
}

//! MarkItDown conversion engine for mdforge.
//!
//! Wraps the `markitdown` CLI (Microsoft's document-to-Markdown tool).
//! Broad format coverage including spreadsheets, data files, images with
//! OCR metadata, and audio transcripts; it does not extract embedded media
//! from Office documents.

use std::path::Path;
use std::process::Command;

use mdforge_core::process::{probe_tool, run_tool};
use mdforge_core::{
    Conversion, ConvertCtx, Engine, EngineDescriptor, EngineError, commit_output, stage_output,
};

/// File extensions the markitdown CLI is asked to handle.
const FORMATS: &[&str] = &[
    "docx", "pdf", "pptx", "xlsx", "xls", "html", "htm", "csv", "json", "xml", "epub", "jpg",
    "jpeg", "png", "gif", "webp", "wav", "mp3", "zip",
];

/// Extensions where missing embedded-image extraction is worth a note.
const MEDIA_HEAVY: &[&str] = &["docx", "pptx"];

/// Engine backed by the `markitdown` CLI.
pub struct MarkitdownEngine {
    descriptor: EngineDescriptor,
    binary: String,
}

impl Default for MarkitdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkitdownEngine {
    /// Create an engine that runs `markitdown` from the PATH.
    pub fn new() -> Self {
        Self::with_binary("markitdown")
    }

    /// Create an engine running a specific markitdown binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            descriptor: EngineDescriptor::new("markitdown", "MarkItDown").formats(FORMATS),
            binary: binary.into(),
        }
    }
}

impl Engine for MarkitdownEngine {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    fn is_available(&self) -> bool {
        probe_tool(&self.binary, &["--version"]).is_some()
    }

    fn version(&self) -> Option<String> {
        let stdout = probe_tool(&self.binary, &["--version"])?;
        let version = stdout.split_whitespace().last()?.to_string();
        (!version.is_empty()).then_some(version)
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

        let mut cmd = Command::new(&self.binary);
        cmd.arg(input).arg("-o").arg(staged.path());

        run_tool(cmd, ctx)?.require_success(&self.binary)?;

        // Inspect the staged result before committing: image references in
        // Office output point at media markitdown does not extract.
        let references_images = std::fs::read_to_string(staged.path())
            .map(|text| text.contains("!["))
            .unwrap_or(false);

        commit_output(staged, output)?;

        tracing::debug!(input = %input.display(), output = %output.display(), "markitdown done");

        let mut conversion = Conversion::new(output);
        if MEDIA_HEAVY.contains(&ext.as_str()) && references_images {
            conversion = conversion.warning(
                "MarkItDown may not extract embedded images; consider Pandoc for image handling",
            );
        }
        Ok(conversion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdforge_core::CancelHandle;

    #[test]
    fn test_descriptor() {
        let engine = MarkitdownEngine::new();
        assert_eq!(engine.descriptor().id, "markitdown");
        assert!(engine.descriptor().supports("csv"));
        assert!(engine.descriptor().supports("zip"));
        assert!(!engine.descriptor().supports("rst"));
    }

    #[test]
    fn test_missing_binary_is_not_available() {
        let engine = MarkitdownEngine::with_binary("mdforge-no-such-markitdown");
        assert!(!engine.is_available());
        assert!(engine.version().is_none());
    }

    #[test]
    fn test_unsupported_extension_rejected_defensively() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.org");
        std::fs::write(&input, b"* heading").unwrap();

        let engine = MarkitdownEngine::new();
        let ctx = ConvertCtx::new(CancelHandle::new());
        let result = engine.convert(&input, &dir.path().join("notes.md"), &ctx);

        assert!(matches!(result, Err(EngineError::UnsupportedFormat(ref e)) if e == "org"));
    }

    #[test]
    fn test_missing_binary_convert_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.csv");
        std::fs::write(&input, b"a,b\n").unwrap();

        let engine = MarkitdownEngine::with_binary("mdforge-no-such-markitdown");
        let ctx = ConvertCtx::new(CancelHandle::new());
        let output = dir.path().join("data.md");
        let result = engine.convert(&input, &output, &ctx);

        assert!(matches!(result, Err(EngineError::Unavailable)));
        assert!(!output.exists());
    }
}

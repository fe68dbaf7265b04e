//! Input format catalog and default engine preferences.
//!
//! Formats are identified by their normalized file extension (lowercase,
//! no leading dot). The catalog is fixed at startup; engines declare which
//! of these extensions they can handle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An input document format the system can route to an engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    /// Normalized extension, e.g. `docx`.
    pub extension: String,
    /// Human-readable label, e.g. `Word Document`.
    pub label: String,
}

impl Format {
    /// Create a format, normalizing the extension.
    pub fn new(extension: impl AsRef<str>, label: impl Into<String>) -> Self {
        Self {
            extension: normalize_extension(extension.as_ref()),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".{} ({})", self.extension, self.label)
    }
}

/// Normalize a file extension to lowercase without a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

/// Preferred engines for a format: a primary and an optional fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnginePreference {
    /// Engine id tried first when no user override applies.
    pub primary: String,
    /// Engine id tried when the primary is unavailable or incapable.
    pub fallback: Option<String>,
}

impl EnginePreference {
    fn new(primary: &str, fallback: Option<&str>) -> Self {
        Self {
            primary: primary.to_string(),
            fallback: fallback.map(str::to_string),
        }
    }
}

/// Built-in default mapping from extension to preferred engines.
///
/// Order is the canonical display order for the format list.
pub fn default_mapping() -> IndexMap<String, EnginePreference> {
    let entries: &[(&str, &str, Option<&str>)] = &[
        // Office documents
        ("docx", "pandoc", Some("markitdown")),
        ("doc", "pandoc", None),
        ("xlsx", "markitdown", Some("pandoc")),
        ("xls", "markitdown", None),
        ("pptx", "markitdown", Some("pandoc")),
        ("ppt", "markitdown", None),
        // PDF
        ("pdf", "pandoc", Some("markitdown")),
        // Rich text
        ("rtf", "pandoc", None),
        ("odt", "pandoc", None),
        // Web
        ("html", "pandoc", Some("markitdown")),
        ("htm", "pandoc", Some("markitdown")),
        // eBooks
        ("epub", "pandoc", Some("markitdown")),
        // Data formats
        ("csv", "markitdown", None),
        ("json", "markitdown", None),
        ("xml", "markitdown", None),
    ];

    entries
        .iter()
        .map(|(ext, primary, fallback)| (ext.to_string(), EnginePreference::new(primary, *fallback)))
        .collect()
}

/// Human-readable labels for the built-in formats.
pub fn format_label(extension: &str) -> &'static str {
    match extension {
        "docx" => "Word Document",
        "doc" => "Word Document (Legacy)",
        "xlsx" => "Excel Spreadsheet",
        "xls" => "Excel Spreadsheet (Legacy)",
        "pptx" => "PowerPoint Presentation",
        "ppt" => "PowerPoint (Legacy)",
        "pdf" => "PDF Document",
        "rtf" => "Rich Text Format",
        "odt" => "OpenDocument Text",
        "html" | "htm" => "HTML Document",
        "epub" => "EPUB eBook",
        "csv" => "CSV Data",
        "json" => "JSON Data",
        "xml" => "XML Data",
        _ => "Document",
    }
}

/// Check if an extension is in the built-in catalog.
pub fn is_supported_format(extension: &str) -> bool {
    default_mapping().contains_key(&normalize_extension(extension))
}

/// All catalog extensions, sorted.
pub fn supported_extensions() -> Vec<String> {
    let mut exts: Vec<String> = default_mapping().keys().cloned().collect();
    exts.sort();
    exts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".DOCX"), "docx");
        assert_eq!(normalize_extension("pdf"), "pdf");
        assert_eq!(normalize_extension(".htm"), "htm");
    }

    #[test]
    fn test_default_mapping_has_primary_and_fallback() {
        let mapping = default_mapping();

        let docx = mapping.get("docx").unwrap();
        assert_eq!(docx.primary, "pandoc");
        assert_eq!(docx.fallback.as_deref(), Some("markitdown"));

        let csv = mapping.get("csv").unwrap();
        assert_eq!(csv.primary, "markitdown");
        assert!(csv.fallback.is_none());
    }

    #[test]
    fn test_is_supported_format() {
        assert!(is_supported_format("docx"));
        assert!(is_supported_format(".PDF"));
        assert!(!is_supported_format("mkv"));
    }

    #[test]
    fn test_supported_extensions_sorted() {
        let exts = supported_extensions();
        let mut sorted = exts.clone();
        sorted.sort();
        assert_eq!(exts, sorted);
        assert!(exts.contains(&"epub".to_string()));
    }
}

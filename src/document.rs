//! Source document representation.
//!
//! A source document is an ordered list of paragraphs, each optionally
//! carrying a heading level. Two inputs are understood: `.docx` archives
//! (see [`crate::docx`]) and plain text where `#`-prefixed lines are headings.

use crate::config::{InputConfig, ParagraphMode};
use crate::docx;
use crate::error::{CrossRefError, Result};
use encoding_rs::{Encoding, WINDOWS_1255};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// File extensions picked up when scanning a directory.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "txt", "md"];

/// Where a document's paragraphs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Docx,
    Text,
}

/// A single paragraph with its structural hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParagraph {
    /// Heading level (1 = top); `None` for body text.
    pub heading_level: Option<u8>,
    pub text: String,
}

impl SourceParagraph {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self {
            heading_level: Some(level),
            text: text.into(),
        }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self {
            heading_level: None,
            text: text.into(),
        }
    }
}

/// A document ready for tokenizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Document name (file stem when loaded from disk).
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    pub format: SourceFormat,
    pub paragraphs: Vec<SourceParagraph>,
}

impl SourceDocument {
    /// Create a document from already-split paragraphs.
    pub fn new(name: impl Into<String>, paragraphs: Vec<SourceParagraph>) -> Self {
        Self {
            name: name.into(),
            path: None,
            format: SourceFormat::Text,
            paragraphs,
        }
    }

    /// Build a document from raw bytes, sniffing the container format.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8], input: &InputConfig) -> Result<Self> {
        let name = name.into();

        if bytes.starts_with(ZIP_MAGIC) {
            let paragraphs = docx::extract_paragraphs(bytes)?;
            debug!(document = %name, paragraphs = paragraphs.len(), "decoded docx");
            return Ok(Self {
                name,
                path: None,
                format: SourceFormat::Docx,
                paragraphs,
            });
        }

        let content = decode_text(bytes, &input.fallback_encoding);
        Ok(Self::from_text(name, &content, input.paragraph_mode))
    }

    /// Split plain text into paragraphs.
    pub fn from_text(name: impl Into<String>, content: &str, mode: ParagraphMode) -> Self {
        let mut paragraphs = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        fn flush(pending: &mut Vec<&str>, paragraphs: &mut Vec<SourceParagraph>) {
            if !pending.is_empty() {
                paragraphs.push(SourceParagraph::body(pending.join(" ")));
                pending.clear();
            }
        }

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                flush(&mut pending, &mut paragraphs);
                continue;
            }

            if let Some((level, text)) = parse_heading_line(trimmed) {
                flush(&mut pending, &mut paragraphs);
                paragraphs.push(SourceParagraph::heading(level, text));
                continue;
            }

            match mode {
                ParagraphMode::Line => paragraphs.push(SourceParagraph::body(trimmed)),
                ParagraphMode::BlankLine => pending.push(trimmed),
            }
        }
        flush(&mut pending, &mut paragraphs);

        Self::new(name, paragraphs)
    }

    /// Load a document from disk (blocking).
    pub fn from_file(path: &Path, input: &InputConfig) -> Result<Self> {
        if !path.exists() {
            return Err(CrossRefError::DocumentNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| CrossRefError::io(path, e))?;
        let mut document = Self::from_bytes(name_from_path(path), &bytes, input)?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Get total number of paragraphs.
    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Number of paragraphs carrying a heading level.
    pub fn heading_count(&self) -> usize {
        self.paragraphs
            .iter()
            .filter(|p| p.heading_level.is_some())
            .count()
    }

    /// Whether the document has no non-blank content at all.
    pub fn is_blank(&self) -> bool {
        self.paragraphs.iter().all(|p| p.text.trim().is_empty())
    }
}

/// Derive a document name from a file path.
pub fn name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Mergeable documents under `dir`, sorted by path.
///
/// Word lock files (`~$...`) and earlier `*_merged.*` outputs are left out.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CrossRefError::InvalidInputDirectory(dir.to_path_buf()));
    }

    let mut documents: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_document(path))
        .collect();
    documents.sort();

    if documents.is_empty() {
        return Err(CrossRefError::NoDocuments(dir.to_path_buf()));
    }
    Ok(documents)
}

fn is_document(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let stem = name_from_path(path);

    has_extension && !name.starts_with("~$") && !stem.ends_with(crate::persistence::MERGED_SUFFIX)
}

/// Recognize a `#`-style heading line, returning its level and text.
fn parse_heading_line(line: &str) -> Option<(u8, String)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }

    let rest = &line[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let text = rest.trim().trim_end_matches('#').trim_end();
    if text.is_empty() {
        return None;
    }

    Some((hashes as u8, text.to_string()))
}

/// Decode text bytes: BOM first, then UTF-8, then the fallback encoding.
pub fn decode_text(bytes: &[u8], fallback_label: &str) -> String {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let encoding = Encoding::for_label(fallback_label.as_bytes()).unwrap_or(WINDOWS_1255);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        debug!(encoding = encoding.name(), "lossy decode of text input");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_lines() {
        assert_eq!(parse_heading_line("# Title"), Some((1, "Title".to_string())));
        assert_eq!(parse_heading_line("### Book ###"), Some((3, "Book".to_string())));
        assert_eq!(parse_heading_line("#hashtag"), None);
        assert_eq!(parse_heading_line("####### too deep"), None);
        assert_eq!(parse_heading_line("# "), None);
    }

    #[test]
    fn test_blank_line_mode_joins_wrapped_lines() {
        let text = "# Book A\nfirst line\nsecond line\n\nnext paragraph\n";
        let doc = SourceDocument::from_text("t", text, ParagraphMode::BlankLine);
        assert_eq!(doc.paragraph_count(), 3);
        assert_eq!(doc.paragraphs[0], SourceParagraph::heading(1, "Book A"));
        assert_eq!(doc.paragraphs[1].text, "first line second line");
        assert_eq!(doc.paragraphs[2].text, "next paragraph");
        assert_eq!(doc.heading_count(), 1);
    }

    #[test]
    fn test_line_mode_keeps_lines() {
        let text = "first line\nsecond line\n";
        let doc = SourceDocument::from_text("t", text, ParagraphMode::Line);
        assert_eq!(doc.paragraph_count(), 2);
    }

    #[test]
    fn test_blank_document() {
        let doc = SourceDocument::from_text("t", "\n   \n\t\n", ParagraphMode::BlankLine);
        assert!(doc.is_blank());
        assert_eq!(doc.paragraph_count(), 0);
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("שלום".as_bytes());
        assert_eq!(decode_text(&bytes, "windows-1255"), "שלום");
    }

    #[test]
    fn test_decode_windows_1255_fallback() {
        // "שלום" in windows-1255
        let bytes = [0xF9, 0xEC, 0xE5, 0xED];
        assert_eq!(decode_text(&bytes, "windows-1255"), "שלום");
    }

    #[test]
    fn test_from_bytes_text() {
        let input = InputConfig::default();
        let doc = SourceDocument::from_bytes("t", b"# A\n\nbody", &input).unwrap();
        assert_eq!(doc.format, SourceFormat::Text);
        assert_eq!(doc.paragraph_count(), 2);
    }

    #[test]
    fn test_from_file_missing() {
        let result = SourceDocument::from_file(Path::new("/nonexistent/doc.txt"), &InputConfig::default());
        assert!(matches!(result, Err(CrossRefError::DocumentNotFound(_))));
    }

    #[test]
    fn test_discover_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("vayikra");
        std::fs::create_dir_all(&nested).unwrap();
        for name in ["b.txt", "a.docx", "notes.pdf", "~$a.docx", "a_merged.md"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(nested.join("c.MD"), b"x").unwrap();

        let found: Vec<String> = discover_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(found, vec!["a.docx", "b.txt", "vayikra/c.MD"]);
    }

    #[test]
    fn test_discover_rejects_missing_and_empty() {
        assert!(matches!(
            discover_documents(Path::new("/nonexistent/dir")),
            Err(CrossRefError::InvalidInputDirectory(_))
        ));

        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            discover_documents(dir.path()),
            Err(CrossRefError::NoDocuments(_))
        ));
    }

    #[test]
    fn test_name_from_path() {
        assert_eq!(name_from_path(Path::new("/tmp/beshalach.docx")), "beshalach");
    }
}

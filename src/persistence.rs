//! Persistence layer for saving/loading document trees.
//!
//! JSON (human-readable) and bincode (compact binary) round-trip. Markdown and
//! HTML are rendered views and can only be written.

use crate::config::HtmlDirection;
use crate::error::{CrossRefError, Result};
use crate::export;
use crate::tree::DocumentTree;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Suffix appended to the source stem for the output file.
pub const MERGED_SUFFIX: &str = "_merged";

/// Save format for document trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    #[default]
    Json,
    /// Bincode format (binary, compact).
    Bincode,
    Markdown,
    Html,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            Some("md") | Some("markdown") => SaveFormat::Markdown,
            Some("html") | Some("htm") => SaveFormat::Html,
            _ => SaveFormat::Json, // Default to JSON
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
            SaveFormat::Markdown => "md",
            SaveFormat::Html => "html",
        }
    }

    /// Whether [`load_tree`] can read this format back.
    pub fn is_loadable(&self) -> bool {
        matches!(self, SaveFormat::Json | SaveFormat::Bincode)
    }
}

impl FromStr for SaveFormat {
    type Err = CrossRefError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SaveFormat::Json),
            "bin" | "bincode" => Ok(SaveFormat::Bincode),
            "md" | "markdown" => Ok(SaveFormat::Markdown),
            "html" | "htm" => Ok(SaveFormat::Html),
            other => Err(CrossRefError::InvalidConfig(format!(
                "unknown output format '{}' (expected json, bin, md or html)",
                other
            ))),
        }
    }
}

/// `<stem>_merged.<ext>`
pub fn suggested_filename(stem: &str, format: SaveFormat) -> String {
    format!("{}{}.{}", stem, MERGED_SUFFIX, format.extension())
}

/// Suggested output path next to `source`.
pub fn suggested_path(source: &Path, format: SaveFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    source.with_file_name(suggested_filename(stem, format))
}

/// Encode a tree in the given format.
pub fn serialize_tree(tree: &DocumentTree, format: SaveFormat, direction: HtmlDirection) -> Result<Vec<u8>> {
    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(tree)?.into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::encode_to_vec(tree, config)
                .map_err(|e| CrossRefError::Serialization(e.to_string()))?
        }
        SaveFormat::Markdown => export::to_markdown(tree).into_bytes(),
        SaveFormat::Html => export::to_html(tree, direction).into_bytes(),
    };
    Ok(data)
}

/// Decode a tree from bytes. Only JSON and bincode are accepted.
pub fn deserialize_tree(data: &[u8], format: SaveFormat, path: &Path) -> Result<DocumentTree> {
    let tree = match format {
        SaveFormat::Json => {
            let json_str = std::str::from_utf8(data)
                .map_err(|e| CrossRefError::Serialization(e.to_string()))?;
            serde_json::from_str(json_str)?
        }
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (tree, _): (DocumentTree, usize) = bincode::decode_from_slice(data, config)
                .map_err(|e| CrossRefError::Serialization(e.to_string()))?;
            tree
        }
        SaveFormat::Markdown | SaveFormat::Html => {
            return Err(CrossRefError::UnsupportedFormat(path.to_path_buf()));
        }
    };
    Ok(tree)
}

/// Create the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| CrossRefError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Save a DocumentTree to a file, choosing the format by extension.
pub fn save_tree(tree: &DocumentTree, path: &Path) -> Result<()> {
    let format = SaveFormat::from_path(path);
    save_tree_with_format(tree, path, format, HtmlDirection::default())
}

/// Save a DocumentTree with specific format.
pub fn save_tree_with_format(
    tree: &DocumentTree,
    path: &Path,
    format: SaveFormat,
    direction: HtmlDirection,
) -> Result<()> {
    ensure_parent(path)?;
    let data = serialize_tree(tree, format, direction)?;
    fs::write(path, &data).map_err(|e| CrossRefError::io(path, e))?;
    Ok(())
}

/// Load a DocumentTree from a file.
pub fn load_tree(path: &Path) -> Result<DocumentTree> {
    if !path.exists() {
        return Err(CrossRefError::TreeNotFound(path.to_path_buf()));
    }

    let format = SaveFormat::from_path(path);
    load_tree_with_format(path, format)
}

/// Load a DocumentTree with specific format.
pub fn load_tree_with_format(path: &Path, format: SaveFormat) -> Result<DocumentTree> {
    if !format.is_loadable() {
        return Err(CrossRefError::UnsupportedFormat(path.to_path_buf()));
    }
    let data = fs::read(path).map_err(|e| CrossRefError::io(path, e))?;
    deserialize_tree(&data, format, path)
}

/// Check if a tree file exists at the given path.
pub fn tree_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// Get the size of a tree file in bytes.
pub fn tree_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| CrossRefError::io(path, e))?;
    Ok(metadata.len())
}

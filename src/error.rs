//! Error types for the citation merger.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, CrossRefError>;

/// Fatal problems with the shape of a source document.
///
/// Any of these halts the pipeline before records are merged; no partial
/// output is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// The document contained no non-blank content.
    #[error("empty document")]
    EmptyDocument,

    /// No heading matched the quotes-section pattern.
    #[error("no section boundary found")]
    NoSectionBoundary,

    /// A body block in the index region appeared before any book heading.
    #[error("index entry with no book heading (block {position})")]
    IndexEntryWithoutHeading { position: usize },

    /// A body block in the quotes region appeared before any book heading.
    #[error("quote with no book heading (block {position})")]
    QuoteWithoutHeading { position: usize },
}

/// Errors that can occur in the citation merger.
#[derive(Error, Debug)]
pub enum CrossRefError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The document path does not exist.
    #[error("Document not found at '{0}'")]
    DocumentNotFound(PathBuf),

    /// The batch input path does not exist or is not a directory.
    #[error("Input path '{0}' does not exist or is not a directory")]
    InvalidInputDirectory(PathBuf),

    /// No mergeable documents were found under a directory.
    #[error("No documents found under '{0}'")]
    NoDocuments(PathBuf),

    /// The saved tree file does not exist.
    #[error("Tree file not found at '{0}'")]
    TreeNotFound(PathBuf),

    /// The file format can be written but not read back.
    #[error("Unsupported format for loading: '{0}'")]
    UnsupportedFormat(PathBuf),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The .docx container or its XML could not be decoded.
    #[error("DOCX error: {0}")]
    Docx(String),

    /// A bounded I/O operation did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The document could not be segmented or parsed.
    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),
}

impl CrossRefError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a fatal document-structure failure.
    pub fn is_structure(&self) -> bool {
        matches!(self, CrossRefError::Structure(_))
    }
}

impl From<serde_json::Error> for CrossRefError {
    fn from(err: serde_json::Error) -> Self {
        CrossRefError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for CrossRefError {
    fn from(err: zip::result::ZipError) -> Self {
        CrossRefError::Docx(err.to_string())
    }
}

impl From<quick_xml::Error> for CrossRefError {
    fn from(err: quick_xml::Error) -> Self {
        CrossRefError::Docx(err.to_string())
    }
}

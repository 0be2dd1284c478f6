//! The merge pipeline.
//!
//! [`CrossRefMerger`] runs the pure stages in order:
//! 1. Tokenize the document and find the quotes heading
//! 2. Parse the index region and the quotes region into records
//! 3. Pair records and assign reference numbers
//! 4. Render the merged document tree
//!
//! Reading the source and writing the artifact are the only async steps.
//! Each is a single `tokio` operation under a timeout and is cancelled by
//! dropping its future.

use crate::config::{Config, HtmlDirection, InputConfig, IoConfig, MatchConfig, OutputConfig};
use crate::document::{SourceDocument, name_from_path};
use crate::error::{CrossRefError, Result};
use crate::index_parser::parse_index;
use crate::patterns::PatternSet;
use crate::persistence::{SaveFormat, serialize_tree};
use crate::quote_parser::parse_quotes;
use crate::reconcile::{self, Unmatched, UnmatchedRecordWarning};
use crate::records::{IndexRecord, MergedEntry, QuoteRecord};
use crate::tokenizer::{self, Segmented};
use crate::tree::{self, DocumentTree};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counts reported after a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub merged_count: usize,
    pub unmatched_index_count: usize,
    pub unmatched_quote_count: usize,
    pub group_count: usize,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} merged in {} books, {} unmatched index entries, {} unmatched quotes",
            self.merged_count, self.group_count, self.unmatched_index_count, self.unmatched_quote_count
        )
    }
}

/// Everything one merge produces.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Merged entries in id order.
    pub entries: Vec<MergedEntry>,
    pub unmatched: Unmatched,
    pub tree: DocumentTree,
    pub report: MergeReport,
}

impl MergeOutcome {
    /// The non-fatal unmatched-record warning, if any.
    pub fn warning(&self) -> Option<UnmatchedRecordWarning> {
        self.unmatched.warning()
    }
}

/// Intermediate results for diagnosing a document's layout.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub segmented: Segmented,
    pub index: Vec<IndexRecord>,
    pub quotes: Vec<QuoteRecord>,
}

/// Merges a document's index with its quotations.
///
/// Holds only compiled configuration, so one merger can serve any number of
/// independent documents.
#[derive(Debug, Clone)]
pub struct CrossRefMerger {
    patterns: PatternSet,
    matching: MatchConfig,
    input: InputConfig,
    output: OutputConfig,
    io: IoConfig,
}

impl CrossRefMerger {
    /// Create a merger, compiling the configured patterns.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            patterns: PatternSet::compile(&config.patterns)?,
            matching: config.matching.clone(),
            input: config.input.clone(),
            output: config.output.clone(),
            io: config.io.clone(),
        })
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn html_direction(&self) -> HtmlDirection {
        self.output.html_direction
    }

    /// Segment and parse without merging.
    pub fn inspect(&self, document: &SourceDocument) -> Result<Inspection> {
        let segmented = tokenizer::segment(document, &self.patterns)?;
        let index = parse_index(segmented.index_region(), &self.patterns)?;
        let quotes = parse_quotes(segmented.quotes_region(), &self.patterns)?;
        Ok(Inspection {
            segmented,
            index,
            quotes,
        })
    }

    /// Run every pure stage over an already-loaded document.
    pub fn merge_document(&self, document: &SourceDocument) -> Result<MergeOutcome> {
        let Inspection {
            segmented,
            index,
            quotes,
        } = self.inspect(document)?;
        debug!(
            document = %document.name,
            blocks = segmented.blocks.len(),
            boundary = segmented.boundary_position,
            "segmented document"
        );

        let (entries, unmatched) = reconcile::merge_with(&index, &quotes, &self.matching);
        let grouping = reconcile::group_by_book(&entries);
        let tree = tree::render(&entries, &grouping, &self.output).with_source(document.name.clone());

        let report = MergeReport {
            merged_count: entries.len(),
            unmatched_index_count: unmatched.unmatched_index.len(),
            unmatched_quote_count: unmatched.unmatched_quote.len(),
            group_count: grouping.len(),
        };

        if let Some(warning) = unmatched.warning() {
            warn!(document = %document.name, "{}", warning);
        }
        info!(
            document = %document.name,
            merged = report.merged_count,
            books = report.group_count,
            "merged document"
        );

        Ok(MergeOutcome {
            entries,
            unmatched,
            tree,
            report,
        })
    }

    /// Merge a document held in memory.
    pub fn merge_bytes(&self, name: &str, bytes: &[u8]) -> Result<MergeOutcome> {
        let document = SourceDocument::from_bytes(name, bytes, &self.input)?;
        self.merge_document(&document)
    }

    /// Read a document with the configured read timeout.
    pub async fn load_document(&self, path: &Path) -> Result<SourceDocument> {
        let bytes = read_document(path, self.io.read_timeout()).await?;
        let mut document = SourceDocument::from_bytes(name_from_path(path), &bytes, &self.input)?;
        document.path = Some(path.to_path_buf());
        Ok(document)
    }

    /// Read and merge a document from disk.
    pub async fn merge_file(&self, path: &Path) -> Result<MergeOutcome> {
        let document = self.load_document(path).await?;
        self.merge_document(&document)
    }

    /// Write a rendered tree with the configured write timeout.
    pub async fn write(&self, tree: &DocumentTree, path: &Path, format: SaveFormat) -> Result<usize> {
        write_artifact(
            tree,
            path,
            format,
            self.output.html_direction,
            self.io.write_timeout(),
        )
        .await
    }
}

/// Await `future`, failing with [`CrossRefError::Timeout`] after `after`.
async fn bounded<T>(
    operation: &'static str,
    after: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| CrossRefError::Timeout { operation, after })?
}

/// Read the raw bytes of a document.
pub async fn read_document(path: &Path, timeout: Duration) -> Result<Vec<u8>> {
    bounded("reading document", timeout, async {
        tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CrossRefError::DocumentNotFound(path.to_path_buf()),
            _ => CrossRefError::io(path, e),
        })
    })
    .await
}

/// Serialize `tree` and write it to `path`, creating parent directories.
///
/// Returns the number of bytes written.
pub async fn write_artifact(
    tree: &DocumentTree,
    path: &Path,
    format: SaveFormat,
    direction: HtmlDirection,
    timeout: Duration,
) -> Result<usize> {
    let data = serialize_tree(tree, format, direction)?;

    bounded("writing artifact", timeout, async {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CrossRefError::io(parent, e))?;
        }
        tokio::fs::write(path, &data)
            .await
            .map_err(|e| CrossRefError::io(path, e))
    })
    .await?;

    debug!(path = %path.display(), bytes = data.len(), "wrote artifact");
    Ok(data.len())
}

/// Convenience function to merge a document file with the given config.
pub async fn merge_file(path: &Path, config: &Config) -> Result<MergeOutcome> {
    CrossRefMerger::new(config)?.merge_file(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::tests::{build_docx, para};
    use crate::error::StructureError;
    use crate::persistence::load_tree;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# Index

## Exodus

Crossing the sea .... 3

Manna … 5

## Numbers

The spies (12)

# Sources

## Numbers

- Page 12 -

And they told him, and said, We came unto the land.

## Exodus

The children of Israel went into the midst of the sea (page 3)

And when the dew that lay was gone up (page 5)
";

    fn merger() -> CrossRefMerger {
        CrossRefMerger::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_merge_text_document() {
        let outcome = merger().merge_bytes("exodus", SAMPLE.as_bytes()).unwrap();

        assert_eq!(
            outcome.report,
            MergeReport {
                merged_count: 3,
                unmatched_index_count: 0,
                unmatched_quote_count: 0,
                group_count: 2,
            }
        );
        assert!(outcome.warning().is_none());

        let ids: Vec<(u32, &str)> = outcome
            .entries
            .iter()
            .map(|e| (e.id, e.book_name.as_str()))
            .collect();
        assert_eq!(ids, vec![(1, "Exodus"), (2, "Exodus"), (3, "Numbers")]);
        assert!(outcome.entries[2].text.starts_with("And they told him"));
        assert_eq!(outcome.tree.source.as_deref(), Some("exodus"));
        assert_eq!(outcome.tree.entry_count, 3);
    }

    #[test]
    fn test_structural_headings_are_ignored_with_level() {
        let mut config = Config::default();
        config.patterns.book_heading_level = Some(2);
        let merger = CrossRefMerger::new(&config).unwrap();

        let inspection = merger
            .inspect(&SourceDocument::from_text("t", SAMPLE, Default::default()))
            .unwrap();
        assert_eq!(inspection.index.len(), 3);
        assert_eq!(inspection.quotes.len(), 3);
        assert_eq!(inspection.segmented.boundary_heading().text, "Sources");
    }

    #[test]
    fn test_unmatched_is_reported_not_fatal() {
        let text = "# Exodus\n\nOne .... 1\n\n# Sources\n\n# Exodus\n\nFirst (page 1)\n\nSecond (page 1)\n";
        let outcome = merger().merge_bytes("t", text.as_bytes()).unwrap();
        assert_eq!(outcome.report.merged_count, 1);
        assert_eq!(outcome.report.unmatched_quote_count, 1);
        assert_eq!(outcome.unmatched.unmatched_quote[0].text, "Second (page 1)");
        assert!(outcome.warning().is_some());
    }

    #[test]
    fn test_content_fallback_pairs_mistyped_page() {
        let text = "# Exodus\n\nThe dew that lay was gone .... 4\n\n# Sources\n\n# Exodus\n\nAnd when the dew that lay was gone up (page 5)\n";

        let outcome = merger().merge_bytes("t", text.as_bytes()).unwrap();
        assert_eq!(outcome.report.merged_count, 0);

        let mut config = Config::default();
        config.matching.content_fallback = true;
        let outcome = CrossRefMerger::new(&config)
            .unwrap()
            .merge_bytes("t", text.as_bytes())
            .unwrap();
        assert_eq!(outcome.report.merged_count, 1);
        assert_eq!(outcome.entries[0].page_ref, "4");
        assert!(outcome.warning().is_none());
    }

    #[test]
    fn test_structure_errors_are_fatal() {
        let err = merger().merge_bytes("t", b"   \n\n").unwrap_err();
        assert!(matches!(err, CrossRefError::Structure(StructureError::EmptyDocument)));

        let err = merger()
            .merge_bytes("t", b"# Exodus\n\nOne .... 1\n")
            .unwrap_err();
        assert!(err.is_structure());
        assert!(matches!(
            err,
            CrossRefError::Structure(StructureError::NoSectionBoundary)
        ));
    }

    #[test]
    fn test_merge_docx_document() {
        let body = [
            para(Some("Heading1"), "Exodus"),
            para(None, "Crossing the sea .... יב"),
            para(Some("Heading1"), "מקור השפע"),
            para(Some("Heading1"), "Exodus"),
            para(None, "- עמ' י״ב -"),
            para(None, "The children of Israel went into the sea"),
        ]
        .concat();
        let bytes = build_docx(&body, None);

        let outcome = merger().merge_bytes("doc", &bytes).unwrap();
        assert_eq!(outcome.report.merged_count, 1);
        assert_eq!(outcome.entries[0].page_ref, "יב");
        assert_eq!(
            outcome.entries[0].footnote_label(),
            "[1] (Exodus, page יב) The children of Israel went into the sea"
        );
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("exodus.txt");
        tokio::fs::write(&source, SAMPLE).await.unwrap();

        let merger = merger();
        let outcome = merger.merge_file(&source).await.unwrap();

        let target = dir.path().join("out").join("exodus_merged.json");
        let written = merger
            .write(&outcome.tree, &target, SaveFormat::Json)
            .await
            .unwrap();
        assert!(written > 0);
        assert_eq!(load_tree(&target).unwrap(), outcome.tree);
    }

    #[test]
    fn test_missing_document() {
        let result = tokio_test::block_on(read_document(
            Path::new("/nonexistent/document.docx"),
            Duration::from_secs(5),
        ));
        assert!(matches!(result, Err(CrossRefError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<()> = bounded(
            "reading document",
            Duration::from_millis(10),
            std::future::pending(),
        )
        .await;
        match result {
            Err(CrossRefError::Timeout { operation, after }) => {
                assert_eq!(operation, "reading document");
                assert_eq!(after, Duration::from_millis(10));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.patterns.page_delimiter = "(unclosed".to_string();
        assert!(matches!(
            CrossRefMerger::new(&config),
            Err(CrossRefError::InvalidConfig(_))
        ));
    }
}

//! Rust Citation Merger - cross-references a document's index with its sources.
//!
//! Many compiled study documents come in two halves: an index of short topic
//! summaries grouped by book, each pointing at a page, and a later body of the
//! full quotations, grouped the same way. This crate reads such a document and
//! produces one merged document in which every summary carries a reference
//! number and every quotation appears as the numbered source it belongs to.
//!
//! # Overview
//!
//! 1. Split the document into blocks and find the quotes heading
//! 2. Parse the index region and the quotes region into records
//! 3. Pair records on book name and page, numbering them in index order
//! 4. Render a [`DocumentTree`] and write it as JSON, bincode, Markdown or HTML
//!
//! Records that cannot be paired are reported, never dropped. A document
//! without a recognizable structure is rejected with a [`StructureError`].
//!
//! # Quick Start
//!
//! ```no_run
//! use rust_citation_merger::{
//!     config::Config,
//!     persistence::{SaveFormat, suggested_path},
//!     pipeline::CrossRefMerger,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load(None)?;
//!     let merger = CrossRefMerger::new(&config)?;
//!
//!     // Merge a document
//!     let source = Path::new("exodus.docx");
//!     let outcome = merger.merge_file(source).await?;
//!     println!("{}", outcome.report);
//!
//!     if let Some(warning) = outcome.warning() {
//!         eprintln!("{}", warning);
//!     }
//!
//!     // Write the merged document next to the source
//!     let target = suggested_path(source, SaveFormat::Html);
//!     merger.write(&outcome.tree, &target, SaveFormat::Html).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **SourceDocument**: paragraphs with heading levels, from `.docx` or text
//! - **tokenizer**: blocks and the index/quotes boundary
//! - **index_parser** / **quote_parser**: records for each region
//! - **reconcile**: pairing, numbering and grouping by book
//! - **DocumentTree**: the rendered merged document
//! - **CrossRefMerger**: runs the stages and owns the bounded async I/O

pub mod config;
pub mod document;
pub mod docx;
pub mod error;
pub mod export;
pub mod index_parser;
pub mod normalize;
pub mod patterns;
pub mod persistence;
pub mod pipeline;
pub mod quote_parser;
pub mod reconcile;
pub mod records;
mod region;
pub mod tokenizer;
pub mod tree;

// Re-export commonly used types
pub use config::Config;
pub use document::SourceDocument;
pub use error::{CrossRefError, Result, StructureError};
pub use persistence::{SaveFormat, load_tree, save_tree};
pub use pipeline::{CrossRefMerger, MergeOutcome, MergeReport};
pub use reconcile::{Unmatched, UnmatchedRecordWarning};
pub use records::{Block, IndexRecord, MergedEntry, QuoteRecord};
pub use tree::{DocumentTree, TreeNode};

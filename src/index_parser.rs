//! Index region parser.
//!
//! Each entry is `summary <delimiter> page`. Lines without a page token are
//! wrapped summary text and are carried forward onto the next line that ends
//! in one, so a single record may span several contiguous blocks, up to
//! `max_continuation_lines` of them.

use crate::error::StructureError;
use crate::patterns::PatternSet;
use crate::records::{Block, IndexRecord};
use crate::region::{self, RegionItem};
use tracing::{debug, warn};

/// Summary text waiting for its page token.
struct Pending {
    book: String,
    position: usize,
    parts: Vec<String>,
}

impl Pending {
    fn joined_with(mut self, tail: String) -> (usize, String) {
        if !tail.is_empty() {
            self.parts.push(tail);
        }
        (self.position, self.parts.join(" "))
    }
}

/// Parse the index region (blocks before the boundary) into records.
pub fn parse_index(blocks: &[Block], patterns: &PatternSet) -> Result<Vec<IndexRecord>, StructureError> {
    let items = region::walk(blocks, patterns, |position| {
        StructureError::IndexEntryWithoutHeading { position }
    })?;

    let limit = patterns.max_continuation_lines();
    let mut records = Vec::new();
    let mut pending: Option<Pending> = None;

    for item in items {
        match item {
            RegionItem::Book(_) => flush_dangling(pending.take(), &mut records, patterns),
            RegionItem::PageMarker(_) => {}
            RegionItem::Body { book, block } => match patterns.split_page(&block.text) {
                Some((summary, page_ref)) => {
                    let (source_position, summary) = match pending.take() {
                        Some(held) => {
                            warn!(
                                book = %held.book,
                                first = held.position,
                                last = block.ordinal_position,
                                blocks = held.parts.len() + 1,
                                "index entry joined across blocks"
                            );
                            held.joined_with(summary)
                        }
                        None => (block.ordinal_position, summary),
                    };
                    records.push(IndexRecord {
                        book_name: book,
                        summary,
                        page_ref,
                        source_position,
                    });
                }
                None => {
                    // Held text plus the line that closes it must fit the limit.
                    if pending.as_ref().is_some_and(|held| held.parts.len() + 1 >= limit) {
                        flush_dangling(pending.take(), &mut records, patterns);
                    }
                    pending
                        .get_or_insert_with(|| Pending {
                            book,
                            position: block.ordinal_position,
                            parts: Vec::new(),
                        })
                        .parts
                        .push(block.text.clone());
                    if limit <= 1 {
                        flush_dangling(pending.take(), &mut records, patterns);
                    }
                }
            },
        }
    }
    flush_dangling(pending, &mut records, patterns);

    debug!(records = records.len(), "parsed index region");
    Ok(records)
}

/// Held text that never met a page token still becomes a record.
fn flush_dangling(pending: Option<Pending>, records: &mut Vec<IndexRecord>, patterns: &PatternSet) {
    let Some(held) = pending else {
        return;
    };

    warn!(
        book = %held.book,
        position = held.position,
        "index entry has no page reference; using default"
    );
    let book_name = held.book.clone();
    let (source_position, summary) = held.joined_with(String::new());
    records.push(IndexRecord {
        book_name,
        summary,
        page_ref: patterns.default_page_ref().to_string(),
        source_position,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConfig;

    fn patterns() -> PatternSet {
        PatternSet::compile(&PatternConfig::default()).unwrap()
    }

    #[test]
    fn test_records_grouped_by_book() {
        let blocks = vec![
            Block::heading(0, Some(2), "Book A"),
            Block::paragraph(1, "Crossing the sea .... 3"),
            Block::paragraph(2, "The song (4)"),
            Block::heading(3, Some(2), "Book B"),
            Block::paragraph(4, "Manna … יב"),
        ];

        let records = parse_index(&blocks, &patterns()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            IndexRecord {
                book_name: "Book A".to_string(),
                summary: "Crossing the sea".to_string(),
                page_ref: "3".to_string(),
                source_position: 1,
            }
        );
        assert_eq!(records[1].page_ref, "4");
        assert_eq!(records[2].book_name, "Book B");
        assert_eq!(records[2].page_ref, "יב");
    }

    #[test]
    fn test_wrapped_summary_spans_blocks() {
        let blocks = vec![
            Block::heading(0, Some(1), "Book A"),
            Block::paragraph(1, "A long summary that"),
            Block::paragraph(2, "— Page 5 —"),
            Block::paragraph(3, "continues here .... 7"),
        ];

        let records = parse_index(&blocks, &patterns()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "A long summary that continues here");
        assert_eq!(records[0].page_ref, "7");
        assert_eq!(records[0].source_position, 1);
    }

    #[test]
    fn test_dangling_text_uses_default_page() {
        let blocks = vec![
            Block::heading(0, Some(1), "Book A"),
            Block::paragraph(1, "no page here"),
            Block::heading(2, Some(1), "Book B"),
            Block::paragraph(3, "entry .... 2"),
        ];

        let records = parse_index(&blocks, &patterns()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].book_name, "Book A");
        assert_eq!(records[0].summary, "no page here");
        assert_eq!(records[0].page_ref, "1");
        assert_eq!(records[1].book_name, "Book B");
    }

    #[test]
    fn test_page_with_trailing_period_ends_entry() {
        let blocks = vec![
            Block::heading(0, Some(1), "Book A"),
            Block::paragraph(1, "Crossing the sea .... יב."),
            Block::paragraph(2, "Manna .... 5"),
        ];

        let records = parse_index(&blocks, &patterns()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "Crossing the sea");
        assert_eq!(records[0].page_ref, "יב");
        assert_eq!(records[1].summary, "Manna");
        assert_eq!(records[1].source_position, 2);
    }

    #[test]
    fn test_continuation_limit_splits_long_runs() {
        let config = PatternConfig {
            max_continuation_lines: 2,
            ..PatternConfig::default()
        };
        let patterns = PatternSet::compile(&config).unwrap();
        let blocks = vec![
            Block::heading(0, Some(1), "Book A"),
            Block::paragraph(1, "stray heading text"),
            Block::paragraph(2, "A summary that"),
            Block::paragraph(3, "wraps once .... 4"),
        ];

        let records = parse_index(&blocks, &patterns).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "stray heading text");
        assert_eq!(records[0].page_ref, "1");
        assert_eq!(records[0].source_position, 1);
        assert_eq!(records[1].summary, "A summary that wraps once");
        assert_eq!(records[1].page_ref, "4");
        assert_eq!(records[1].source_position, 2);
    }

    #[test]
    fn test_single_line_limit_never_joins() {
        let config = PatternConfig {
            max_continuation_lines: 1,
            ..PatternConfig::default()
        };
        let patterns = PatternSet::compile(&config).unwrap();
        let blocks = vec![
            Block::heading(0, Some(1), "Book A"),
            Block::paragraph(1, "no page"),
            Block::paragraph(2, "entry .... 3"),
        ];

        let records = parse_index(&blocks, &patterns).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "no page");
        assert_eq!(records[1].summary, "entry");
        assert_eq!(records[1].source_position, 2);
    }

    #[test]
    fn test_entry_before_heading_fails() {
        let blocks = vec![
            Block::paragraph(0, "orphan .... 1"),
            Block::heading(1, Some(1), "Book A"),
        ];
        assert_eq!(
            parse_index(&blocks, &patterns()).unwrap_err(),
            StructureError::IndexEntryWithoutHeading { position: 0 }
        );
    }

    #[test]
    fn test_empty_region() {
        assert!(parse_index(&[], &patterns()).unwrap().is_empty());
    }
}

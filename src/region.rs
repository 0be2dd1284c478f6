//! Book-heading discipline shared by the index and quote parsers.
//!
//! Both regions are read the same way: a book heading opens a group, page
//! markers and skipped furniture are set aside, and every other block belongs
//! to the nearest preceding book heading. A body block with no governing
//! heading is a structure error.

use crate::error::StructureError;
use crate::patterns::PatternSet;
use crate::records::Block;

/// One classified block of a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegionItem<'a> {
    /// A book heading; carries the normalized book name.
    Book(String),
    /// A block that is only a page marker.
    PageMarker(String),
    /// A content block under `book`.
    Body { book: String, block: &'a Block },
}

/// Classify `blocks`, failing with `orphan(position)` for a body block that
/// precedes every book heading.
pub(crate) fn walk<'a>(
    blocks: &'a [Block],
    patterns: &PatternSet,
    orphan: impl Fn(usize) -> StructureError,
) -> Result<Vec<RegionItem<'a>>, StructureError> {
    let mut items = Vec::with_capacity(blocks.len());
    let mut book: Option<String> = None;

    for block in blocks {
        if block.is_heading() {
            if patterns.opens_book(block) {
                let name = patterns.book_name(&block.text);
                book = Some(name.clone());
                items.push(RegionItem::Book(name));
            }
            continue;
        }

        if patterns.is_skipped(&block.text) {
            continue;
        }

        if let Some(page) = patterns.explicit_page_marker(&block.text) {
            items.push(RegionItem::PageMarker(page));
            continue;
        }

        match &book {
            Some(name) => items.push(RegionItem::Body {
                book: name.clone(),
                block,
            }),
            None => return Err(orphan(block.ordinal_position)),
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternConfig;

    fn orphan(position: usize) -> StructureError {
        StructureError::IndexEntryWithoutHeading { position }
    }

    #[test]
    fn test_body_follows_nearest_book() {
        let patterns = PatternSet::compile(&PatternConfig::default()).unwrap();
        let blocks = vec![
            Block::heading(0, Some(1), "Book  A"),
            Block::paragraph(1, "one"),
            Block::paragraph(2, "— Page 4 —"),
            Block::heading(3, Some(1), "Book B"),
            Block::paragraph(4, "two"),
        ];

        let items = walk(&blocks, &patterns, orphan).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], RegionItem::Book("Book A".to_string()));
        assert_eq!(
            items[1],
            RegionItem::Body {
                book: "Book A".to_string(),
                block: &blocks[1]
            }
        );
        assert_eq!(items[2], RegionItem::PageMarker("4".to_string()));
        assert!(matches!(&items[4], RegionItem::Body { book, .. } if book == "Book B"));
    }

    #[test]
    fn test_page_marker_before_heading_is_fine() {
        let patterns = PatternSet::compile(&PatternConfig::default()).unwrap();
        let blocks = vec![
            Block::paragraph(0, "— Page 1 —"),
            Block::heading(1, Some(1), "Book A"),
        ];
        assert!(walk(&blocks, &patterns, orphan).is_ok());
    }

    #[test]
    fn test_orphan_body_fails() {
        let patterns = PatternSet::compile(&PatternConfig::default()).unwrap();
        let blocks = vec![Block::paragraph(7, "stray")];
        assert_eq!(
            walk(&blocks, &patterns, orphan).unwrap_err(),
            StructureError::IndexEntryWithoutHeading { position: 7 }
        );
    }

    #[test]
    fn test_structural_headings_ignored_with_level() {
        let config = PatternConfig {
            book_heading_level: Some(2),
            ..Default::default()
        };
        let patterns = PatternSet::compile(&config).unwrap();
        let blocks = vec![
            Block::heading(0, Some(1), "Index"),
            Block::paragraph(1, "stray"),
        ];
        assert!(walk(&blocks, &patterns, orphan).is_err());
    }
}

//! Quotes region parser.
//!
//! Every content block is one quotation. Its page is the inline marker it
//! carries, else the last explicit page marker seen in the region, else the
//! configured default.

use crate::error::StructureError;
use crate::patterns::PatternSet;
use crate::records::{Block, QuoteRecord};
use crate::region::{self, RegionItem};
use tracing::debug;

/// Parse the quotes region (blocks from the boundary on) into records.
///
/// The boundary heading itself, when present at the front, is skipped.
pub fn parse_quotes(blocks: &[Block], patterns: &PatternSet) -> Result<Vec<QuoteRecord>, StructureError> {
    let body = match blocks.first() {
        Some(first) if first.is_heading() && patterns.is_quotes_heading(&first.text) => &blocks[1..],
        _ => blocks,
    };

    let items = region::walk(body, patterns, |position| {
        StructureError::QuoteWithoutHeading { position }
    })?;

    let mut records = Vec::new();
    let mut running_page: Option<String> = None;

    for item in items {
        match item {
            RegionItem::Book(_) => {}
            RegionItem::PageMarker(page) => running_page = Some(page),
            RegionItem::Body { book, block } => {
                let page_ref = patterns
                    .inline_page_marker(&block.text)
                    .or_else(|| running_page.clone())
                    .unwrap_or_else(|| patterns.default_page_ref().to_string());

                records.push(QuoteRecord {
                    book_name: book,
                    page_ref,
                    text: block.text.clone(),
                    source_position: block.ordinal_position,
                });
            }
        }
    }

    debug!(records = records.len(), "parsed quotes region");
    Ok(records)
}

//! Records flowing through the merge pipeline.
//!
//! Every value here is created once by one stage and only read afterwards:
//! Block -> IndexRecord / QuoteRecord -> MergedEntry.

use serde::{Deserialize, Serialize};

/// Kind of a tokenized block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Paragraph,
}

/// One atomic unit of document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    /// Heading level (1 = top) when the source carried one.
    pub style_level: Option<u8>,
    pub text: String,
    /// Zero-based position in emission order.
    pub ordinal_position: usize,
}

impl Block {
    pub fn heading(ordinal_position: usize, style_level: Option<u8>, text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Heading,
            style_level,
            text: text.into(),
            ordinal_position,
        }
    }

    pub fn paragraph(ordinal_position: usize, text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            style_level: None,
            text: text.into(),
            ordinal_position,
        }
    }

    pub fn is_heading(&self) -> bool {
        self.kind == BlockKind::Heading
    }
}

/// A topic summary from the index region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub book_name: String,
    pub summary: String,
    /// Opaque page token; never interpreted as a number.
    pub page_ref: String,
    pub source_position: usize,
}

/// A full quotation from the quotes region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub book_name: String,
    pub page_ref: String,
    pub text: String,
    pub source_position: usize,
}

/// One index record paired with one quote record under a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    /// Dense reference number starting at 1.
    pub id: u32,
    pub book_name: String,
    pub summary: String,
    pub page_ref: String,
    pub text: String,
    pub index_position: usize,
    pub quote_position: usize,
}

impl MergedEntry {
    pub(crate) fn pair(id: u32, index: &IndexRecord, quote: &QuoteRecord) -> Self {
        Self {
            id,
            book_name: index.book_name.clone(),
            summary: index.summary.clone(),
            page_ref: index.page_ref.clone(),
            text: quote.text.clone(),
            index_position: index.source_position,
            quote_position: quote.source_position,
        }
    }

    /// Footnote line: `[id] (book, page ref) text`.
    pub fn footnote_label(&self) -> String {
        format!(
            "[{}] ({}, page {}) {}",
            self.id, self.book_name, self.page_ref, self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_constructors() {
        let h = Block::heading(0, Some(2), "Book A");
        assert!(h.is_heading());
        assert_eq!(h.style_level, Some(2));

        let p = Block::paragraph(1, "text");
        assert!(!p.is_heading());
        assert_eq!(p.style_level, None);
        assert_eq!(p.ordinal_position, 1);
    }

    #[test]
    fn test_footnote_label() {
        let index = IndexRecord {
            book_name: "A".to_string(),
            summary: "s".to_string(),
            page_ref: "יב".to_string(),
            source_position: 2,
        };
        let quote = QuoteRecord {
            book_name: "A".to_string(),
            page_ref: "י״ב".to_string(),
            text: "full text".to_string(),
            source_position: 9,
        };
        let entry = MergedEntry::pair(4, &index, &quote);
        assert_eq!(entry.footnote_label(), "[4] (A, page יב) full text");
        assert_eq!(entry.index_position, 2);
        assert_eq!(entry.quote_position, 9);
    }
}

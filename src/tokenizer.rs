//! Tokenizer and region segmenter.
//!
//! Turns a [`SourceDocument`] into an ordered list of [`Block`]s and finds
//! the single cut between the index region and the quotes region: the first
//! heading whose text matches the quotes-heading pattern. The segmenter never
//! guesses; a document without that heading is rejected.

use crate::document::SourceDocument;
use crate::error::StructureError;
use crate::normalize;
use crate::patterns::PatternSet;
use crate::records::Block;
use serde::Serialize;

/// Blocks plus the position where the quotes region starts.
#[derive(Debug, Clone, Serialize)]
pub struct Segmented {
    pub blocks: Vec<Block>,
    /// Position of the quotes heading; index region is everything before it.
    pub boundary_position: usize,
}

impl Segmented {
    /// Blocks with `ordinal_position < boundary_position`.
    pub fn index_region(&self) -> &[Block] {
        &self.blocks[..self.boundary_position]
    }

    /// Blocks with `ordinal_position >= boundary_position`, starting with the
    /// quotes heading itself.
    pub fn quotes_region(&self) -> &[Block] {
        &self.blocks[self.boundary_position..]
    }

    /// The heading that opened the quotes region.
    pub fn boundary_heading(&self) -> &Block {
        &self.blocks[self.boundary_position]
    }
}

/// Emit one block per non-blank paragraph, in document order.
pub fn tokenize(document: &SourceDocument) -> Result<Vec<Block>, StructureError> {
    let blocks: Vec<Block> = document
        .paragraphs
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .enumerate()
        .map(|(position, p)| match p.heading_level {
            Some(level) => Block::heading(
                position,
                Some(level),
                normalize::collapse_whitespace(&p.text),
            ),
            None => Block::paragraph(position, p.text.trim()),
        })
        .collect();

    if blocks.is_empty() {
        return Err(StructureError::EmptyDocument);
    }

    Ok(blocks)
}

/// Position of the first heading matching the quotes-heading pattern.
pub fn find_boundary(blocks: &[Block], patterns: &PatternSet) -> Result<usize, StructureError> {
    blocks
        .iter()
        .find(|b| b.is_heading() && patterns.is_quotes_heading(&b.text))
        .map(|b| b.ordinal_position)
        .ok_or(StructureError::NoSectionBoundary)
}

/// Tokenize and locate the region boundary.
pub fn segment(document: &SourceDocument, patterns: &PatternSet) -> Result<Segmented, StructureError> {
    let blocks = tokenize(document)?;
    let boundary_position = find_boundary(&blocks, patterns)?;
    Ok(Segmented {
        blocks,
        boundary_position,
    })
}

//! Rendered output document.
//!
//! A [`DocumentTree`] is the structured form of the merged document: a title,
//! an index section with one group per book, and a footnote section listing
//! every quotation under its reference number. Serializers in
//! [`crate::export`] and [`crate::persistence`] write it out.

use crate::config::OutputConfig;
use crate::records::MergedEntry;
use crate::reconcile::Grouping;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// What a node stands for in the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Top-level section (index or footnotes).
    Section,
    /// One book inside the index section.
    Group,
    /// A summary annotated with its reference marker.
    IndexEntry,
    /// A full quotation under its reference marker.
    Footnote,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct TreeNode {
    pub kind: NodeKind,

    /// Heading, summary, or footnote line.
    pub title: String,

    /// Reference marker linking an index entry to its footnote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_ref: Option<String>,

    /// Quotation text (footnotes only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a node with no annotations.
    pub fn new(kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            marker: None,
            book_name: None,
            page_ref: None,
            text: None,
            nodes: Vec::new(),
        }
    }

    fn index_entry(entry: &MergedEntry) -> Self {
        Self {
            marker: Some(entry.id),
            book_name: Some(entry.book_name.clone()),
            page_ref: Some(entry.page_ref.clone()),
            ..Self::new(NodeKind::IndexEntry, entry.summary.clone())
        }
    }

    fn footnote(entry: &MergedEntry) -> Self {
        Self {
            marker: Some(entry.id),
            book_name: Some(entry.book_name.clone()),
            page_ref: Some(entry.page_ref.clone()),
            text: Some(entry.text.clone()),
            ..Self::new(NodeKind::Footnote, entry.footnote_label())
        }
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: TreeNode) {
        self.nodes.push(child);
    }

    pub fn has_children(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Recursively count all nodes in this subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self.nodes.iter().map(|n| n.node_count()).sum::<usize>()
    }

    /// Find a node by title (case-insensitive).
    pub fn find_by_title(&self, title: &str) -> Option<&TreeNode> {
        if self.title.to_lowercase() == title.to_lowercase() {
            return Some(self);
        }
        self.nodes.iter().find_map(|child| child.find_by_title(title))
    }

    /// Find the node of `kind` carrying `marker`.
    pub fn find_marker(&self, kind: NodeKind, marker: u32) -> Option<&TreeNode> {
        if self.kind == kind && self.marker == Some(marker) {
            return Some(self);
        }
        self.nodes
            .iter()
            .find_map(|child| child.find_marker(kind, marker))
    }

    /// Format the subtree as an indented outline.
    pub fn format_tree(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let mut result = match (self.kind, self.marker) {
            (NodeKind::IndexEntry, Some(id)) => format!(
                "{}{} [{}] (page {})\n",
                prefix,
                self.title,
                id,
                self.page_ref.as_deref().unwrap_or("?")
            ),
            _ => format!("{}{}\n", prefix, self.title),
        };

        for child in &self.nodes {
            result.push_str(&child.format_tree(indent + 1));
        }

        result
    }
}

/// The complete merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DocumentTree {
    pub title: String,

    /// Name of the document this tree was rendered from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Top-level sections: index first, then footnotes.
    pub nodes: Vec<TreeNode>,

    pub entry_count: usize,

    pub group_count: usize,
}

impl DocumentTree {
    pub fn new(title: impl Into<String>, nodes: Vec<TreeNode>) -> Self {
        Self {
            title: title.into(),
            source: None,
            nodes,
            entry_count: 0,
            group_count: 0,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get total node count.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(|n| n.node_count()).sum()
    }

    pub fn find_by_title(&self, title: &str) -> Option<&TreeNode> {
        self.nodes.iter().find_map(|n| n.find_by_title(title))
    }

    /// The footnote carrying reference `id`.
    pub fn footnote(&self, id: u32) -> Option<&TreeNode> {
        self.nodes
            .iter()
            .find_map(|n| n.find_marker(NodeKind::Footnote, id))
    }

    /// Format the entire tree for display.
    pub fn format(&self) -> String {
        let mut result = format!(
            "Document: {} ({} entries, {} books)\n",
            self.title, self.entry_count, self.group_count
        );
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for node in &self.nodes {
            result.push_str(&node.format_tree(0));
        }

        result
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Render merged entries into a document tree.
///
/// Groups follow `grouping` order; footnotes follow id order. The result
/// depends only on the arguments, so rendering twice gives equal trees.
pub fn render(entries: &[MergedEntry], grouping: &Grouping<'_>, output: &OutputConfig) -> DocumentTree {
    let mut index = TreeNode::new(NodeKind::Section, output.index_heading.clone());
    for group in &grouping.groups {
        let mut book = TreeNode::new(NodeKind::Group, group.book_name);
        book.book_name = Some(group.book_name.to_string());
        for entry in &group.entries {
            book.add_child(TreeNode::index_entry(entry));
        }
        index.add_child(book);
    }

    let mut ordered: Vec<&MergedEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.id);

    let mut footnotes = TreeNode::new(NodeKind::Section, output.footnotes_heading.clone());
    for entry in ordered {
        footnotes.add_child(TreeNode::footnote(entry));
    }

    DocumentTree {
        entry_count: entries.len(),
        group_count: grouping.len(),
        ..DocumentTree::new(output.title.clone(), vec![index, footnotes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::group_by_book;

    fn entry(id: u32, book: &str, page: &str) -> MergedEntry {
        MergedEntry {
            id,
            book_name: book.to_string(),
            summary: format!("summary {}", id),
            page_ref: page.to_string(),
            text: format!("quote {}", id),
            index_position: id as usize,
            quote_position: 100 + id as usize,
        }
    }

    fn sample() -> Vec<MergedEntry> {
        vec![entry(1, "B", "3"), entry(2, "A", "יב"), entry(3, "B", "4")]
    }

    #[test]
    fn test_render_layout() {
        let entries = sample();
        let tree = render(&entries, &group_by_book(&entries), &OutputConfig::default());

        assert_eq!(tree.title, "Collected Sources");
        assert_eq!(tree.entry_count, 3);
        assert_eq!(tree.group_count, 2);
        assert_eq!(tree.nodes.len(), 2);

        let index = &tree.nodes[0];
        assert_eq!(index.title, "Index");
        let books: Vec<&str> = index.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(books, vec!["B", "A"]);
        assert_eq!(index.nodes[0].nodes[1].marker, Some(3));
        assert_eq!(index.nodes[0].nodes[1].title, "summary 3");

        let footnotes = &tree.nodes[1];
        assert_eq!(footnotes.title, "Sources");
        let ids: Vec<Option<u32>> = footnotes.nodes.iter().map(|n| n.marker).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(footnotes.nodes[1].title, "[2] (A, page יב) quote 2");
    }

    #[test]
    fn test_render_is_idempotent() {
        let entries = sample();
        let output = OutputConfig::default();
        let first = render(&entries, &group_by_book(&entries), &output);
        let second = render(&entries, &group_by_book(&entries), &output);
        assert_eq!(first, second);
    }

    #[test]
    fn test_footnotes_in_id_order_even_if_unsorted() {
        let mut entries = sample();
        entries.reverse();
        let tree = render(&entries, &group_by_book(&entries), &OutputConfig::default());
        let ids: Vec<Option<u32>> = tree.nodes[1].nodes.iter().map(|n| n.marker).collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_render_empty() {
        let tree = render(&[], &group_by_book(&[]), &OutputConfig::default());
        assert_eq!(tree.entry_count, 0);
        assert_eq!(tree.node_count(), 2);
        assert!(!tree.nodes[0].has_children());
    }

    #[test]
    fn test_lookup_helpers() {
        let entries = sample();
        let tree = render(&entries, &group_by_book(&entries), &OutputConfig::default());

        assert_eq!(tree.footnote(2).and_then(|n| n.text.as_deref()), Some("quote 2"));
        assert!(tree.footnote(9).is_none());
        assert!(tree.find_by_title("index").is_some());
        assert_eq!(tree.node_count(), 2 + 2 + 3 + 3);
    }

    #[test]
    fn test_format_outline() {
        let entries = sample();
        let tree = render(&entries, &group_by_book(&entries), &OutputConfig::default());
        let text = tree.format();
        assert!(text.starts_with("Document: Collected Sources (3 entries, 2 books)"));
        assert!(text.contains("    summary 1 [1] (page 3)"));
        assert!(text.contains("  [3] (B, page 4) quote 3"));
    }

    #[test]
    fn test_tree_json_roundtrip() {
        let entries = sample();
        let tree = render(&entries, &group_by_book(&entries), &OutputConfig::default())
            .with_source("exodus");

        let json = tree.to_json().unwrap();
        let parsed = DocumentTree::from_json(&json).unwrap();
        assert_eq!(parsed, tree);
        assert!(json.contains("\"index_entry\""));
    }
}

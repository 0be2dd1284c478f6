//! Markdown and HTML renderings of a [`DocumentTree`].
//!
//! Both are write-only views. Index entries link to their footnotes by
//! reference number; in HTML the link is a real anchor.

use crate::config::HtmlDirection;
use crate::tree::{DocumentTree, NodeKind, TreeNode};
use std::fmt::Write;

/// Render the tree as Markdown.
pub fn to_markdown(tree: &DocumentTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", tree.title);

    for section in &tree.nodes {
        let _ = write!(out, "\n## {}\n", section.title);
        for child in &section.nodes {
            markdown_node(&mut out, child);
        }
    }

    out
}

fn markdown_node(out: &mut String, node: &TreeNode) {
    match node.kind {
        NodeKind::Group => {
            let _ = write!(out, "\n### {}\n\n", node.title);
            for child in &node.nodes {
                markdown_node(out, child);
            }
        }
        NodeKind::IndexEntry => {
            let _ = write!(out, "- {}", node.title);
            if let Some(id) = node.marker {
                let _ = write!(out, " [{}]", id);
            }
            out.push('\n');
        }
        NodeKind::Footnote => {
            let _ = write!(out, "\n{}\n", node.title);
        }
        NodeKind::Section => {
            let _ = write!(out, "\n## {}\n", node.title);
            for child in &node.nodes {
                markdown_node(out, child);
            }
        }
    }
}

fn anchor(id: u32) -> String {
    format!("ref-{}", id)
}

/// Render the tree as a standalone HTML page.
pub fn to_html(tree: &DocumentTree, direction: HtmlDirection) -> String {
    let title = html_escape::encode_text(&tree.title);
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html dir=\"{}\">", direction.as_str());
    let _ = writeln!(out, "<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>", title);
    let _ = writeln!(out, "<body>\n<h1>{}</h1>", title);

    for section in &tree.nodes {
        let _ = writeln!(
            out,
            "<section>\n<h2>{}</h2>",
            html_escape::encode_text(&section.title)
        );
        for child in &section.nodes {
            html_node(&mut out, child);
        }
        let _ = writeln!(out, "</section>");
    }

    let _ = writeln!(out, "</body>\n</html>");
    out
}

fn html_node(out: &mut String, node: &TreeNode) {
    match node.kind {
        NodeKind::Group => {
            let _ = writeln!(out, "<h3>{}</h3>\n<ul>", html_escape::encode_text(&node.title));
            for child in &node.nodes {
                html_node(out, child);
            }
            let _ = writeln!(out, "</ul>");
        }
        NodeKind::IndexEntry => {
            let summary = html_escape::encode_text(&node.title);
            match node.marker {
                Some(id) => {
                    let _ = writeln!(
                        out,
                        "<li>{} <a href=\"#{}\">[{}]</a></li>",
                        summary,
                        anchor(id),
                        id
                    );
                }
                None => {
                    let _ = writeln!(out, "<li>{}</li>", summary);
                }
            }
        }
        NodeKind::Footnote => {
            let id_attr = node
                .marker
                .map(|id| format!(" id=\"{}\"", anchor(id)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "<p{}>{}</p>",
                id_attr,
                html_escape::encode_text(&node.title)
            );
        }
        NodeKind::Section => {
            let _ = writeln!(out, "<h2>{}</h2>", html_escape::encode_text(&node.title));
            for child in &node.nodes {
                html_node(out, child);
            }
        }
    }
}

//! Paragraph extraction from `.docx` archives.
//!
//! Only `word/document.xml` and `word/styles.xml` are read. Each body `w:p`
//! becomes one [`SourceParagraph`]; its heading level comes from a direct
//! `w:outlineLvl`, then the paragraph style's outline level, then the style
//! id itself (`Heading2`, `Title`).

use crate::document::SourceParagraph;
use crate::error::{CrossRefError, Result};
use crate::normalize;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;
use zip::result::ZipError;

/// Word's outline level 9 means "body text".
const BODY_TEXT_OUTLINE_LEVEL: u8 = 9;

/// Extract an attribute value by key from an element.
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(std::result::Result::ok)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Heading level for a `w:outlineLvl` value (0-based in the XML).
fn outline_level(e: &BytesStart) -> Option<u8> {
    get_attr(e, b"w:val")
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|lvl| *lvl < BODY_TEXT_OUTLINE_LEVEL)
        .map(|lvl| lvl + 1)
}

/// Heading level implied by a style id or display name.
fn level_from_style_name(name: &str) -> Option<u8> {
    let compact: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if compact == "title" {
        return Some(1);
    }

    compact
        .strip_prefix("heading")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=BODY_TEXT_OUTLINE_LEVEL).contains(n))
}

/// Read the paragraphs of a `.docx` held in memory.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<SourceParagraph>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let document_xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| CrossRefError::Docx("missing word/document.xml".to_string()))?;

    let styles = match read_part(&mut archive, "word/styles.xml")? {
        Some(xml) => parse_styles(&xml)?,
        None => HashMap::new(),
    };

    walk_body(&document_xml, &styles)
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    part.read_to_string(&mut content)
        .map_err(|e| CrossRefError::Docx(format!("reading {}: {}", name, e)))?;
    Ok(Some(content))
}

/// Map paragraph style ids to heading levels.
fn parse_styles(xml: &str) -> Result<HashMap<String, u8>> {
    let mut levels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut style_id: Option<String> = None;
    let mut level: Option<u8> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"w:style" => {
                style_id = get_attr(&e, b"w:styleId");
                level = style_id.as_deref().and_then(level_from_style_name);
            }
            Event::Empty(e) if style_id.is_some() => match e.name().as_ref() {
                b"w:name" => {
                    if level.is_none() {
                        level = get_attr(&e, b"w:val")
                            .as_deref()
                            .and_then(level_from_style_name);
                    }
                }
                b"w:outlineLvl" => {
                    if let Some(lvl) = outline_level(&e) {
                        level = Some(lvl);
                    }
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"w:style" => {
                if let (Some(id), Some(lvl)) = (style_id.take(), level.take()) {
                    levels.insert(id, lvl);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(levels)
}

/// Paragraph under construction while walking `document.xml`.
#[derive(Default)]
struct ParagraphState {
    depth: usize,
    in_text: bool,
    text: String,
    style_id: Option<String>,
    outline: Option<u8>,
}

impl ParagraphState {
    fn finish(&mut self, styles: &HashMap<String, u8>) -> Option<SourceParagraph> {
        let text = normalize::collapse_whitespace(&self.text);
        let style_id = self.style_id.take();
        let outline = self.outline.take();
        self.text.clear();

        if text.is_empty() {
            return None;
        }

        let level = outline
            .or_else(|| style_id.as_ref().and_then(|id| styles.get(id).copied()))
            .or_else(|| style_id.as_deref().and_then(level_from_style_name));

        Some(SourceParagraph {
            heading_level: level,
            text,
        })
    }
}

fn walk_body(xml: &str, styles: &HashMap<String, u8>) -> Result<Vec<SourceParagraph>> {
    let mut reader = Reader::from_str(xml);
    // xml:space="preserve" runs carry meaningful spaces.
    reader.trim_text(false);

    let mut paragraphs = Vec::new();
    let mut state = ParagraphState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => state.depth += 1,
                b"w:t" if state.depth > 0 => state.in_text = true,
                b"w:pStyle" if state.depth > 0 => state.style_id = get_attr(&e, b"w:val"),
                _ => {}
            },
            Event::Empty(e) if state.depth > 0 => match e.name().as_ref() {
                b"w:pStyle" => state.style_id = get_attr(&e, b"w:val"),
                b"w:outlineLvl" => state.outline = outline_level(&e),
                b"w:tab" | b"w:br" | b"w:cr" => state.text.push(' '),
                _ => {}
            },
            Event::Text(e) if state.in_text => {
                let text = e.unescape()?;
                state.text.push_str(&text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => state.in_text = false,
                b"w:p" if state.depth > 0 => {
                    state.depth -= 1;
                    if state.depth == 0 {
                        if let Some(paragraph) = state.finish(styles) {
                            paragraphs.push(paragraph);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    /// Build an in-memory .docx with the given body XML and styles.
    pub(crate) fn build_docx(body: &str, styles: Option<&str>) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();

        zip.start_file("word/document.xml", options).unwrap();
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        zip.write_all(document.as_bytes()).unwrap();

        if let Some(styles) = styles {
            zip.start_file("word/styles.xml", options).unwrap();
            zip.write_all(styles.as_bytes()).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    pub(crate) fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, s))
            .unwrap_or_default();
        format!(
            r#"<w:p>{}<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            ppr, text
        )
    }

    #[test]
    fn test_level_from_style_name() {
        assert_eq!(level_from_style_name("Heading2"), Some(2));
        assert_eq!(level_from_style_name("heading 1"), Some(1));
        assert_eq!(level_from_style_name("Title"), Some(1));
        assert_eq!(level_from_style_name("Normal"), None);
    }

    #[test]
    fn test_extract_headings_by_style_id() {
        let body = [
            para(Some("Heading1"), "Book A"),
            para(None, "Summary .... 1"),
            para(None, ""),
        ]
        .concat();
        let bytes = build_docx(&body, None);

        let paragraphs = extract_paragraphs(&bytes).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0], SourceParagraph::heading(1, "Book A"));
        assert_eq!(paragraphs[1], SourceParagraph::body("Summary .... 1"));
    }

    #[test]
    fn test_custom_style_outline_level() {
        let styles = r#"<?xml version="1.0"?><w:styles xmlns:w="x"><w:style w:type="paragraph" w:styleId="SeferName"><w:name w:val="Sefer Name"/><w:pPr><w:outlineLvl w:val="1"/></w:pPr></w:style></w:styles>"#;
        let body = para(Some("SeferName"), "Book B");
        let bytes = build_docx(&body, Some(styles));

        let paragraphs = extract_paragraphs(&bytes).unwrap();
        assert_eq!(paragraphs, vec![SourceParagraph::heading(2, "Book B")]);
    }

    #[test]
    fn test_runs_and_tabs_join() {
        let body = r#"<w:p><w:r><w:t>first</w:t></w:r><w:r><w:tab/><w:t>second &amp; third</w:t></w:r></w:p>"#;
        let bytes = build_docx(body, None);

        let paragraphs = extract_paragraphs(&bytes).unwrap();
        assert_eq!(paragraphs[0].text, "first second & third");
    }

    #[test]
    fn test_missing_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<()> = FileOptions::default();
        zip.start_file("other.xml", options).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(
            extract_paragraphs(&bytes),
            Err(CrossRefError::Docx(_))
        ));
    }
}

//! Compiled recognition patterns.
//!
//! [`PatternSet`] is built once from a [`PatternConfig`] and shared by the
//! segmenter and both region parsers.

use crate::config::PatternConfig;
use crate::error::{CrossRefError, Result};
use crate::normalize;
use crate::records::{Block, BlockKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Headings that open the quotes region.
pub const DEFAULT_QUOTES_HEADING: &str =
    r"(?i)^\s*(?:quotes|sources|full texts?|citations|מקור השפע|מקורות)\s*:?\s*$";

/// `summary .... page`, `summary … page`, `summary (page)` or `summary [p. 12]`.
pub const DEFAULT_PAGE_DELIMITER: &str = r"^(?P<summary>.+?)\s*(?:\.{2,}|…+|[(\[])\s*(?:(?i:page|p\.)\s*|עמ(?:וד|['׳])?\s*)?(?P<page>[^\s.…()\[\]]+)\.?\s*[)\]]?\.?\s*$";

/// A block that is nothing but a page marker, e.g. `— Page 12 —` or `־ יב ־`.
pub const DEFAULT_PAGE_MARKER: &str = r"^\s*[-–—־]+\s*(?:(?i:page|p\.)|עמ(?:וד|['׳])?)?\s*(?P<page>[^\s\-–—־]+)\s*[-–—־]+\s*$";

/// A marker inside a quotation, e.g. `(page 12)` or `[עמ' יב]`.
pub const DEFAULT_INLINE_PAGE_MARKER: &str =
    r"[(\[]\s*(?:(?i:page|p\.)|עמ(?:וד|['׳])?)\s*(?P<page>[^\s()\[\]]+)\s*[)\]]";

/// Dot leader or ellipsis left at the end of a summary.
static TRAILING_LEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\.{2,}|…+)\s*$").expect("valid regex"));

/// Compiled form of [`PatternConfig`].
#[derive(Debug, Clone)]
pub struct PatternSet {
    quotes_heading: Regex,
    page_delimiter: Regex,
    page_marker: Regex,
    inline_page_marker: Regex,
    skip: Option<Regex>,
    book_name_strip: Option<Regex>,
    book_heading_level: Option<u8>,
    default_page_ref: String,
    max_continuation_lines: usize,
}

fn compile(name: &str, pattern: &str, groups: &[&str]) -> Result<Regex> {
    let regex = Regex::new(pattern)
        .map_err(|e| CrossRefError::InvalidConfig(format!("pattern '{}': {}", name, e)))?;

    for group in groups {
        if !regex.capture_names().flatten().any(|n| n == *group) {
            return Err(CrossRefError::InvalidConfig(format!(
                "pattern '{}' must define the named group '{}'",
                name, group
            )));
        }
    }

    Ok(regex)
}

/// True when `regex` matches the whole of `text`.
fn matches_fully(regex: &Regex, text: &str) -> bool {
    regex
        .find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}

impl PatternSet {
    /// Compile every pattern, checking the required named groups.
    pub fn compile(config: &PatternConfig) -> Result<Self> {
        let skip = config
            .skip
            .as_deref()
            .map(|p| compile("skip", p, &[]))
            .transpose()?;
        let book_name_strip = config
            .book_name_strip
            .as_deref()
            .map(|p| compile("book_name_strip", p, &[]))
            .transpose()?;

        if config.max_continuation_lines == 0 {
            return Err(CrossRefError::InvalidConfig(
                "max_continuation_lines must be at least 1".to_string(),
            ));
        }

        if config.default_page_ref.trim().is_empty() {
            return Err(CrossRefError::InvalidConfig(
                "default_page_ref must not be empty".to_string(),
            ));
        }

        Ok(Self {
            quotes_heading: compile("quotes_heading", &config.quotes_heading, &[])?,
            page_delimiter: compile(
                "page_delimiter",
                &config.page_delimiter,
                &["summary", "page"],
            )?,
            page_marker: compile("page_marker", &config.page_marker, &["page"])?,
            inline_page_marker: compile(
                "inline_page_marker",
                &config.inline_page_marker,
                &["page"],
            )?,
            skip,
            book_name_strip,
            book_heading_level: config.book_heading_level,
            default_page_ref: config.default_page_ref.trim().to_string(),
            max_continuation_lines: config.max_continuation_lines,
        })
    }

    /// Whether a heading's text introduces the quotes region.
    pub fn is_quotes_heading(&self, text: &str) -> bool {
        self.quotes_heading.is_match(text)
    }

    /// Split `summary .... page` into its two parts.
    pub fn split_page(&self, text: &str) -> Option<(String, String)> {
        let caps = self.page_delimiter.captures(text.trim())?;
        let summary = TRAILING_LEADER.replace(caps.name("summary")?.as_str(), "");
        let summary = normalize::collapse_whitespace(&summary);
        let page = caps.name("page")?.as_str().trim().to_string();
        if page.is_empty() {
            return None;
        }
        Some((summary, page))
    }

    /// The page named by a block that is only a page marker.
    pub fn explicit_page_marker(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if !matches_fully(&self.page_marker, text) {
            return None;
        }
        self.page_marker
            .captures(text)
            .and_then(|caps| caps.name("page"))
            .map(|m| m.as_str().to_string())
    }

    /// The first page marker embedded in a quotation, if any.
    pub fn inline_page_marker(&self, text: &str) -> Option<String> {
        self.inline_page_marker
            .captures(text)
            .and_then(|caps| caps.name("page"))
            .map(|m| m.as_str().to_string())
    }

    /// Whether a block is page furniture to be ignored.
    pub fn is_skipped(&self, text: &str) -> bool {
        self.skip
            .as_ref()
            .is_some_and(|skip| matches_fully(skip, text.trim()))
    }

    /// Whether a heading block names a book.
    pub fn opens_book(&self, block: &Block) -> bool {
        if block.kind != BlockKind::Heading {
            return false;
        }
        match self.book_heading_level {
            Some(level) => block.style_level == Some(level),
            None => true,
        }
    }

    /// Canonical book name for a heading's text.
    pub fn book_name(&self, heading: &str) -> String {
        normalize::book_name(heading, self.book_name_strip.as_ref())
    }

    pub fn default_page_ref(&self) -> &str {
        &self.default_page_ref
    }

    /// Most blocks one index record may span.
    pub fn max_continuation_lines(&self) -> usize {
        self.max_continuation_lines
    }
}

//! Configuration for the citation merger.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{CrossRefError, Result};
use crate::patterns::{self, PatternSet};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognition patterns for the two document regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Matches the heading that starts the quotes region.
    pub quotes_heading: String,

    /// Splits a trailing page token from index summary text.
    /// Must define the named groups `summary` and `page`.
    pub page_delimiter: String,

    /// A block consisting only of a page marker (named group `page`).
    pub page_marker: String,

    /// A page marker embedded in a quotation (named group `page`).
    pub inline_page_marker: String,

    /// Blocks fully matching this are ignored in both regions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,

    /// Removed from book headings before they are used as names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_name_strip: Option<String>,

    /// Only headings at this level open a book (any level when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_heading_level: Option<u8>,

    /// Page reference used when a quote has no marker to inherit.
    pub default_page_ref: String,

    /// Most blocks a single index entry may span before held text is
    /// emitted on its own.
    pub max_continuation_lines: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            quotes_heading: patterns::DEFAULT_QUOTES_HEADING.to_string(),
            page_delimiter: patterns::DEFAULT_PAGE_DELIMITER.to_string(),
            page_marker: patterns::DEFAULT_PAGE_MARKER.to_string(),
            inline_page_marker: patterns::DEFAULT_INLINE_PAGE_MARKER.to_string(),
            skip: None,
            book_name_strip: None,
            book_heading_level: None,
            default_page_ref: "1".to_string(),
            max_continuation_lines: 10,
        }
    }
}

/// How plain-text input is split into paragraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphMode {
    /// Blank lines separate paragraphs; wrapped lines are joined.
    #[default]
    BlankLine,
    /// Every non-blank line is its own paragraph.
    Line,
}

impl ParagraphMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "blank_line" | "blank-line" | "blank" => Some(ParagraphMode::BlankLine),
            "line" => Some(ParagraphMode::Line),
            _ => None,
        }
    }
}

/// Source decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub paragraph_mode: ParagraphMode,

    /// Encoding label tried when text input is not valid UTF-8.
    pub fallback_encoding: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            paragraph_mode: ParagraphMode::default(),
            fallback_encoding: "windows-1255".to_string(),
        }
    }
}

/// Bounds for the two I/O boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

impl IoConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Text direction for HTML export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HtmlDirection {
    #[default]
    Rtl,
    Ltr,
}

impl HtmlDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            HtmlDirection::Rtl => "rtl",
            HtmlDirection::Ltr => "ltr",
        }
    }
}

/// Labels used by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub title: String,
    pub index_heading: String,
    pub footnotes_heading: String,
    pub html_direction: HtmlDirection,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            title: "Collected Sources".to_string(),
            index_heading: "Index".to_string(),
            footnotes_heading: "Sources".to_string(),
            html_direction: HtmlDirection::default(),
        }
    }
}

/// Second-pass pairing of records left over after key matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Pair leftovers within a book by their wording.
    pub content_fallback: bool,

    /// Leading words of a summary that, found at the start of a quotation,
    /// identify it outright.
    pub opening_words: usize,

    /// Share of a summary's keywords that must appear near the start of a
    /// quotation (0.0 to 1.0).
    pub min_keyword_overlap: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            content_fallback: false,
            opening_words: 3,
            min_keyword_overlap: 0.5,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub patterns: PatternConfig,
    #[serde(default)]
    pub matching: MatchConfig,
    pub input: InputConfig,
    pub io: IoConfig,
    pub output: OutputConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    patterns: Option<PatternFileSection>,
    matching: Option<MatchFileSection>,
    input: Option<InputFileSection>,
    io: Option<IoFileSection>,
    output: Option<OutputFileSection>,
}

#[derive(Debug, Deserialize)]
struct PatternFileSection {
    quotes_heading: Option<String>,
    page_delimiter: Option<String>,
    page_marker: Option<String>,
    inline_page_marker: Option<String>,
    skip: Option<String>,
    book_name_strip: Option<String>,
    book_heading_level: Option<u8>,
    default_page_ref: Option<String>,
    max_continuation_lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MatchFileSection {
    content_fallback: Option<bool>,
    opening_words: Option<usize>,
    min_keyword_overlap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct InputFileSection {
    paragraph_mode: Option<ParagraphMode>,
    fallback_encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IoFileSection {
    read_timeout_secs: Option<u64>,
    write_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OutputFileSection {
    title: Option<String>,
    index_heading: Option<String>,
    footnotes_heading: Option<String>,
    html_direction: Option<HtmlDirection>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (XREF_QUOTES_HEADING, XREF_PAGE_DELIMITER, ...)
    /// 2. Config file (explicit path, else ~/.config/rust-citation-merger/config.yaml)
    /// 3. Default values
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply `XREF_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(pattern) = lookup("XREF_QUOTES_HEADING") {
            self.patterns.quotes_heading = pattern;
        }

        if let Some(pattern) = lookup("XREF_PAGE_DELIMITER") {
            self.patterns.page_delimiter = pattern;
        }

        if let Some(pattern) = lookup("XREF_PAGE_MARKER") {
            self.patterns.page_marker = pattern;
        }

        if let Some(pattern) = lookup("XREF_INLINE_PAGE_MARKER") {
            self.patterns.inline_page_marker = pattern;
        }

        // An empty value clears the pattern.
        if let Some(pattern) = lookup("XREF_SKIP") {
            self.patterns.skip = Some(pattern).filter(|p| !p.trim().is_empty());
        }

        if let Some(level) = lookup("XREF_BOOK_HEADING_LEVEL") {
            match level.trim() {
                "" | "any" => self.patterns.book_heading_level = None,
                value => {
                    if let Ok(level) = value.parse() {
                        self.patterns.book_heading_level = Some(level);
                    }
                }
            }
        }

        if let Some(page) = lookup("XREF_DEFAULT_PAGE") {
            self.patterns.default_page_ref = page;
        }

        if let Some(lines) = lookup("XREF_MAX_CONTINUATION_LINES") {
            if let Ok(lines) = lines.trim().parse() {
                self.patterns.max_continuation_lines = lines;
            }
        }

        if let Some(flag) = lookup("XREF_CONTENT_FALLBACK") {
            match flag.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.matching.content_fallback = true,
                "0" | "false" | "no" | "off" => self.matching.content_fallback = false,
                _ => {}
            }
        }

        if let Some(mode) = lookup("XREF_PARAGRAPH_MODE") {
            if let Some(mode) = ParagraphMode::parse(&mode) {
                self.input.paragraph_mode = mode;
            }
        }

        if let Some(secs) = lookup("XREF_READ_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.io.read_timeout_secs = secs;
            }
        }

        if let Some(secs) = lookup("XREF_WRITE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.io.write_timeout_secs = secs;
            }
        }

        if let Some(title) = lookup("XREF_TITLE") {
            self.output.title = title;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CrossRefError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, filling gaps with defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| CrossRefError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(patterns) = file_config.patterns {
            if let Some(v) = patterns.quotes_heading {
                config.patterns.quotes_heading = v;
            }
            if let Some(v) = patterns.page_delimiter {
                config.patterns.page_delimiter = v;
            }
            if let Some(v) = patterns.page_marker {
                config.patterns.page_marker = v;
            }
            if let Some(v) = patterns.inline_page_marker {
                config.patterns.inline_page_marker = v;
            }
            if patterns.skip.is_some() {
                config.patterns.skip = patterns.skip;
            }
            if patterns.book_name_strip.is_some() {
                config.patterns.book_name_strip = patterns.book_name_strip;
            }
            if patterns.book_heading_level.is_some() {
                config.patterns.book_heading_level = patterns.book_heading_level;
            }
            if let Some(v) = patterns.default_page_ref {
                config.patterns.default_page_ref = v;
            }
            if let Some(v) = patterns.max_continuation_lines {
                config.patterns.max_continuation_lines = v;
            }
        }

        if let Some(matching) = file_config.matching {
            if let Some(v) = matching.content_fallback {
                config.matching.content_fallback = v;
            }
            if let Some(v) = matching.opening_words {
                config.matching.opening_words = v;
            }
            if let Some(v) = matching.min_keyword_overlap {
                config.matching.min_keyword_overlap = v;
            }
        }

        if let Some(input) = file_config.input {
            if let Some(v) = input.paragraph_mode {
                config.input.paragraph_mode = v;
            }
            if let Some(v) = input.fallback_encoding {
                config.input.fallback_encoding = v;
            }
        }

        if let Some(io) = file_config.io {
            if let Some(v) = io.read_timeout_secs {
                config.io.read_timeout_secs = v;
            }
            if let Some(v) = io.write_timeout_secs {
                config.io.write_timeout_secs = v;
            }
        }

        if let Some(output) = file_config.output {
            if let Some(v) = output.title {
                config.output.title = v;
            }
            if let Some(v) = output.index_heading {
                config.output.index_heading = v;
            }
            if let Some(v) = output.footnotes_heading {
                config.output.footnotes_heading = v;
            }
            if let Some(v) = output.html_direction {
                config.output.html_direction = v;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rust-citation-merger")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the configuration, compiling every pattern once.
    pub fn validate(&self) -> Result<()> {
        PatternSet::compile(&self.patterns)?;

        if self.io.read_timeout_secs == 0 || self.io.write_timeout_secs == 0 {
            return Err(CrossRefError::InvalidConfig(
                "I/O timeouts must be at least one second".to_string(),
            ));
        }

        if self.matching.opening_words == 0 {
            return Err(CrossRefError::InvalidConfig(
                "matching.opening_words must be at least 1".to_string(),
            ));
        }

        if !(self.matching.min_keyword_overlap > 0.0 && self.matching.min_keyword_overlap <= 1.0) {
            return Err(CrossRefError::InvalidConfig(format!(
                "matching.min_keyword_overlap must be in (0, 1], got {}",
                self.matching.min_keyword_overlap
            )));
        }

        if encoding_rs::Encoding::for_label(self.input.fallback_encoding.as_bytes()).is_none() {
            return Err(CrossRefError::InvalidConfig(format!(
                "Unknown fallback encoding '{}'",
                self.input.fallback_encoding
            )));
        }

        Ok(())
    }

    /// Serialize the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| CrossRefError::Serialization(e.to_string()))
    }
}

//! Canonical forms for book names and page references.
//!
//! Source documents spell the same book or page several ways: Hebrew
//! gershayim (`״`) next to ASCII double quotes, en/em dashes next to hyphens,
//! stray honorifics. Book names are normalized once at parse time; page
//! references keep their written form and are compared through [`page_key`].

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapse runs of whitespace to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Map typographic variants to one spelling.
fn unify_marks(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{05F4}' | '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{05F3}' | '\u{2018}' | '\u{2019}' => '\'',
            '\u{2013}' | '\u{2014}' | '\u{05BE}' => '-',
            other => other,
        })
        .collect()
}

/// Normalize a book heading into the name used for grouping and matching.
pub fn book_name(raw: &str, strip: Option<&Regex>) -> String {
    let unified = unify_marks(raw);
    let stripped = match strip {
        Some(pattern) => pattern.replace_all(&unified, " ").into_owned(),
        None => unified,
    };

    let name = collapse_whitespace(&stripped);
    name.trim_end_matches(':').trim_end().to_string()
}

/// Comparison key for a page reference.
///
/// Page references are opaque tokens (often Hebrew numerals) and are never
/// parsed as integers; only punctuation and case are folded.
pub fn page_key(page: &str) -> String {
    unify_marks(page)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect::<String>()
        .trim_end_matches('.')
        .to_lowercase()
}

/// Words of `text` for content comparison: cantillation and vowel points
/// dropped, punctuation treated as a separator, lowercased.
pub fn match_words(text: &str) -> Vec<String> {
    let folded: String = text
        .chars()
        .filter_map(|c| match c {
            '\u{05BE}' => Some(' '),
            '\u{0591}'..='\u{05C7}' => None,
            c if c.is_alphanumeric() => Some(c),
            _ => Some(' '),
        })
        .collect();
    folded.split_whitespace().map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_book_name_unifies_quote_marks() {
        assert_eq!(book_name("חת״ם  סופר", None), book_name("חת\"ם סופר", None));
        assert_eq!(book_name("Book – Part", None), "Book - Part");
    }

    #[test]
    fn test_book_name_strip_pattern() {
        let strip = Regex::new(r#"הק'|ז"ל"#).unwrap();
        assert_eq!(book_name("אור החיים הק׳", Some(&strip)), "אור החיים");
    }

    #[test]
    fn test_book_name_trailing_colon() {
        assert_eq!(book_name("Genesis Rabbah:", None), "Genesis Rabbah");
    }

    #[test]
    fn test_page_key_folds_punctuation() {
        assert_eq!(page_key("י״ב"), "יב");
        assert_eq!(page_key("י\"ב"), "יב");
        assert_eq!(page_key(" 12. "), "12");
        assert_eq!(page_key("IV"), page_key("iv"));
    }

    #[test]
    fn test_page_key_is_not_numeric() {
        assert_ne!(page_key("012"), page_key("12"));
    }

    #[test]
    fn test_match_words_drops_points_and_punctuation() {
        assert_eq!(match_words("וַיְהִי, בְּשַׁלַּח!"), vec!["ויהי", "בשלח"]);
        assert_eq!(match_words("בית־אל \"Crossing\" the-sea"), vec!["בית", "אל", "crossing", "the", "sea"]);
        assert!(match_words(" .. ").is_empty());
    }
}

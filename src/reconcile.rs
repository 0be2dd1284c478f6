//! Pairing of index records with quote records.
//!
//! Records are matched on `(book name, page key)`. When a key occurs several
//! times, the k-th index record takes the k-th quote record, both in source
//! order. Reference ids are handed out in index order, so the numbering never
//! depends on how the quotes region is arranged. Surplus records on either
//! side are returned as [`Unmatched`] instead of failing the merge.
//!
//! With [`MatchConfig::content_fallback`] set, a second pass pairs records
//! whose key found nothing on the other side at all (a mistyped page, say) by
//! comparing the summary's wording with the start of each quotation in the
//! same book.

use crate::config::MatchConfig;
use crate::normalize;
use crate::records::{IndexRecord, MergedEntry, QuoteRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

type MatchKey = (String, String);

fn match_key(book_name: &str, page_ref: &str) -> MatchKey {
    (book_name.to_string(), normalize::page_key(page_ref))
}

/// Records left without a partner, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Unmatched {
    pub unmatched_index: Vec<IndexRecord>,
    pub unmatched_quote: Vec<QuoteRecord>,
}

impl Unmatched {
    pub fn is_empty(&self) -> bool {
        self.unmatched_index.is_empty() && self.unmatched_quote.is_empty()
    }

    /// The non-fatal warning to surface, if anything went unmatched.
    pub fn warning(&self) -> Option<UnmatchedRecordWarning> {
        if self.is_empty() {
            return None;
        }

        let describe = |book: &str, page: &str| UnmatchedRef {
            book_name: book.to_string(),
            page_ref: page.to_string(),
        };

        Some(UnmatchedRecordWarning {
            index: self
                .unmatched_index
                .iter()
                .map(|r| describe(&r.book_name, &r.page_ref))
                .collect(),
            quotes: self
                .unmatched_quote
                .iter()
                .map(|r| describe(&r.book_name, &r.page_ref))
                .collect(),
        })
    }
}

/// Book/page of one unmatched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedRef {
    pub book_name: String,
    pub page_ref: String,
}

/// Non-fatal notice that some records could not be paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedRecordWarning {
    pub index: Vec<UnmatchedRef>,
    pub quotes: Vec<UnmatchedRef>,
}

impl fmt::Display for UnmatchedRecordWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} index entries and {} quotes were not matched",
            self.index.len(),
            self.quotes.len()
        )?;
        for r in &self.index {
            write!(f, "\n  index: {}, page {}", r.book_name, r.page_ref)?;
        }
        for r in &self.quotes {
            write!(f, "\n  quote: {}, page {}", r.book_name, r.page_ref)?;
        }
        Ok(())
    }
}

/// Quotation words compared against a summary.
const QUOTE_WINDOW_WORDS: usize = 100;
/// Summary keywords considered for overlap scoring.
const MAX_KEYWORDS: usize = 10;
/// Shortest word counted as a keyword, in characters.
const MIN_KEYWORD_CHARS: usize = 4;

/// Pair index records with quote records on `(book, page)` only.
///
/// Returns the merged entries sorted by id (ids are exactly `1..=N`) and the
/// records that found no partner.
pub fn merge(index: &[IndexRecord], quotes: &[QuoteRecord]) -> (Vec<MergedEntry>, Unmatched) {
    merge_with(index, quotes, &MatchConfig::default())
}

/// Pair index records with quote records, running the content pass when
/// `matching.content_fallback` is set.
///
/// Ids are assigned after both passes, in index order.
pub fn merge_with(
    index: &[IndexRecord],
    quotes: &[QuoteRecord],
    matching: &MatchConfig,
) -> (Vec<MergedEntry>, Unmatched) {
    let mut queues: HashMap<MatchKey, VecDeque<usize>> = HashMap::new();
    for (i, quote) in quotes.iter().enumerate() {
        queues
            .entry(match_key(&quote.book_name, &quote.page_ref))
            .or_default()
            .push_back(i);
    }
    let quote_keys: HashSet<MatchKey> = queues.keys().cloned().collect();

    let mut used = vec![false; quotes.len()];
    let mut partners: Vec<Option<usize>> = index
        .iter()
        .map(|record| {
            let q = queues
                .get_mut(&match_key(&record.book_name, &record.page_ref))
                .and_then(VecDeque::pop_front)?;
            used[q] = true;
            Some(q)
        })
        .collect();

    if matching.content_fallback {
        let paired = pair_by_content(index, quotes, &quote_keys, &mut partners, &mut used, matching);
        debug!(paired, "content pass");
    }

    let mut entries = Vec::new();
    let mut unmatched = Unmatched::default();
    let mut next_id: u32 = 1;

    for (record, partner) in index.iter().zip(&partners) {
        match partner {
            Some(q) => {
                entries.push(MergedEntry::pair(next_id, record, &quotes[*q]));
                next_id += 1;
            }
            None => unmatched.unmatched_index.push(record.clone()),
        }
    }

    unmatched.unmatched_quote = quotes
        .iter()
        .zip(&used)
        .filter(|(_, used)| !**used)
        .map(|(quote, _)| quote.clone())
        .collect();

    debug!(
        merged = entries.len(),
        unmatched_index = unmatched.unmatched_index.len(),
        unmatched_quote = unmatched.unmatched_quote.len(),
        "reconciled records"
    );

    (entries, unmatched)
}

/// Second pass over records whose key has no counterpart at all.
///
/// Surplus records under a key that did match stay unmatched. Index records
/// are visited in order and take the best-scoring free quote of their book;
/// ties go to the earlier quote. Returns the number of new pairs.
fn pair_by_content(
    index: &[IndexRecord],
    quotes: &[QuoteRecord],
    quote_keys: &HashSet<MatchKey>,
    partners: &mut [Option<usize>],
    used: &mut [bool],
    matching: &MatchConfig,
) -> usize {
    let index_keys: HashSet<MatchKey> = index
        .iter()
        .map(|r| match_key(&r.book_name, &r.page_ref))
        .collect();

    let candidates: Vec<(usize, Vec<String>)> = quotes
        .iter()
        .enumerate()
        .filter(|(q, quote)| {
            !used[*q] && !index_keys.contains(&match_key(&quote.book_name, &quote.page_ref))
        })
        .map(|(q, quote)| {
            let mut words = normalize::match_words(&quote.text);
            words.truncate(QUOTE_WINDOW_WORDS);
            (q, words)
        })
        .collect();

    let mut paired = 0;
    for (i, record) in index.iter().enumerate() {
        if partners[i].is_some() || quote_keys.contains(&match_key(&record.book_name, &record.page_ref)) {
            continue;
        }

        let summary = normalize::match_words(&record.summary);
        let mut best: Option<(usize, f64)> = None;
        for (q, words) in &candidates {
            if used[*q] || quotes[*q].book_name != record.book_name {
                continue;
            }
            let score = content_score(&summary, words, matching.opening_words);
            if score >= matching.min_keyword_overlap && best.map_or(true, |(_, s)| score > s) {
                best = Some((*q, score));
            }
        }

        if let Some((q, score)) = best {
            debug!(
                book = %record.book_name,
                index_page = %record.page_ref,
                quote_page = %quotes[q].page_ref,
                score,
                "paired by content"
            );
            used[q] = true;
            partners[i] = Some(q);
            paired += 1;
        }
    }
    paired
}

/// Similarity of a summary to the start of a quotation, in `0.0..=1.0`.
///
/// The summary's opening words found as a run in the quotation score 1.0;
/// otherwise the score is the share of its keywords the quotation contains.
fn content_score(summary: &[String], quote: &[String], opening_words: usize) -> f64 {
    if opening_words > 0 && summary.len() >= opening_words {
        let opening = &summary[..opening_words];
        if quote.windows(opening_words).any(|w| w == opening) {
            return 1.0;
        }
    }

    let mut keywords: Vec<&str> = Vec::new();
    for word in summary {
        if word.chars().count() >= MIN_KEYWORD_CHARS && !keywords.contains(&word.as_str()) {
            keywords.push(word);
            if keywords.len() == MAX_KEYWORDS {
                break;
            }
        }
    }
    if keywords.is_empty() {
        return 0.0;
    }

    let present: HashSet<&str> = quote.iter().map(String::as_str).collect();
    let found = keywords.iter().filter(|k| present.contains(*k)).count();
    found as f64 / keywords.len() as f64
}

/// Entries of one book, in entry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookGroup<'a> {
    pub book_name: &'a str,
    pub entries: Vec<&'a MergedEntry>,
}

/// Entries grouped by book name in first-seen order.
///
/// A view over a merged entry list; recompute it whenever needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping<'a> {
    pub groups: Vec<BookGroup<'a>>,
}

impl<'a> Grouping<'a> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn book_names(&self) -> Vec<&'a str> {
        self.groups.iter().map(|g| g.book_name).collect()
    }
}

/// Group merged entries by book, preserving first-seen book order.
pub fn group_by_book(entries: &[MergedEntry]) -> Grouping<'_> {
    let mut groups: Vec<BookGroup<'_>> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let slot = *slots.entry(entry.book_name.as_str()).or_insert_with(|| {
            groups.push(BookGroup {
                book_name: entry.book_name.as_str(),
                entries: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].entries.push(entry);
    }

    Grouping { groups }
}

//! Header-field extraction for a single block.
//!
//! A block carries its identity in a few leading lines:
//!
//! ```text
//! ID: 1234567
//! Data Pub.: 10/01/2023
//! Número Pub.: 123
//! Número Bloco: 00001
//! ```
//!
//! Each field is resolved by an ordered list of [`FieldMatcher`] strategies;
//! the first one that returns `Some` wins. Every field falls back to its own
//! default independently, so a block with only an id still gets a date, a
//! publication placeholder and a positional block number.

use crate::pipeline::extract::PublicationDate;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

/// One way of recognising a header field.
pub trait FieldMatcher: Send + Sync {
    /// Return the captured value if this matcher recognises the text.
    fn find(&self, text: &str) -> Option<String>;
}

/// A matcher backed by a regex whose first capture group is the value.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    re: Regex,
}

impl RegexMatcher {
    pub fn new(re: Regex) -> Self {
        Self { re }
    }
}

impl FieldMatcher for RegexMatcher {
    fn find(&self, text: &str) -> Option<String> {
        self.re
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Try each matcher in order; the first success wins.
pub fn first_match(matchers: &[Box<dyn FieldMatcher>], text: &str) -> Option<String> {
    matchers.iter().find_map(|m| m.find(text))
}

// ── Default pattern tables ───────────────────────────────────────────────────

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static header pattern")
}

static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| vec![re(r"(?i)\bID\s*[:.]\s*(\d+)")]);

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?i)Data\s+Pub\.?\s*[:.]\s*(\d{2}/\d{2}/\d{4})"),
        re(r"(?i)Data\s+de\s+Publicação\s*[:.]\s*(\d{2}/\d{2}/\d{4})"),
        re(r"(?i)Publicado\s+em\s*[:.]\s*(\d{2}/\d{2}/\d{4})"),
        re(r"(\d{2}/\d{2}/\d{4})"),
    ]
});

static PUBLICATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?i)Número\s+Pub\.?\s*[:.]\s*(\d+)"),
        re(r"(?i)Nº\s+(?:da\s+)?Publ?(?:icação)?\s*[:.]\s*(\d+)"),
    ]
});

static BLOCK_NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"(?i)Número\s+Bloco\s*[:.]\s*(\d+)"),
        re(r"(?i)Nº\s+(?:do\s+)?Bloco\s*[:.]\s*(\d+)"),
    ]
});

fn matchers(patterns: &[Regex]) -> Vec<Box<dyn FieldMatcher>> {
    patterns
        .iter()
        .map(|r| Box::new(RegexMatcher::new(r.clone())) as Box<dyn FieldMatcher>)
        .collect()
}

/// Ordered matcher lists for every header field.
pub struct HeaderMatchers {
    pub id: Vec<Box<dyn FieldMatcher>>,
    pub date: Vec<Box<dyn FieldMatcher>>,
    pub publication: Vec<Box<dyn FieldMatcher>>,
    pub block_number: Vec<Box<dyn FieldMatcher>>,
    /// How many leading lines of the block are searched.
    pub window_lines: usize,
}

impl HeaderMatchers {
    /// The gazette's header layout, searching the first `window_lines` lines.
    pub fn gazette(window_lines: usize) -> Self {
        Self {
            id: matchers(&ID_PATTERNS),
            date: matchers(&DATE_PATTERNS),
            publication: matchers(&PUBLICATION_PATTERNS),
            block_number: matchers(&BLOCK_NUMBER_PATTERNS),
            window_lines: window_lines.max(1),
        }
    }

    /// Resolve every field of a block, substituting defaults where needed.
    ///
    /// `sequence_index` feeds the positional fallbacks; `today` is the date
    /// used when no date pattern matches.
    pub fn extract(&self, text: &str, sequence_index: usize, today: NaiveDate) -> HeaderFields {
        let window = leading_lines(text, self.window_lines);

        let document_id = first_match(&self.id, window)
            .unwrap_or_else(|| format!("{:06}", sequence_index));

        let date = first_match(&self.date, window)
            .and_then(|d| PublicationDate::from_str(&d).ok())
            .unwrap_or_else(|| PublicationDate::from_naive(today));

        let publication_number = first_match(&self.publication, window);

        let block_number = first_match(&self.block_number, window)
            .unwrap_or_else(|| format!("{:05}", sequence_index));

        HeaderFields {
            document_id,
            date,
            publication_number,
            block_number,
        }
    }
}

/// Resolved header of one block. Every field is present; defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub document_id: String,
    pub date: PublicationDate,
    /// `None` when no publication-number pattern matched.
    pub publication_number: Option<String>,
    pub block_number: String,
}

fn leading_lines(text: &str, n: usize) -> &str {
    match text.match_indices('\n').nth(n.saturating_sub(1)) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

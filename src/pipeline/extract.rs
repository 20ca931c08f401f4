//! Block extraction: raw gazette text → header + ordered, marker-tagged blocks.
//!
//! ## Steps
//!
//! 1. Read the publication date and edition number from the masthead line
//!    (`Curitiba, 10 de janeiro de 2023 - Edição nº 123`). Both are searched
//!    once over the raw text; a missing masthead yields sentinels, not errors.
//! 2. Strip recurring masthead/footer boilerplate and collapse newlines.
//! 3. Split in front of every `IDMATERIA<digits>IDMATERIA` marker. The marker
//!    stays at the start of its segment; the leading segment (index, cover
//!    text) has no marker and is dropped.
//!
//! The index span between `Índice de Publicação` and the first marker is
//! extracted separately for the full-text summary; it never becomes a block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rendered in place of a publication date that could not be found.
pub const DATE_NOT_FOUND: &str = "Data não encontrada";
/// Rendered in place of an edition number that could not be found.
pub const NUMBER_NOT_FOUND: &str = "Número não encontrado";
/// Rendered in place of an index section that could not be found.
pub const INDEX_NOT_FOUND: &str = "Índice não encontrado";

/// Delimiter line written between blocks of a full-text summary.
pub const BLOCK_DELIMITER: &str =
    "************************************************************";

// ── Publication date ─────────────────────────────────────────────────────────

/// A `DD/MM/YYYY` publication date.
///
/// The month may be `0` when the masthead used a month name outside the
/// 12-entry table; the value is still carried so the summary shows what was
/// found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicationDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl PublicationDate {
    pub fn from_naive(d: chrono::NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            day: d.day(),
            month: d.month(),
            year: d.year(),
        }
    }
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

impl FromStr for PublicationDate {
    type Err = String;

    /// Parse `DD/MM/YYYY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        let (Some(d), Some(m), Some(y), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("not a DD/MM/YYYY date: '{s}'"));
        };
        let parse = |v: &str| v.parse::<u32>().map_err(|e| format!("'{s}': {e}"));
        let (day, month) = (parse(d)?, parse(m)?);
        if !(1..=31).contains(&day) || month > 12 {
            return Err(format!("day or month out of range: '{s}'"));
        }
        Ok(Self {
            day,
            month,
            year: y.parse::<i32>().map_err(|e| format!("'{s}': {e}"))?,
        })
    }
}

/// Map a Portuguese month name to its number; unknown names map to `0`.
pub fn month_number(name: &str) -> u32 {
    const MONTHS: [&str; 12] = [
        "janeiro",
        "fevereiro",
        "março",
        "abril",
        "maio",
        "junho",
        "julho",
        "agosto",
        "setembro",
        "outubro",
        "novembro",
        "dezembro",
    ];
    let lowered = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lowered)
        .map(|i| i as u32 + 1)
        .unwrap_or(0)
}

// ── Document header ──────────────────────────────────────────────────────────

static RE_MASTHEAD_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Curitiba, (\d{1,2}) de (\w+) de (\d{4})").unwrap());

static RE_EDITION: Lazy<Regex> = Lazy::new(|| Regex::new(r"Edição nº (\d+)").unwrap());

/// Publication date and edition number of a whole gazette.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub date: Option<PublicationDate>,
    pub number: Option<String>,
}

impl DocumentHeader {
    /// The date as rendered in summaries, or [`DATE_NOT_FOUND`].
    pub fn date_or_sentinel(&self) -> String {
        self.date
            .map(|d| d.to_string())
            .unwrap_or_else(|| DATE_NOT_FOUND.to_string())
    }

    /// The number as rendered in summaries, or [`NUMBER_NOT_FOUND`].
    pub fn number_or_sentinel(&self) -> &str {
        self.number.as_deref().unwrap_or(NUMBER_NOT_FOUND)
    }
}

/// Search the raw text once for the masthead date and edition number.
pub fn extract_header(text: &str) -> DocumentHeader {
    let date = RE_MASTHEAD_DATE.captures(text).and_then(|c| {
        Some(PublicationDate {
            day: c[1].parse().ok()?,
            month: month_number(&c[2]),
            year: c[3].parse().ok()?,
        })
    });
    let number = RE_EDITION.captures(text).map(|c| c[1].to_string());
    DocumentHeader { date, number }
}

// ── Boilerplate ──────────────────────────────────────────────────────────────

static RE_MASTHEAD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Curitiba, \d{1,2} de \w+ de \d{4} - Edição nº \d+").unwrap()
});
static RE_ISSUER_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Diário Eletrônico do Tr[^\n]*").unwrap());
static RE_ISSUER_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ribunal de Justiça do Paraná").unwrap());
static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"- \d+ -").unwrap());
static RE_DASH_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n-+\n").unwrap());
static RE_PAGE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(#Pag\) -").unwrap());
static RE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());

fn strip_once(text: &str) -> String {
    let s = RE_MASTHEAD_LINE.replace_all(text, "");
    let s = RE_ISSUER_HEAD.replace_all(&s, "");
    let s = RE_ISSUER_TAIL.replace_all(&s, "");
    let s = RE_PAGE_NUMBER.replace_all(&s, "");
    let s = RE_DASH_LINE.replace_all(&s, "\n");
    let s = RE_PAGE_TOKEN.replace_all(&s, "");
    RE_NEWLINES.replace_all(&s, " ").into_owned()
}

/// Remove masthead/footer boilerplate and collapse newline runs to spaces.
///
/// A removal can splice text into a new match (`- 1 - 2 -`), so the rules are
/// re-applied until nothing changes. That makes the function idempotent.
/// Every pass either shortens the text or leaves it unchanged once the
/// newlines are gone, so the loop terminates.
pub fn strip_boilerplate(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

// ── Segmentation ─────────────────────────────────────────────────────────────

static RE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"IDMATERIA(\d+)IDMATERIA").unwrap());

/// One marker-delimited block, as cut from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Digits of the `IDMATERIA<digits>IDMATERIA` marker.
    pub marker_id: String,
    /// 1-based position among the blocks of the document.
    pub sequence_index: usize,
    /// Trimmed text after the marker.
    pub content: String,
}

/// Split normalized text in front of every marker.
pub fn extract_blocks(text: &str) -> Vec<RawBlock> {
    let starts: Vec<usize> = RE_MARKER.find_iter(text).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            let segment = &text[start..end];
            let caps = RE_MARKER.captures(segment)?;
            let whole = caps.get(0)?;
            Some((caps[1].to_string(), segment[whole.end()..].trim().to_string()))
        })
        .enumerate()
        .map(|(i, (marker_id, content))| RawBlock {
            marker_id,
            sequence_index: i + 1,
            content,
        })
        .collect()
}

static RE_INDEX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"Índice de Publicação").unwrap());

/// Text from the `Índice de Publicação` heading up to the first marker after it.
pub fn extract_index(text: &str) -> Option<String> {
    let heading = RE_INDEX_HEADING.find(text)?;
    let marker = RE_MARKER.find_at(text, heading.start())?;
    Some(text[heading.start()..marker.start()].trim().to_string())
}

// ── Whole document ───────────────────────────────────────────────────────────

/// Everything the extractor derives from one document's raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub header: DocumentHeader,
    pub index: Option<String>,
    pub blocks: Vec<RawBlock>,
}

/// Run header detection, boilerplate removal and segmentation.
///
/// Empty or garbled input yields an empty header and zero blocks.
pub fn extract_document(raw: &str) -> ExtractedDocument {
    let header = extract_header(raw);
    let cleaned = strip_boilerplate(raw);
    let index = extract_index(&cleaned);
    let blocks = extract_blocks(&cleaned);
    ExtractedDocument {
        header,
        index,
        blocks,
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Render a block with its identity header, as stored in block files.
pub fn render_block(block: &RawBlock, header: &DocumentHeader) -> String {
    format!(
        "ID: {}\nData Pub.: {}\nNúmero Pub.: {}\nNúmero Bloco: {:05}\n\n{}",
        block.marker_id,
        header.date_or_sentinel(),
        header.number_or_sentinel(),
        block.sequence_index,
        block.content
    )
}

/// Render the full-text summary: header, index, then every block.
pub fn render_full_text(doc: &ExtractedDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("Data de Publicação: {}\n", doc.header.date_or_sentinel()));
    out.push_str(&format!(
        "Número da Publicação: {}\n\n",
        doc.header.number_or_sentinel()
    ));
    out.push_str("ÍNDICE\n");
    out.push_str(doc.index.as_deref().unwrap_or(INDEX_NOT_FOUND));
    out.push_str("\n\n");
    out.push_str(BLOCK_DELIMITER);
    out.push_str("\n\n");
    for block in &doc.blocks {
        out.push_str(BLOCK_DELIMITER);
        out.push('\n');
        out.push_str(&render_block(block, &doc.header));
        out.push_str("\n\n");
    }
    out
}

static RE_LONG_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{12,}").unwrap());

/// Split a full-text summary back into block texts.
///
/// Segments are cut on runs of twelve or more `*`. Empty segments and the
/// summary preamble (`Data de Publicação: … ÍNDICE …`) are dropped.
pub fn split_full_text(text: &str) -> Vec<String> {
    RE_LONG_DELIMITER
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with("Data de Publicação:"))
        .map(str::to_string)
        .collect()
}

//! Block classification: decide AUCTION vs NON_AUCTION with a numeric score.
//!
//! Two strategies sit behind one [`ClassificationStrategy`] trait:
//!
//! * [`KeywordClassifier`]: the minimal boolean check: any of a short list
//!   of keywords present → AUCTION (score 1.0), otherwise NON_AUCTION (0.0).
//! * [`ScoredClassifier`]: a weighted lexicon of strong, supporting and
//!   counter-indicating terms, summed, clamped and compared to a threshold.
//!
//! Both are pure: the result depends only on the block text, never on other
//! blocks or on call order. Lexicons are data ([`Lexicon`] deserialises from
//! JSON) so weights can be tuned without recompiling.
//!
//! ## Matching
//!
//! Text and terms are lower-cased (full Unicode, so `LEILÃO` matches
//! `leilão`) and scanned once with an Aho-Corasick automaton over every term
//! of every category. Only whole-word matches count: a match with a letter or
//! digit right before or after it is ignored. A term contributes its weight
//! once, however many times it occurs; overlapping matches are reported so
//! `edital de leilão` also counts `leilão`.

use crate::error::DiarioError;
use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// The two output partitions a block can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockLabel {
    /// An auction notice (edital de leilão).
    Auction,
    /// Anything else published in the gazette.
    NonAuction,
}

impl BlockLabel {
    pub fn is_auction(self) -> bool {
        matches!(self, BlockLabel::Auction)
    }
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLabel::Auction => f.write_str("leilão"),
            BlockLabel::NonAuction => f.write_str("não leilão"),
        }
    }
}

/// Outcome of classifying one block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: BlockLabel,
    pub score: f32,
}

/// A classification strategy: block text in, (label, score) out.
///
/// Implementations must be deterministic and must not depend on state shared
/// between calls.
pub trait ClassificationStrategy: Send + Sync {
    /// Classify a block's text.
    fn classify(&self, text: &str) -> Classification;

    /// Strategy name, for logs.
    fn name(&self) -> &'static str;
}

/// Which built-in strategy a pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassifierKind {
    /// Boolean keyword presence.
    Keyword,
    /// Weighted lexicon. (default)
    #[default]
    Scored,
}

// ── Keyword strategy ─────────────────────────────────────────────────────────

/// Boolean presence check over a short keyword list.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(["leilão", "leilões"])
    }
}

impl ClassificationStrategy for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        if self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            Classification {
                label: BlockLabel::Auction,
                score: 1.0,
            }
        } else {
            Classification {
                label: BlockLabel::NonAuction,
                score: 0.0,
            }
        }
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

// ── Scored strategy ──────────────────────────────────────────────────────────

/// One lexicon entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f32,
}

impl WeightedTerm {
    pub fn new(term: impl Into<String>, weight: f32) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// Tunable lexicon for [`ScoredClassifier`].
///
/// Counter terms subtract their weight; `min_score`/`max_score` bound the
/// sum; a block is an auction when the bounded sum is strictly greater than
/// `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub strong: Vec<WeightedTerm>,
    #[serde(default)]
    pub supporting: Vec<WeightedTerm>,
    #[serde(default)]
    pub counter: Vec<WeightedTerm>,
    pub threshold: f32,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_max_score")]
    pub max_score: f32,
}

fn default_min_score() -> f32 {
    -10.0
}

fn default_max_score() -> f32 {
    10.0
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            strong: vec![
                WeightedTerm::new("edital de leilão", 4.0),
                WeightedTerm::new("leilão", 3.0),
                WeightedTerm::new("leilões", 3.0),
                WeightedTerm::new("hasta pública", 3.0),
                WeightedTerm::new("arrematação", 2.5),
                WeightedTerm::new("arrematante", 2.0),
            ],
            supporting: vec![
                WeightedTerm::new("leiloeiro", 1.5),
                WeightedTerm::new("lance", 1.0),
                WeightedTerm::new("avaliação do bem", 1.0),
                WeightedTerm::new("avaliado em", 1.0),
                WeightedTerm::new("comissão", 0.5),
                WeightedTerm::new("praça", 0.5),
                WeightedTerm::new("lote", 0.5),
                WeightedTerm::new("matrícula", 0.5),
                WeightedTerm::new("ônus", 0.5),
            ],
            counter: vec![
                WeightedTerm::new("decreto judiciário", 2.0),
                WeightedTerm::new("portaria", 1.5),
                WeightedTerm::new("exoneração", 1.5),
                WeightedTerm::new("nomeação", 1.0),
                WeightedTerm::new("férias", 1.0),
                WeightedTerm::new("licitação", 1.0),
                WeightedTerm::new("resolução", 1.0),
                WeightedTerm::new("pauta de julgamento", 1.0),
            ],
            threshold: 2.0,
            min_score: default_min_score(),
            max_score: default_max_score(),
        }
    }
}

impl Lexicon {
    /// Load a lexicon from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, DiarioError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DiarioError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&raw)
    }

    /// Parse a lexicon from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, DiarioError> {
        let lexicon: Lexicon =
            serde_json::from_str(raw).map_err(|e| DiarioError::InvalidLexicon(e.to_string()))?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn validate(&self) -> Result<(), DiarioError> {
        if self.strong.is_empty() {
            return Err(DiarioError::InvalidLexicon(
                "at least one strong term is required".into(),
            ));
        }
        if self.min_score >= self.max_score {
            return Err(DiarioError::InvalidLexicon(format!(
                "min_score ({}) must be below max_score ({})",
                self.min_score, self.max_score
            )));
        }
        let all = self.strong.iter().chain(&self.supporting).chain(&self.counter);
        for t in all {
            if t.term.trim().is_empty() {
                return Err(DiarioError::InvalidLexicon("empty term".into()));
            }
            if !t.weight.is_finite() || t.weight < 0.0 {
                return Err(DiarioError::InvalidLexicon(format!(
                    "weight of '{}' must be a non-negative number",
                    t.term
                )));
            }
        }
        Ok(())
    }
}

/// Weighted multi-term scorer.
#[derive(Debug, Clone)]
pub struct ScoredClassifier {
    automaton: AhoCorasick,
    /// Signed weight per automaton pattern id.
    weights: Vec<f32>,
    threshold: f32,
    min_score: f32,
    max_score: f32,
}

impl ScoredClassifier {
    pub fn new(lexicon: &Lexicon) -> Result<Self, DiarioError> {
        lexicon.validate()?;

        let mut terms = Vec::new();
        let mut weights = Vec::new();
        for t in lexicon.strong.iter().chain(&lexicon.supporting) {
            terms.push(t.term.to_lowercase());
            weights.push(t.weight);
        }
        for t in &lexicon.counter {
            terms.push(t.term.to_lowercase());
            weights.push(-t.weight);
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&terms)
            .map_err(|e| DiarioError::InvalidLexicon(e.to_string()))?;

        Ok(Self {
            automaton,
            weights,
            threshold: lexicon.threshold,
            min_score: lexicon.min_score,
            max_score: lexicon.max_score,
        })
    }
}

/// True when the match is not glued to a letter or digit on either side,
/// so `lote` does not count inside `loteamento`.
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

impl ClassificationStrategy for ScoredClassifier {
    fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();

        let seen: HashSet<usize> = self
            .automaton
            .find_overlapping_iter(&lowered)
            .filter(|m| is_whole_word(&lowered, m.start(), m.end()))
            .map(|m| m.pattern().as_usize())
            .collect();

        // Sum in pattern order so the float result does not depend on
        // hash-set iteration order.
        let mut ids: Vec<usize> = seen.into_iter().collect();
        ids.sort_unstable();
        let raw: f32 = ids.iter().map(|&id| self.weights[id]).sum();
        let score = raw.clamp(self.min_score, self.max_score);

        let label = if score > self.threshold {
            BlockLabel::Auction
        } else {
            BlockLabel::NonAuction
        };
        debug!("scored classifier: {} terms, score {:.2} → {}", ids.len(), score, label);

        Classification { label, score }
    }

    fn name(&self) -> &'static str {
        "scored"
    }
}

/// Build the strategy a pipeline is configured with.
pub fn build_strategy(
    kind: ClassifierKind,
    lexicon: &Lexicon,
) -> Result<Box<dyn ClassificationStrategy>, DiarioError> {
    Ok(match kind {
        ClassifierKind::Keyword => Box::new(KeywordClassifier::default()),
        ClassifierKind::Scored => Box::new(ScoredClassifier::new(lexicon)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUCTION: &str = "EDITAL DE LEILÃO E INTIMAÇÃO. O leiloeiro oficial levará a público \
        pregão o bem avaliado em R$ 100.000,00. Lance mínimo de 50% da avaliação.";
    const DECREE: &str = "DECRETO JUDICIÁRIO Nº 123. Concede férias ao servidor e dá outras \
        providências. Portaria publicada nesta data.";

    #[test]
    fn keyword_detects_leilao() {
        let c = KeywordClassifier::default();
        let r = c.classify("Primeiro LEILÃO dia 10");
        assert_eq!(r.label, BlockLabel::Auction);
        assert_eq!(r.score, 1.0);
    }

    #[test]
    fn keyword_rejects_other_text() {
        let c = KeywordClassifier::default();
        let r = c.classify(DECREE);
        assert_eq!(r.label, BlockLabel::NonAuction);
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn scored_detects_auction_notice() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        let r = c.classify(AUCTION);
        assert_eq!(r.label, BlockLabel::Auction);
        assert!(r.score > 2.0, "score {}", r.score);
    }

    #[test]
    fn scored_rejects_decree() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        let r = c.classify(DECREE);
        assert_eq!(r.label, BlockLabel::NonAuction);
        assert!(r.score < 0.0, "score {}", r.score);
    }

    #[test]
    fn scored_single_strong_term_is_enough() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        let r = c.classify("designado leilão para o dia 5");
        assert_eq!(r.label, BlockLabel::Auction);
        assert_eq!(r.score, 3.0);
    }

    #[test]
    fn scored_ignores_terms_inside_longer_words() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        let r = c.classify(
            "Aprovado o loteamento do imóvel de matrícula 55, avaliado em R$ 10.000,00, sem bônus.",
        );
        // only "matrícula" (0.5) and "avaliado em" (1.0) are whole words here
        assert_eq!(r.label, BlockLabel::NonAuction);
        assert_eq!(r.score, 1.5);
        assert_eq!(c.classify("leilãozinho").score, 0.0);
        assert_eq!(c.classify("(leilão)").score, 3.0);
    }

    #[test]
    fn scored_counts_each_term_once() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        let once = c.classify("leilão");
        let thrice = c.classify("leilão leilão leilão");
        assert_eq!(once.score, thrice.score);
    }

    #[test]
    fn scored_overlapping_terms_both_count() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        // "edital de leilão" (4.0) + "leilão" (3.0)
        assert_eq!(c.classify("edital de leilão").score, 7.0);
    }

    #[test]
    fn scored_is_clamped() {
        let lexicon = Lexicon {
            strong: vec![WeightedTerm::new("a", 50.0)],
            max_score: 10.0,
            ..Lexicon::default()
        };
        let c = ScoredClassifier::new(&lexicon).unwrap();
        assert_eq!(c.classify("a").score, 10.0);
    }

    #[test]
    fn scored_is_deterministic() {
        let c = ScoredClassifier::new(&Lexicon::default()).unwrap();
        assert_eq!(c.classify(AUCTION), c.classify(AUCTION));
        assert_eq!(c.classify(DECREE), c.classify(DECREE));
    }

    #[test]
    fn lexicon_from_json_uses_defaults_for_bounds() {
        let raw = r#"{"strong":[{"term":"leilão","weight":3}],"threshold":1.0}"#;
        let lexicon = Lexicon::from_json(raw).unwrap();
        assert!(lexicon.supporting.is_empty());
        assert_eq!(lexicon.min_score, -10.0);
        assert_eq!(lexicon.max_score, 10.0);
    }

    #[test]
    fn lexicon_rejects_negative_weight() {
        let raw = r#"{"strong":[{"term":"leilão","weight":-3}],"threshold":1.0}"#;
        assert!(matches!(
            Lexicon::from_json(raw),
            Err(DiarioError::InvalidLexicon(_))
        ));
    }

    #[test]
    fn build_strategy_names() {
        let lexicon = Lexicon::default();
        assert_eq!(
            build_strategy(ClassifierKind::Keyword, &lexicon).unwrap().name(),
            "keyword"
        );
        assert_eq!(
            build_strategy(ClassifierKind::Scored, &lexicon).unwrap().name(),
            "scored"
        );
    }
}

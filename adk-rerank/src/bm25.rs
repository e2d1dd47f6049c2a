//! Lexical relevance scoring.
//!
//! Two modes are available, selected by [`LexicalScoring`]:
//!
//! - [`LexicalScoring::TermFrequency`] scores each document on its own with a
//!   saturating term-frequency curve. No statistics are shared between
//!   documents, so a document's score does not depend on its neighbours.
//! - [`LexicalScoring::Bm25`] is Okapi BM25 where the "corpus" is the
//!   candidate set being reranked: IDF and average length come from the
//!   candidates, and scores are divided by the best score in the set.
//!
//! Both modes return scores in `[0, 1]`.
//!
//! ```text
//! tf_part(t, D) = f(t,D) × (k1 + 1) / (f(t,D) + k1 × (1 − b + b × |D| / L))
//!
//! TermFrequency: score = Σ tf_part / (|Q| × (k1 + 1))          L = 100 tokens
//! Bm25:          score = Σ IDF(t) × tf_part / max_D(...)       L = avgdl
//!                IDF(t) = ln((N − n(t) + 0.5) / (n(t) + 0.5) + 1)
//! ```

use std::collections::{HashMap, HashSet};

use crate::config::LexicalScoring;
use crate::document::Document;

/// Term frequency saturation.
pub const K1: f32 = 1.2;

/// Length normalization strength.
pub const B: f32 = 0.75;

/// Reference document length (in tokens) for per-document scoring.
const REFERENCE_LENGTH: f32 = 100.0;

/// Score given to every document when the query has no usable keywords.
pub const NEUTRAL_LEXICAL_SCORE: f32 = 0.5;

/// Words ignored when extracting query keywords.
pub const STOP_WORDS: &[&str] = &[
    "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "in", "is", "it", "me", "my", "of", "on", "or", "our", "the", "this", "that", "to", "was",
    "we", "were", "what", "when", "where", "which", "who", "why", "with", "you", "your",
];

fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Extract the keywords of a query.
///
/// Splits on whitespace, strips leading and trailing punctuation, lowercases,
/// drops tokens of a single character and stop words, and removes duplicates
/// while keeping first-occurrence order.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| t.chars().count() > 1)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Split document text into normalized tokens, the same way query words are
/// normalized.
pub fn tokenize_text(text: &str) -> Vec<String> {
    text.split_whitespace().map(normalize_token).filter(|t| !t.is_empty()).collect()
}

struct TermStats {
    counts: HashMap<String, usize>,
    length: usize,
}

impl TermStats {
    fn new(text: &str) -> Self {
        let tokens = tokenize_text(text);
        let length = tokens.len();
        let mut counts = HashMap::new();
        for token in tokens {
            *counts.entry(token).or_insert(0) += 1;
        }
        Self { counts, length }
    }

    fn tf(&self, term: &str) -> f32 {
        self.counts.get(term).copied().unwrap_or(0) as f32
    }
}

fn saturate(tf: f32, length: usize, reference_length: f32) -> f32 {
    if tf <= 0.0 {
        return 0.0;
    }
    let norm = K1 * (1.0 - B + B * length as f32 / reference_length);
    tf * (K1 + 1.0) / (tf + norm)
}

/// Score one document against pre-extracted keywords without corpus statistics.
pub fn term_frequency_score(keywords: &[String], text: &str) -> f32 {
    if keywords.is_empty() {
        return NEUTRAL_LEXICAL_SCORE;
    }
    let stats = TermStats::new(text);
    let total: f32 =
        keywords.iter().map(|k| saturate(stats.tf(k), stats.length, REFERENCE_LENGTH)).sum();
    (total / (keywords.len() as f32 * (K1 + 1.0))).clamp(0.0, 1.0)
}

/// Score every text against the keywords with BM25 over the given set.
pub fn bm25_scores(keywords: &[String], texts: &[&str]) -> Vec<f32> {
    if texts.is_empty() {
        return Vec::new();
    }
    if keywords.is_empty() {
        return vec![NEUTRAL_LEXICAL_SCORE; texts.len()];
    }

    let stats: Vec<TermStats> = texts.iter().map(|t| TermStats::new(t)).collect();
    let n = stats.len() as f32;
    let avgdl = (stats.iter().map(|s| s.length).sum::<usize>() as f32 / n).max(1.0);

    let idf: Vec<f32> = keywords
        .iter()
        .map(|k| {
            let df = stats.iter().filter(|s| s.tf(k) > 0.0).count() as f32;
            ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
        })
        .collect();

    let raw: Vec<f32> = stats
        .iter()
        .map(|s| {
            keywords
                .iter()
                .zip(&idf)
                .map(|(k, idf)| idf * saturate(s.tf(k), s.length, avgdl))
                .sum()
        })
        .collect();

    let max = raw.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; raw.len()];
    }
    raw.into_iter().map(|s| (s / max).clamp(0.0, 1.0)).collect()
}

/// Lexical sub-scores for a candidate set, one per document, in input order.
pub fn lexical_scores(mode: LexicalScoring, query: &str, documents: &[Document]) -> Vec<f32> {
    let keywords = tokenize_query(query);
    match mode {
        LexicalScoring::TermFrequency => {
            documents.iter().map(|d| term_frequency_score(&keywords, &d.text)).collect()
        }
        LexicalScoring::Bm25 => {
            let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
            bm25_scores(&keywords, &texts)
        }
    }
}

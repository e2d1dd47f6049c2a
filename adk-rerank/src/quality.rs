//! Content quality heuristic.

use crate::document::Document;

/// Punctuation marks counted towards the "well-formed prose" bonus.
pub const PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '。', '，', '；', '：', '！', '？'];

const BASE: f32 = 0.5;

/// Score a document's quality in `[0, 1]`.
///
/// Starts at 0.5 and adds:
///
/// | Signal | Bonus |
/// |--------|-------|
/// | 200–2000 characters | +0.2 |
/// | 2001–5000 characters | +0.1 |
/// | more than 5 punctuation marks | +0.1 |
/// | non-null `title` metadata | +0.1 |
/// | non-null `author` metadata | +0.05 |
/// | non-null `source` metadata | +0.05 |
pub fn quality_score(document: &Document) -> f32 {
    let mut score = BASE;

    let length = document.text.chars().count();
    if (200..=2000).contains(&length) {
        score += 0.2;
    } else if (2001..=5000).contains(&length) {
        score += 0.1;
    }

    let punctuation = document.text.chars().filter(|c| PUNCTUATION.contains(c)).count();
    if punctuation > 5 {
        score += 0.1;
    }

    if document.has_metadata("title") {
        score += 0.1;
    }
    if document.has_metadata("author") {
        score += 0.05;
    }
    if document.has_metadata("source") {
        score += 0.05;
    }

    score.min(1.0)
}

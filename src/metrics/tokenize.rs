//! Caption tokenization shared by the native scorers.
//!
//! Approximates the PTB tokenizer used by COCO caption evaluation: text is
//! lowercased, punctuation is removed and the rest is split on whitespace.
//! Apostrophes inside words are kept so contractions stay one token.

use std::collections::HashMap;

/// Punctuation that separates tokens.
const SEPARATORS: &[char] = &[
    '.', ',', '?', '!', ':', ';', '"', '(', ')', '[', ']', '{', '}', '`',
];

/// Tokenize a caption.
#[must_use]
pub fn tokenize(caption: &str) -> Vec<String> {
    caption
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .map(|tok| tok.trim_matches(|c: char| c == '\'' || c == '-'))
        .filter(|tok| !tok.is_empty())
        .map(String::from)
        .collect()
}

/// N-gram counts of orders `1..=max_n`.
pub type NgramCounts = HashMap<Vec<String>, usize>;

/// Count all n-grams of order `1..=max_n`.
#[must_use]
pub fn ngram_counts(tokens: &[String], max_n: usize) -> NgramCounts {
    let mut counts = NgramCounts::new();
    for n in 1..=max_n {
        for window in tokens.windows(n) {
            *counts.entry(window.to_vec()).or_default() += 1;
        }
    }
    counts
}

//! Text normalization for fuzzy matching and embedding input.
//!
//! The same normalizer must be applied to corpus questions at build time and
//! to queries at search time:
//! 1. Lowercase
//! 2. Drop every character that is not a word character or whitespace
//! 3. Split on whitespace and remove stop words
//! 4. Rejoin with single spaces

use std::collections::HashSet;

use regex::Regex;

use crate::search::stopwords::ENGLISH_STOP_WORDS;

/// Matches anything that is neither a word character nor whitespace.
const PUNCTUATION_PATTERN: &str = r"[^\w\s]";

/// Lowercases, strips punctuation and removes stop words.
#[derive(Debug, Clone)]
pub struct Normalizer {
    punctuation: Regex,
    stop_words: HashSet<&'static str>,
}

impl Normalizer {
    /// Create a normalizer using the English stop-word list.
    pub fn new() -> Self {
        Self::with_stop_words(ENGLISH_STOP_WORDS.iter().copied())
    }

    /// Create a normalizer with a custom stop-word set.
    pub fn with_stop_words(stop_words: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            punctuation: Regex::new(PUNCTUATION_PATTERN).expect("punctuation pattern is valid"),
            stop_words: stop_words.into_iter().collect(),
        }
    }

    /// Normalize text. Empty input yields an empty string.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped = self.punctuation.replace_all(&lowered, "");

        stripped
            .split_whitespace()
            .filter(|token| !self.stop_words.contains(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Iterate over the configured stop words (unordered).
    pub fn stop_words(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stop_words.iter().copied()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

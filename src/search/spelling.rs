//! Frequency-based spelling correction for raw queries.
//!
//! Every whitespace-separated token is looked up in a `word -> frequency`
//! dictionary. Unknown tokens are replaced by the closest dictionary word
//! (optimal string alignment distance), preferring the most frequent word
//! among equally close candidates. Tokens without a candidate are kept as-is.
//!
//! Stop words count as known words but are never offered as corrections,
//! since normalization would drop them and lose the query term.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Bundled English word frequencies, one `word count` per line.
const ENGLISH_WORDS: &str = include_str!("data/english_words.txt");

/// Default maximum edit distance for a correction.
pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 2;

/// Tokens longer than this (in chars) are never corrected.
const MAX_TOKEN_LENGTH: usize = 24;

/// Frequency assigned to stop words so common function words count as known.
const STOP_WORD_FREQUENCY: u64 = 1_000;

/// Errors raised while loading an external frequency dictionary.
#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid dictionary entry on line {line}: {content:?}")]
    InvalidLine { line: usize, content: String },
}

/// Dictionary-backed spelling corrector.
#[derive(Debug, Clone)]
pub struct SpellingCorrector {
    words: HashMap<String, u64>,
    stop_words: HashSet<String>,
    max_distance: usize,
}

impl SpellingCorrector {
    /// Empty dictionary.
    pub fn new(max_distance: usize) -> Self {
        Self {
            words: HashMap::new(),
            stop_words: HashSet::new(),
            max_distance,
        }
    }

    /// Dictionary seeded with the bundled English word frequencies.
    pub fn english(max_distance: usize) -> Result<Self, DictionaryError> {
        let mut speller = Self::new(max_distance);
        speller.add_frequency_list(ENGLISH_WORDS.as_bytes())?;
        Ok(speller)
    }

    /// Number of distinct dictionary words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains_key(&word.to_lowercase())
    }

    pub fn frequency(&self, word: &str) -> u64 {
        self.words.get(&word.to_lowercase()).copied().unwrap_or(0)
    }

    /// Add `count` occurrences of a word.
    pub fn add_word(&mut self, word: &str, count: u64) {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return;
        }
        *self.words.entry(word).or_insert(0) += count;
    }

    /// Count every word of a free text into the dictionary.
    pub fn add_text(&mut self, text: &str) {
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
        {
            self.add_word(word, 1);
        }
    }

    /// Seed stop words as known words that are never offered as corrections.
    pub fn add_stop_words<'a>(&mut self, stop_words: impl IntoIterator<Item = &'a str>) {
        for word in stop_words {
            // contracted forms can never appear as a single query token match
            if word.chars().all(char::is_alphanumeric) {
                self.add_word(word, STOP_WORD_FREQUENCY);
                self.stop_words.insert(word.to_lowercase());
            }
        }
    }

    /// Load a frequency file with one `word [count]` entry per line.
    ///
    /// Returns the number of entries read.
    pub fn load_frequency_file(&mut self, path: &Path) -> Result<usize, DictionaryError> {
        self.add_frequency_list(BufReader::new(File::open(path)?))
    }

    /// Read `word [count]` lines. Blank lines and lines starting with `#` are
    /// skipped, a missing count means 1.
    pub fn add_frequency_list(&mut self, reader: impl BufRead) -> Result<usize, DictionaryError> {
        let mut loaded = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let word = parts.next().unwrap_or_default();
            let count = match parts.next() {
                Some(raw) => raw.parse::<u64>().map_err(|_| DictionaryError::InvalidLine {
                    line: idx + 1,
                    content: line.clone(),
                })?,
                None => 1,
            };

            self.add_word(word, count);
            loaded += 1;
        }

        Ok(loaded)
    }

    /// Correct every token of a query and rejoin with single spaces.
    pub fn correct(&self, query: &str) -> String {
        query
            .split_whitespace()
            .map(|token| {
                self.correct_word(token)
                    .unwrap_or_else(|| token.to_string())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Return the best correction for an unknown word.
    ///
    /// `None` means the word is known, not checkable, or has no candidate;
    /// callers keep the original token in that case.
    pub fn correct_word(&self, word: &str) -> Option<String> {
        if self.max_distance == 0 || !Self::should_check(word) {
            return None;
        }

        let lowered = word.to_lowercase();
        if self.words.contains_key(&lowered) {
            return None;
        }

        let query: Vec<char> = lowered.chars().collect();
        let mut best: Option<(usize, u64, &str)> = None;

        for (candidate, &frequency) in &self.words {
            if self.stop_words.contains(candidate) {
                continue;
            }

            let candidate_len = candidate.chars().count();
            if candidate_len.abs_diff(query.len()) > self.max_distance {
                continue;
            }

            let candidate_chars: Vec<char> = candidate.chars().collect();
            let distance = osa_distance(&query, &candidate_chars);
            if distance > self.max_distance {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_distance, best_frequency, best_word)) => {
                    distance < best_distance
                        || (distance == best_distance && frequency > best_frequency)
                        || (distance == best_distance
                            && frequency == best_frequency
                            && candidate.as_str() < best_word)
                }
            };

            if better {
                best = Some((distance, frequency, candidate.as_str()));
            }
        }

        best.map(|(_, _, word)| word.to_string())
    }

    /// Tokens with digits, single punctuation marks and very long tokens are
    /// left alone.
    fn should_check(word: &str) -> bool {
        let len = word.chars().count();
        if len == 0 || len > MAX_TOKEN_LENGTH {
            return false;
        }
        if len == 1 && !word.chars().all(char::is_alphanumeric) {
            return false;
        }

        !word.chars().any(|c| c.is_ascii_digit())
    }
}

impl Default for SpellingCorrector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EDIT_DISTANCE)
    }
}

/// Optimal string alignment distance (Levenshtein plus adjacent transpositions).
fn osa_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let width = b.len() + 1;
    let mut rows = vec![0usize; (a.len() + 1) * width];
    for j in 0..=b.len() {
        rows[j] = j;
    }

    for i in 1..=a.len() {
        rows[i * width] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            let mut value = (rows[(i - 1) * width + j] + 1)
                .min(rows[i * width + j - 1] + 1)
                .min(rows[(i - 1) * width + j - 1] + cost);

            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                value = value.min(rows[(i - 2) * width + j - 2] + 1);
            }

            rows[i * width + j] = value;
        }
    }

    rows[a.len() * width + b.len()]
}

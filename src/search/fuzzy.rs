//! Token-set fuzzy matching.
//!
//! Scores two strings by their token overlap, ignoring token order and
//! duplicates. Both sides are pre-processed (lowercase, non-alphanumeric
//! characters replaced by spaces) and split into token sets. With
//! `sect` the sorted intersection and `a`/`b` the intersection followed by
//! each side's sorted remainder, the score is the best of
//! `ratio(sect, a)`, `ratio(sect, b)` and `ratio(a, b)`.
//!
//! `ratio` is the normalized indel similarity `2 * LCS / (|x| + |y|)`,
//! scaled to 0-100.

use std::collections::BTreeSet;

/// A scored choice returned by [`extract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyMatch {
    /// Position of the choice in the input slice
    pub index: usize,
    /// Token-set similarity (0 to 100)
    pub score: u8,
}

/// Pre-processed, deduplicated, sorted tokens of a string.
#[derive(Debug, Clone)]
struct TokenSet(BTreeSet<String>);

impl TokenSet {
    fn new(text: &str) -> Self {
        Self(full_process(text).split_whitespace().map(String::from).collect())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Score every choice against `query` and return the best `limit` matches.
///
/// Results are sorted by score (highest first); equal scores keep the order
/// of `choices`.
pub fn extract<S: AsRef<str>>(query: &str, choices: &[S], limit: usize) -> Vec<FuzzyMatch> {
    if limit == 0 {
        return vec![];
    }

    let query_tokens = TokenSet::new(query);
    if query_tokens.is_empty() {
        log::debug!("fuzzy query {query:?} is empty after processing");
    }

    let mut matches: Vec<FuzzyMatch> = choices
        .iter()
        .enumerate()
        .map(|(index, choice)| FuzzyMatch {
            index,
            score: token_set_score(&query_tokens, &TokenSet::new(choice.as_ref())),
        })
        .collect();

    // stable sort keeps choice order among ties
    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(limit);

    matches
}

/// Token-set similarity between two strings (0 to 100).
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set_score(&TokenSet::new(a), &TokenSet::new(b))
}

fn token_set_score(left: &TokenSet, right: &TokenSet) -> u8 {
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let intersection: Vec<&str> = left.0.intersection(&right.0).map(String::as_str).collect();
    let left_only: Vec<&str> = left.0.difference(&right.0).map(String::as_str).collect();
    let right_only: Vec<&str> = right.0.difference(&left.0).map(String::as_str).collect();

    let sect = intersection.join(" ");
    let combined_left = join_nonempty(&sect, &left_only.join(" "));
    let combined_right = join_nonempty(&sect, &right_only.join(" "));

    ratio(&sect, &combined_left)
        .max(ratio(&sect, &combined_right))
        .max(ratio(&combined_left, &combined_right))
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

/// Lowercase, replace non-alphanumeric characters with spaces, trim.
fn full_process(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Indel similarity ratio scaled to 0-100. Empty input scores 0.
fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = (a.len() + b.len()) as f64;
    let similarity = 2.0 * lcs_len(&a, &b) as f64 / total;

    (similarity * 100.0).round() as u8
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

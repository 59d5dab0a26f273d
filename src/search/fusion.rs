//! Result fusion for hybrid FAQ search.
//!
//! Merges fuzzy and semantic candidates into one ranked list:
//! - candidates are deduplicated by question text
//! - a question found by both paths keeps the slot where it first appeared,
//!   and its score is decided by the [`CollisionPolicy`]
//! - results are stable-sorted by score (highest first) and truncated

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A ranked FAQ entry returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub question: String,
    pub answer: String,
    /// Relevance in [0.0, 1.0], higher is better
    pub score: f32,
}

/// How to resolve a question returned by both the fuzzy and semantic paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The semantic result replaces the fuzzy one.
    #[default]
    PreferSemantic,
    /// The higher score wins; the fuzzy result is kept on a tie.
    PreferHigherScore,
}

/// Fuse fuzzy and semantic results.
///
/// # Arguments
/// * `fuzzy` - Fuzzy candidates, inserted first
/// * `semantic` - Semantic candidates, inserted second
/// * `top_k` - Maximum number of results to return
/// * `policy` - Collision rule for questions present in both lists
///
/// # Returns
/// Deduplicated results sorted by score (highest first). Equal scores keep
/// their insertion order.
pub fn fuse(
    fuzzy: Vec<SearchResult>,
    semantic: Vec<SearchResult>,
    top_k: usize,
    policy: CollisionPolicy,
) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = Vec::with_capacity(fuzzy.len() + semantic.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for result in fuzzy {
        insert(&mut merged, &mut slots, result, |_, _| true);
    }

    for result in semantic {
        insert(&mut merged, &mut slots, result, |existing, incoming| match policy {
            CollisionPolicy::PreferSemantic => true,
            CollisionPolicy::PreferHigherScore => incoming.score > existing.score,
        });
    }

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(top_k);

    merged
}

/// Insert a result, or replace the existing one for the same question when
/// `replace(existing, incoming)` says so.
fn insert(
    merged: &mut Vec<SearchResult>,
    slots: &mut HashMap<String, usize>,
    result: SearchResult,
    replace: impl Fn(&SearchResult, &SearchResult) -> bool,
) {
    match slots.get(&result.question) {
        Some(&slot) => {
            if replace(&merged[slot], &result) {
                merged[slot] = result;
            }
        }
        None => {
            slots.insert(result.question.clone(), merged.len());
            merged.push(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(question: &str, score: f32) -> SearchResult {
        SearchResult {
            question: question.to_string(),
            answer: format!("answer to {question}"),
            score,
        }
    }

    fn questions(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.question.as_str()).collect()
    }

    #[test]
    fn test_fuse_empty_inputs() {
        let results = fuse(vec![], vec![], 5, CollisionPolicy::default());
        assert!(results.is_empty());
    }

    #[test]
    fn test_fuse_sorts_descending() {
        let fuzzy = vec![result("a", 0.7), result("b", 0.9)];
        let semantic = vec![result("c", 0.8)];

        let results = fuse(fuzzy, semantic, 5, CollisionPolicy::PreferSemantic);
        assert_eq!(questions(&results), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_fuse_truncates_to_top_k() {
        let fuzzy = vec![result("a", 0.7), result("b", 0.9)];
        let semantic = vec![result("c", 0.8), result("d", 0.6)];

        let results = fuse(fuzzy, semantic, 2, CollisionPolicy::PreferSemantic);
        assert_eq!(questions(&results), vec!["b", "c"]);

        assert!(fuse(vec![result("a", 1.0)], vec![], 0, CollisionPolicy::default()).is_empty());
    }

    #[test]
    fn test_prefer_semantic_overwrites_fuzzy() {
        let fuzzy = vec![result("a", 0.9)];
        let semantic = vec![result("a", 0.6)];

        let results = fuse(fuzzy, semantic, 5, CollisionPolicy::PreferSemantic);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_prefer_higher_score_keeps_best() {
        let fuzzy = vec![result("a", 0.9), result("b", 0.6)];
        let semantic = vec![result("a", 0.6), result("b", 0.8)];

        let results = fuse(fuzzy, semantic, 5, CollisionPolicy::PreferHigherScore);
        assert_eq!(results.len(), 2);
        assert_eq!(questions(&results), vec!["a", "b"]);
        assert!((results[0].score - 0.9).abs() < f32::EPSILON);
        assert!((results[1].score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let fuzzy = vec![result("x", 0.7), result("y", 0.7)];
        let semantic = vec![result("z", 0.7)];

        let results = fuse(fuzzy, semantic, 5, CollisionPolicy::PreferSemantic);
        assert_eq!(questions(&results), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_collision_keeps_first_slot_for_ties() {
        // "y" is replaced by the semantic result but keeps its fuzzy slot
        let fuzzy = vec![result("x", 0.7), result("y", 0.9)];
        let semantic = vec![result("z", 0.7), result("y", 0.7)];

        let results = fuse(fuzzy, semantic, 5, CollisionPolicy::PreferSemantic);
        assert_eq!(questions(&results), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_later_fuzzy_duplicate_overwrites() {
        let fuzzy = vec![result("a", 0.8), result("a", 0.7)];

        let results = fuse(fuzzy, vec![], 5, CollisionPolicy::PreferHigherScore);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: CollisionPolicy = serde_json::from_str("\"prefer_higher_score\"").unwrap();
        assert_eq!(policy, CollisionPolicy::PreferHigherScore);
    }
}

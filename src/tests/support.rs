//! Shared fixtures: a small FAQ corpus and a deterministic embedder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::corpus::{Corpus, FaqEntry};
use crate::search::{Embedder, EmbeddingError, EngineOptions, FaqEngine, Normalizer};

pub const SAMPLE_CORPUS: &[(&str, &str)] = &[
    (
        "How do I reset my password?",
        "Go to settings > reset password.",
    ),
    (
        "How do I delete my account?",
        "Open settings, choose account and press delete.",
    ),
    (
        "Where can I find my invoices?",
        "Invoices are listed under billing.",
    ),
    (
        "How do I contact support?",
        "Write to the support team from the help page.",
    ),
    (
        "Can I change my email address?",
        "Yes, update it in your profile settings.",
    ),
];

pub fn sample_corpus() -> Corpus {
    Corpus::from_entries(SAMPLE_CORPUS.iter().map(|(question, answer)| FaqEntry {
        question: question.to_string(),
        answer: answer.to_string(),
    }))
}

/// Bag-of-words embedder over a fixed vocabulary.
///
/// Dimension `i` counts occurrences of vocabulary word `i`; the last
/// dimension counts unknown words. Identical normalized texts map to
/// identical vectors, unrelated texts end up far apart.
pub struct VocabularyEmbedder {
    vocabulary: HashMap<String, usize>,
    calls: Arc<AtomicUsize>,
    name: String,
}

impl VocabularyEmbedder {
    pub fn new<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        let mut vocabulary = HashMap::new();
        for word in words {
            let next = vocabulary.len();
            vocabulary.entry(word.to_string()).or_insert(next);
        }

        Self {
            vocabulary,
            calls: Arc::new(AtomicUsize::new(0)),
            name: "vocabulary".to_string(),
        }
    }

    /// Vocabulary made of the normalized sample questions.
    pub fn for_sample_corpus() -> Self {
        let normalizer = Normalizer::new();
        let normalized: Vec<String> = SAMPLE_CORPUS
            .iter()
            .map(|(question, _)| normalizer.normalize(question))
            .collect();

        Self::new(normalized.iter().flat_map(|q| q.split_whitespace()))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Counter of `embed_batch` calls, shared with clones of the handle.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let unknown = self.vocabulary.len();
        let mut vector = vec![0.0; unknown + 1];

        for word in text.split_whitespace() {
            let slot = self.vocabulary.get(word).copied().unwrap_or(unknown);
            vector[slot] += 1.0;
        }

        vector
    }
}

impl Embedder for VocabularyEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len() + 1
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

/// Engine over the sample corpus without an embedding cache.
pub fn sample_engine(embedder: VocabularyEmbedder) -> (FaqEngine, Arc<AtomicUsize>) {
    let calls = embedder.calls();
    let engine = FaqEngine::new(sample_corpus(), Box::new(embedder), EngineOptions::default())
        .expect("engine should build");

    (engine, calls)
}

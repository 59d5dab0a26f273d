//! Hybrid FAQ search engine.
//!
//! Built once from a corpus and an embedder, read-only afterwards:
//! - questions are normalized and embedded (or loaded from the embedding cache)
//! - a flat L2 index is built over the embedding matrix
//! - queries are spell-corrected, normalized, then matched by both the fuzzy
//!   and the semantic path before fusion

use std::path::PathBuf;

use crate::config::ScoringConfig;
use crate::corpus::Corpus;
use crate::search::embeddings::{Embedder, EmbeddingError};
use crate::search::fusion::{self, SearchResult};
use crate::search::fuzzy;
use crate::search::index::{self, FlatIndex, IndexError};
use crate::search::normalize::Normalizer;
use crate::search::spelling::{DictionaryError, SpellingCorrector, DEFAULT_MAX_EDIT_DISTANCE};
use crate::search::storage::{corpus_fingerprint, EmbeddingCache, EmbeddingCacheError};

/// Errors that can occur while building or querying the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Embedding cache error: {0}")]
    Cache(#[from] EmbeddingCacheError),

    #[error("Spelling dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
}

#[derive(Debug, Clone)]
pub struct SpellingOptions {
    pub enabled: bool,
    pub max_edit_distance: usize,
    /// Extra `word count` frequency list merged into the dictionary
    pub dictionary_path: Option<PathBuf>,
}

impl Default for SpellingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
            dictionary_path: None,
        }
    }
}

/// Everything the engine needs besides the corpus and the embedder.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub scoring: ScoringConfig,
    pub spelling: SpellingOptions,
    /// Embedding cache file. Embeddings are recomputed on every start when unset.
    pub cache_path: Option<PathBuf>,
    /// Discard an existing cache file and embed from scratch.
    pub rebuild_cache: bool,
}

pub struct FaqEngine {
    corpus: Corpus,
    normalized_questions: Vec<String>,
    normalizer: Normalizer,
    speller: Option<SpellingCorrector>,
    embedder: Box<dyn Embedder>,
    index: FlatIndex,
    scoring: ScoringConfig,
}

impl FaqEngine {
    /// Build the engine.
    ///
    /// Embeddings come from the cache when it matches the model and the
    /// normalized questions; otherwise they are computed in one batch and
    /// written back to the cache.
    pub fn new(
        corpus: Corpus,
        embedder: Box<dyn Embedder>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        if corpus.is_empty() {
            log::warn!("FAQ corpus is empty, every search will return no results");
        }

        let normalizer = Normalizer::new();
        let normalized_questions: Vec<String> = corpus
            .questions()
            .iter()
            .map(|q| normalizer.normalize(q))
            .collect();

        let speller = if options.spelling.enabled {
            Some(Self::build_speller(&corpus, &normalizer, &options.spelling)?)
        } else {
            None
        };

        let rows = match &options.cache_path {
            Some(path) => {
                let cache = EmbeddingCache::new(path.clone());
                if options.rebuild_cache && cache.exists() {
                    log::info!("Discarding embedding cache {}", path.display());
                    cache.delete()?;
                }
                Self::load_or_embed(&cache, embedder.as_ref(), &normalized_questions)?
            }
            None => embedder.embed_batch(&normalized_questions)?,
        };

        if rows.len() != corpus.len() {
            return Err(IndexError::RowCountMismatch {
                expected: corpus.len(),
                got: rows.len(),
            }
            .into());
        }

        let index = FlatIndex::build(embedder.dimensions(), rows)?;
        log::info!(
            "FAQ index ready: {} entries, {} dimensions",
            index.len(),
            index.dimensions()
        );

        Ok(Self {
            corpus,
            normalized_questions,
            normalizer,
            speller,
            embedder,
            index,
            scoring: options.scoring,
        })
    }

    fn build_speller(
        corpus: &Corpus,
        normalizer: &Normalizer,
        options: &SpellingOptions,
    ) -> Result<SpellingCorrector, EngineError> {
        let mut speller = SpellingCorrector::english(options.max_edit_distance)?;

        for (question, answer) in corpus.iter() {
            speller.add_text(question);
            speller.add_text(answer);
        }
        speller.add_stop_words(normalizer.stop_words());

        if let Some(path) = &options.dictionary_path {
            let loaded = speller.load_frequency_file(path)?;
            log::info!("Loaded {} dictionary entries from {}", loaded, path.display());
        }

        log::debug!("spelling dictionary has {} words", speller.len());
        Ok(speller)
    }

    fn load_or_embed(
        cache: &EmbeddingCache,
        embedder: &dyn Embedder,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EngineError> {
        let model_id = embedder.model_id();
        let fingerprint = corpus_fingerprint(texts);

        if cache.exists() {
            match cache.load(&model_id, &fingerprint) {
                Ok(cached) if cached.dimensions == embedder.dimensions() => {
                    log::info!(
                        "Loaded {} cached embeddings from {}",
                        cached.rows.len(),
                        cache.path().display()
                    );
                    return Ok(cached.rows);
                }
                Ok(cached) => {
                    log::warn!(
                        "Cached embeddings have {} dimensions, model produces {}, rebuilding",
                        cached.dimensions,
                        embedder.dimensions()
                    );
                }
                Err(e) if e.is_stale() => {
                    log::warn!("Embedding cache is stale ({e}), rebuilding");
                }
                Err(e) => return Err(e.into()),
            }
        }

        log::info!(
            "Embedding {} FAQ questions with {}",
            texts.len(),
            embedder.model_name()
        );
        let rows = embedder.embed_batch(texts)?;

        cache.save(embedder.dimensions(), &rows, &model_id, &fingerprint)?;
        log::info!("Saved embeddings to {}", cache.path().display());

        Ok(rows)
    }

    /// Spell-correct then normalize a raw query.
    pub(crate) fn preprocess_query(&self, query: &str) -> String {
        let corrected = match &self.speller {
            Some(speller) => speller.correct(query),
            None => query.to_string(),
        };
        let processed = self.normalizer.normalize(&corrected);
        log::debug!("query {query:?} -> corrected {corrected:?} -> processed {processed:?}");
        processed
    }

    /// Hybrid search: spelling correction, normalization, fuzzy and semantic
    /// matching, fusion.
    ///
    /// # Returns
    /// At most `top_k` results sorted by score (highest first). An empty list
    /// means nothing was relevant; errors mean the search could not run.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, EngineError> {
        if top_k == 0 {
            return Ok(vec![]);
        }

        let processed = self.preprocess_query(query);

        let fuzzy_results = self.fuzzy_candidates(&processed, top_k);
        let semantic_results = self.semantic_candidates(&processed, top_k)?;
        log::debug!(
            "{} fuzzy and {} semantic candidates",
            fuzzy_results.len(),
            semantic_results.len()
        );

        Ok(fusion::fuse(
            fuzzy_results,
            semantic_results,
            top_k,
            self.scoring.collision_policy,
        ))
    }

    fn fuzzy_candidates(&self, processed: &str, top_k: usize) -> Vec<SearchResult> {
        fuzzy::extract(processed, self.normalized_questions.as_slice(), top_k)
            .into_iter()
            .filter(|m| m.score > self.scoring.fuzzy_min_score)
            .filter_map(|m| self.result_at(m.index, f32::from(m.score) / 100.0))
            .collect()
    }

    fn semantic_candidates(
        &self,
        processed: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, EngineError> {
        if self.index.is_empty() {
            return Ok(vec![]);
        }

        let embedding = self.embedder.embed(processed)?;
        let (distances, positions) = self.index.query(&embedding, top_k)?;

        Ok(distances
            .into_iter()
            .zip(positions)
            .map(|(distance, position)| {
                (
                    index::distance_to_score(distance, self.scoring.distance_divisor),
                    position,
                )
            })
            .filter(|(score, _)| *score > self.scoring.semantic_min_score)
            .filter_map(|(score, position)| self.result_at(position, score))
            .collect())
    }

    fn result_at(&self, position: usize, score: f32) -> Option<SearchResult> {
        Some(SearchResult {
            question: self.corpus.question(position)?.to_string(),
            answer: self.corpus.answer(position)?.to_string(),
            score,
        })
    }

    /// Raw corpus questions resembling the raw query, best first.
    ///
    /// No correction or normalization is applied and no score is exposed.
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        fuzzy::extract(query, self.corpus.questions(), self.scoring.suggestion_limit)
            .into_iter()
            .filter(|m| m.score > self.scoring.suggestion_min_score)
            .filter_map(|m| self.corpus.question(m.index).map(String::from))
            .collect()
    }

    pub fn default_top_k(&self) -> usize {
        self.scoring.default_top_k
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::FaqEntry;

    /// One-hot embedder: every text maps to the same unit vector.
    struct Constant;

    impl Embedder for Constant {
        fn model_name(&self) -> &str {
            "constant"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Returns one row too few for the corpus.
    struct Short;

    impl Embedder for Short {
        fn model_name(&self) -> &str {
            "short"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn corpus() -> Corpus {
        Corpus::from_entries(vec![
            FaqEntry {
                question: "How do I reset my password?".to_string(),
                answer: "Go to settings > reset password.".to_string(),
            },
            FaqEntry {
                question: "How do I delete my account?".to_string(),
                answer: "Contact support.".to_string(),
            },
        ])
    }

    #[test]
    fn test_top_k_zero() {
        let engine = FaqEngine::new(corpus(), Box::new(Constant), EngineOptions::default()).unwrap();
        assert!(engine.search("reset password", 0).unwrap().is_empty());
    }

    #[test]
    fn test_row_count_mismatch() {
        let result = FaqEngine::new(corpus(), Box::new(Short), EngineOptions::default());
        assert!(matches!(
            result,
            Err(EngineError::Index(IndexError::RowCountMismatch {
                expected: 2,
                got: 1
            }))
        ));
    }

    #[test]
    fn test_empty_corpus() {
        let engine =
            FaqEngine::new(Corpus::default(), Box::new(Constant), EngineOptions::default()).unwrap();

        assert!(engine.is_empty());
        assert!(engine.search("anything", 5).unwrap().is_empty());
        assert!(engine.suggestions("anything").is_empty());
    }

    #[test]
    fn test_spelling_disabled_keeps_typos() {
        let options = EngineOptions {
            spelling: SpellingOptions {
                enabled: false,
                ..SpellingOptions::default()
            },
            ..EngineOptions::default()
        };
        let engine = FaqEngine::new(corpus(), Box::new(Constant), options).unwrap();

        assert!(engine.speller.is_none());
        assert_eq!(engine.preprocess_query("reset pasword"), "reset pasword");
    }

    #[test]
    fn test_spelling_enabled_corrects_typos() {
        let engine = FaqEngine::new(corpus(), Box::new(Constant), EngineOptions::default()).unwrap();
        assert_eq!(engine.preprocess_query("reset pasword"), "reset password");
    }

    #[test]
    fn test_content_words_survive_preprocessing() {
        let engine = FaqEngine::new(corpus(), Box::new(Constant), EngineOptions::default()).unwrap();

        assert_eq!(engine.preprocess_query("change my pin"), "change pin");
        assert_eq!(engine.preprocess_query("delete app"), "delete app");
        assert_eq!(engine.preprocess_query("password for wifi"), "password wifi");
        assert_eq!(engine.preprocess_query("cancel my plan"), "cancel plan");
        assert_eq!(engine.preprocess_query("enable 2fa"), "enable 2fa");
    }

    #[test]
    fn test_missing_dictionary_file() {
        let dir = tempfile::tempdir().unwrap();
        let options = EngineOptions {
            spelling: SpellingOptions {
                dictionary_path: Some(dir.path().join("missing.txt")),
                ..SpellingOptions::default()
            },
            ..EngineOptions::default()
        };

        let result = FaqEngine::new(corpus(), Box::new(Constant), options);
        assert!(matches!(result, Err(EngineError::Dictionary(_))));
    }

    #[test]
    fn test_suggestions_use_raw_questions() {
        let engine = FaqEngine::new(corpus(), Box::new(Constant), EngineOptions::default()).unwrap();

        let suggestions = engine.suggestions("reset my password");
        assert_eq!(suggestions.first().map(String::as_str), Some("How do I reset my password?"));
    }
}

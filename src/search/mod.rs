//! Hybrid FAQ search.
//!
//! # Architecture
//!
//! - `normalize`: Lowercasing, punctuation and stop-word removal
//! - `spelling`: Dictionary-based query spelling correction
//! - `fuzzy`: Token-set string similarity
//! - `embeddings`: Wraps fastembed for embedding generation
//! - `index`: Exact L2 nearest-neighbor index
//! - `storage`: Binary file I/O for the embedding cache
//! - `fusion`: Merges fuzzy and semantic candidates
//! - `engine`: The search facade tying the above together

pub mod embeddings;
mod engine;
mod fusion;
pub mod fuzzy;
mod index;
mod normalize;
mod spelling;
mod stopwords;
mod storage;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use engine::{EngineError, EngineOptions, FaqEngine, SpellingOptions};
pub use fusion::{fuse, CollisionPolicy, SearchResult};
pub use index::{distance_to_score, FlatIndex, IndexError};
pub use normalize::Normalizer;
pub use spelling::{DictionaryError, SpellingCorrector, DEFAULT_MAX_EDIT_DISTANCE};
pub use stopwords::ENGLISH_STOP_WORDS;
pub use storage::{corpus_fingerprint, CachedEmbeddings, EmbeddingCache, EmbeddingCacheError};

/// Default embedding model, the one the default scoring constants are tuned for
pub const DEFAULT_MODEL: &str = "all-mpnet-base-v2";

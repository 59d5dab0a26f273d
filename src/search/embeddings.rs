//! Embedding providers.
//!
//! The engine only talks to the [`Embedder`] trait. [`EmbeddingModel`] is the
//! fastembed-backed implementation used by the binary; tests plug in
//! lightweight deterministic embedders instead.

use fastembed::{InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Mutex;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Maps text to fixed-dimension dense vectors.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector for a given model.
pub trait Embedder: Send + Sync {
    /// Name of the underlying model, used to key the embedding cache.
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("No embedding returned".to_string()))
    }

    /// SHA256 hash of the model name for cache identification.
    fn model_id(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.model_name().as_bytes());
        hasher.finalize().into()
    }
}

/// fastembed sentence models selectable by name.
const SUPPORTED_MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    ("all-mpnet-base-v2", fastembed::EmbeddingModel::AllMpnetBaseV2),
    ("all-MiniLM-L6-v2", fastembed::EmbeddingModel::AllMiniLML6V2),
    ("all-MiniLM-L6-v2-q", fastembed::EmbeddingModel::AllMiniLML6V2Q),
    ("bge-small-en-v1.5", fastembed::EmbeddingModel::BGESmallENV15),
    ("bge-small-en-v1.5-q", fastembed::EmbeddingModel::BGESmallENV15Q),
    ("bge-base-en-v1.5", fastembed::EmbeddingModel::BGEBaseENV15),
    ("bge-base-en-v1.5-q", fastembed::EmbeddingModel::BGEBaseENV15Q),
    ("bge-large-en-v1.5", fastembed::EmbeddingModel::BGELargeENV15),
    ("bge-large-en-v1.5-q", fastembed::EmbeddingModel::BGELargeENV15Q),
];

/// fastembed `TextEmbedding` behind a Mutex, since its embed() takes &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load a model by name, downloading it into `models_dir` on first use.
    ///
    /// Names are matched ignoring case and punctuation, so
    /// `all-mpnet-base-v2` and `AllMpnetBaseV2` are the same model.
    pub fn new(
        model_name: &str,
        models_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        let variant = Self::resolve_model(model_name)?;

        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!(
                "cannot create models directory {}: {e}",
                models_dir.display()
            ))
        })?;

        log::info!(
            "Loading embedding model '{model_name}' from {}",
            models_dir.display()
        );

        let mut model = TextEmbedding::try_new(
            InitOptions::new(variant)
                .with_cache_dir(models_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        // fastembed does not expose the output size up front
        let dimensions = model
            .embed(vec!["sample sentence"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("test embedding failed: {e}")))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::InitFailed("model returned no embedding".to_string()))?;

        log::debug!("model '{model_name}' produces {dimensions}-dimensional vectors");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        let wanted = compact_name(name);

        SUPPORTED_MODELS
            .iter()
            .find(|(known, _)| compact_name(known) == wanted)
            .map(|(_, variant)| variant.clone())
            .ok_or_else(|| {
                let known: Vec<&str> = SUPPORTED_MODELS.iter().map(|(known, _)| *known).collect();
                EmbeddingError::InvalidModel(format!(
                    "{name}, supported models: {}",
                    known.join(", ")
                ))
            })
    }
}

fn compact_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Embedder for EmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

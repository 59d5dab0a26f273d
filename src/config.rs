use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::search::{
    CollisionPolicy, EngineOptions, SpellingOptions, DEFAULT_MAX_EDIT_DISTANCE, DEFAULT_MODEL,
};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_CORPUS_PATH: &str = "faqs.json";
const DEFAULT_CACHE_FILE: &str = "embeddings.bin";
const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Squared L2 distance mapped to a score of 0; 4.0 bounds unit-norm vectors
const DEFAULT_DISTANCE_DIVISOR: f32 = 4.0;
const DEFAULT_SEMANTIC_MIN_SCORE: f32 = 0.5;
const DEFAULT_FUZZY_MIN_SCORE: u8 = 60;
const DEFAULT_SUGGESTION_MIN_SCORE: u8 = 50;
const DEFAULT_SUGGESTION_LIMIT: usize = 5;
const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Embedding model and cache settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name for embeddings (e.g., "all-mpnet-base-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding cache file; relative paths resolve against the base path.
    /// No caching when unset.
    #[serde(default = "default_cache_file")]
    pub cache_file: Option<String>,

    #[serde(default)]
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_file: default_cache_file(),
            show_download_progress: false,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_cache_file() -> Option<String> {
    Some(DEFAULT_CACHE_FILE.to_string())
}

/// Relevance tuning. The defaults are calibrated for the default model's
/// distance distribution and need re-tuning when the model changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Semantic score is `1 - distance / distance_divisor`, clamped to [0, 1]
    #[serde(default = "default_distance_divisor")]
    pub distance_divisor: f32,

    /// Semantic candidates need a score strictly above this
    #[serde(default = "default_semantic_min_score")]
    pub semantic_min_score: f32,

    /// Fuzzy candidates need a token-set score (0-100) strictly above this
    #[serde(default = "default_fuzzy_min_score")]
    pub fuzzy_min_score: u8,

    #[serde(default = "default_suggestion_min_score")]
    pub suggestion_min_score: u8,

    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_divisor: DEFAULT_DISTANCE_DIVISOR,
            semantic_min_score: DEFAULT_SEMANTIC_MIN_SCORE,
            fuzzy_min_score: DEFAULT_FUZZY_MIN_SCORE,
            suggestion_min_score: DEFAULT_SUGGESTION_MIN_SCORE,
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            default_top_k: DEFAULT_TOP_K,
            collision_policy: CollisionPolicy::default(),
        }
    }
}

fn default_distance_divisor() -> f32 {
    DEFAULT_DISTANCE_DIVISOR
}

fn default_semantic_min_score() -> f32 {
    DEFAULT_SEMANTIC_MIN_SCORE
}

fn default_fuzzy_min_score() -> u8 {
    DEFAULT_FUZZY_MIN_SCORE
}

fn default_suggestion_min_score() -> u8 {
    DEFAULT_SUGGESTION_MIN_SCORE
}

fn default_suggestion_limit() -> usize {
    DEFAULT_SUGGESTION_LIMIT
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpellingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,

    /// Optional `word count` frequency list merged into the dictionary
    #[serde(default)]
    pub dictionary_path: Option<String>,
}

impl Default for SpellingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_edit_distance: DEFAULT_MAX_EDIT_DISTANCE,
            dictionary_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_edit_distance() -> usize {
    DEFAULT_MAX_EDIT_DISTANCE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Categorized FAQ JSON file; relative paths resolve against the base path
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub spelling: SpellingConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            embedding: EmbeddingConfig::default(),
            scoring: ScoringConfig::default(),
            spelling: SpellingConfig::default(),
            server: ServerConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_corpus_path() -> String {
    DEFAULT_CORPUS_PATH.to_string()
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let scoring = &self.scoring;

        if scoring.distance_divisor.is_nan() || scoring.distance_divisor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scoring.distance_divisor must be greater than 0, got {}",
                scoring.distance_divisor
            )));
        }

        if !(0.0..=1.0).contains(&scoring.semantic_min_score) {
            return Err(ConfigError::Invalid(format!(
                "scoring.semantic_min_score must be between 0.0 and 1.0, got {}",
                scoring.semantic_min_score
            )));
        }

        for (name, value) in [
            ("fuzzy_min_score", scoring.fuzzy_min_score),
            ("suggestion_min_score", scoring.suggestion_min_score),
        ] {
            if value > 100 {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be between 0 and 100, got {value}"
                )));
            }
        }

        if scoring.suggestion_limit == 0 {
            return Err(ConfigError::Invalid(
                "scoring.suggestion_limit must be greater than 0".to_string(),
            ));
        }

        if scoring.default_top_k == 0 {
            return Err(ConfigError::Invalid(
                "scoring.default_top_k must be greater than 0".to_string(),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::Invalid("embedding.model is empty".to_string()));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults first if it
    /// does not exist yet.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        let path = base_path.join(CONFIG_FILE);
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };

        // create new if does not exist
        if !path.exists() {
            std::fs::create_dir_all(base_path).map_err(io_err)?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?).map_err(io_err)?;
            log::info!("Created default config at {}", path.display());
        }

        let config_str = std::fs::read_to_string(&path).map_err(io_err)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.base_path.join(CONFIG_FILE);
        let config_str = serde_yml::to_string(&self)?;

        std::fs::write(&path, config_str).map_err(|source| ConfigError::Io { path, source })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a configured path against the base path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.resolve(&self.corpus_path)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_path.join("models")
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            scoring: self.scoring.clone(),
            spelling: SpellingOptions {
                enabled: self.spelling.enabled,
                max_edit_distance: self.spelling.max_edit_distance,
                dictionary_path: self
                    .spelling
                    .dictionary_path
                    .as_ref()
                    .map(|p| self.resolve(p)),
            },
            cache_path: self.embedding.cache_file.as_ref().map(|p| self.resolve(p)),
            rebuild_cache: false,
        }
    }
}

/// `FAQ_SEARCH_BASE_PATH`, or `~/.local/share/faq-search`.
pub fn default_base_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("FAQ_SEARCH_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home = homedir::my_home()
        .map_err(|e| ConfigError::Invalid(format!("failed to get home directory: {e}")))?
        .ok_or_else(|| ConfigError::Invalid("home directory not found".to_string()))?;

    Ok(home.join(".local/share/faq-search"))
}

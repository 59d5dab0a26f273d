//! FAQ corpus loading.
//!
//! The source document is a JSON object mapping category names to lists of
//! `{question, answer}` entries. Categories are flattened away in document
//! order; the resulting position of an entry is its identity everywhere else
//! (normalized questions, embedding rows, index positions).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed corpus JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Corpus must be a JSON object of categories")]
    NotAnObject,

    #[error("Malformed entries in category {category:?}: {source}")]
    InvalidCategory {
        category: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable, flattened FAQ corpus stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    questions: Vec<String>,
    answers: Vec<String>,
}

impl Corpus {
    /// Load and flatten a categorized corpus file.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let corpus = Self::from_json_str(&content)?;
        log::info!(
            "Loaded {} FAQ entries from {}",
            corpus.len(),
            path.display()
        );

        Ok(corpus)
    }

    /// Parse a categorized corpus from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, CorpusError> {
        let value: Value = serde_json::from_str(content)?;
        let categories = match value {
            Value::Object(map) => map,
            _ => return Err(CorpusError::NotAnObject),
        };

        Self::from_categories(categories)
    }

    fn from_categories(categories: Map<String, Value>) -> Result<Self, CorpusError> {
        let mut entries = Vec::new();

        for (category, value) in categories {
            let mut category_entries: Vec<FaqEntry> = serde_json::from_value(value)
                .map_err(|source| CorpusError::InvalidCategory {
                    category: category.clone(),
                    source,
                })?;
            log::debug!("category {category:?}: {} entries", category_entries.len());
            entries.append(&mut category_entries);
        }

        Ok(Self::from_entries(entries))
    }

    /// Build a corpus from already flattened entries.
    pub fn from_entries(entries: impl IntoIterator<Item = FaqEntry>) -> Self {
        let (questions, answers) = entries
            .into_iter()
            .map(|entry| (entry.question, entry.answer))
            .unzip();

        Self { questions, answers }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn question(&self, position: usize) -> Option<&str> {
        self.questions.get(position).map(String::as_str)
    }

    pub fn answer(&self, position: usize) -> Option<&str> {
        self.answers.get(position).map(String::as_str)
    }

    /// Iterate over `(question, answer)` pairs in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.questions
            .iter()
            .zip(self.answers.iter())
            .map(|(q, a)| (q.as_str(), a.as_str()))
    }
}

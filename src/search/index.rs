//! Exact (flat) nearest-neighbor index over corpus embeddings.
//!
//! Rows are stored contiguously, row `i` aligned with corpus entry `i`.
//! Queries compute the squared L2 distance to every row (brute force), which
//! is plenty for FAQ-sized corpora.

/// Flat L2 vector index.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    /// Row-major embedding matrix
    data: Vec<f32>,
    /// Embedding dimensions
    dimensions: usize,
    /// Number of rows
    len: usize,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Row count mismatch: corpus has {expected} entries, embedding matrix has {got} rows")]
    RowCountMismatch { expected: usize, got: usize },

    #[error("Index dimensions must be greater than 0")]
    ZeroDimensions,
}

impl FlatIndex {
    /// Build an index from an embedding matrix.
    ///
    /// Every row must have exactly `dimensions` values.
    pub fn build(dimensions: usize, matrix: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if dimensions == 0 {
            return Err(IndexError::ZeroDimensions);
        }

        let len = matrix.len();
        let mut data = Vec::with_capacity(len * dimensions);

        for row in matrix {
            if row.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: row.len(),
                });
            }
            data.extend_from_slice(&row);
        }

        Ok(Self {
            data,
            dimensions,
            len,
        })
    }

    /// Get the embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of rows in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the `k` nearest rows to `vector`.
    ///
    /// # Returns
    /// `(distances, positions)`, both of length `min(k, len)`, ordered by
    /// ascending squared L2 distance. Equal distances are ordered by position.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<(Vec<f32>, Vec<usize>), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, row)| (squared_l2(vector, row), position))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored.into_iter().unzip())
    }
}

/// Squared Euclidean distance between two vectors of equal length.
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Convert a squared L2 distance into a relevance score in [0, 1].
///
/// `divisor` is the largest distance the embedding model produces in
/// practice; 4.0 is the bound for unit-norm vectors.
pub fn distance_to_score(distance: f32, divisor: f32) -> f32 {
    (1.0 - distance / divisor).clamp(0.0, 1.0)
}

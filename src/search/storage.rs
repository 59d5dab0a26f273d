//! Binary cache for the corpus embedding matrix.
//!
//! File format: embeddings.bin
//!
//! Header (79 bytes):
//! - version: u8 (1)
//! - model_id: [u8; 32] (SHA256 hash of model name)
//! - fingerprint: [u8; 32] (SHA256 of the embedded texts, see [`corpus_fingerprint`])
//! - dimensions: u16 (little-endian)
//! - row_count: u64 (little-endian)
//! - checksum: u32 (CRC32 of header fields before checksum)
//!
//! Rows (repeated `row_count` times, row `i` aligned with corpus entry `i`):
//! - embedding: [f32; dimensions] (little-endian)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Current file format version
const FORMAT_VERSION: u8 = 1;

/// Header size in bytes: version(1) + model_id(32) + fingerprint(32) + dimensions(2) + row_count(8) + checksum(4)
const HEADER_SIZE: usize = 79;

/// Offset of the checksum field
const CHECKSUM_OFFSET: usize = 75;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Fingerprint mismatch: corpus changed since embeddings were cached")]
    FingerprintMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,

    #[error("Truncated file: expected {expected} rows")]
    Truncated { expected: u64 },
}

impl EmbeddingCacheError {
    /// Whether the cache is merely outdated or damaged, so embeddings
    /// should be recomputed rather than failing.
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Embedding matrix loaded from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbeddings {
    pub dimensions: usize,
    pub rows: Vec<Vec<f32>>,
}

/// Storage manager for the cached embedding matrix.
pub struct EmbeddingCache {
    path: PathBuf,
}

impl EmbeddingCache {
    /// Create a new cache manager for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the cache file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the embedding matrix.
    ///
    /// # Arguments
    /// * `expected_model_id` - SHA256 hash of the current model name
    /// * `expected_fingerprint` - Fingerprint of the current corpus texts
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_fingerprint: &[u8; 32],
    ) -> Result<CachedEmbeddings, EmbeddingCacheError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);

        let header = Self::read_header(&mut reader)?;

        if header.model_id != *expected_model_id {
            return Err(EmbeddingCacheError::ModelMismatch);
        }
        if header.fingerprint != *expected_fingerprint {
            return Err(EmbeddingCacheError::FingerprintMismatch);
        }

        let dimensions = header.dimensions as usize;
        let mut rows = Vec::with_capacity(header.row_count as usize);

        for _ in 0..header.row_count {
            let row = Self::read_row(&mut reader, dimensions).map_err(|e| match e {
                EmbeddingCacheError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    EmbeddingCacheError::Truncated {
                        expected: header.row_count,
                    }
                }
                other => other,
            })?;
            rows.push(row);
        }

        Ok(CachedEmbeddings { dimensions, rows })
    }

    /// Save the embedding matrix.
    ///
    /// Uses atomic write: temp file -> fsync -> rename
    pub fn save(
        &self,
        dimensions: usize,
        rows: &[Vec<f32>],
        model_id: &[u8; 32],
        fingerprint: &[u8; 32],
    ) -> Result<(), EmbeddingCacheError> {
        let dimensions = u16::try_from(dimensions).map_err(|_| {
            EmbeddingCacheError::InvalidFormat(format!(
                "{dimensions} dimensions do not fit the header"
            ))
        })?;

        if let Some(row) = rows.iter().find(|row| row.len() != dimensions as usize) {
            return Err(EmbeddingCacheError::InvalidFormat(format!(
                "row has {} values, expected {}",
                row.len(),
                dimensions
            )));
        }

        let temp_path = self.path.with_extension("tmp");

        let header = Header {
            version: FORMAT_VERSION,
            model_id: *model_id,
            fingerprint: *fingerprint,
            dimensions,
            row_count: rows.len() as u64,
        };

        let result = Self::write_to_file(&temp_path, &header, rows);

        if result.is_err() {
            // Clean up temp file on error
            let _ = std::fs::remove_file(&temp_path);
            return result;
        }

        std::fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Delete the cache file if it exists.
    pub fn delete(&self) -> Result<(), EmbeddingCacheError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn write_to_file(
        path: &Path,
        header: &Header,
        rows: &[Vec<f32>],
    ) -> Result<(), EmbeddingCacheError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&header.to_bytes())?;

        for row in rows {
            for &value in row {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        // Flush and sync
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok(())
    }

    fn read_header(reader: &mut impl Read) -> Result<Header, EmbeddingCacheError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                EmbeddingCacheError::InvalidFormat("file shorter than header".to_string())
            } else {
                e.into()
            }
        })?;

        let version = header_bytes[0];

        // Version check first
        if version != FORMAT_VERSION {
            return Err(EmbeddingCacheError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32::from_le_bytes([
            header_bytes[CHECKSUM_OFFSET],
            header_bytes[CHECKSUM_OFFSET + 1],
            header_bytes[CHECKSUM_OFFSET + 2],
            header_bytes[CHECKSUM_OFFSET + 3],
        ]);

        // Verify checksum (computed over header without checksum field)
        if stored_checksum != crc32fast::hash(&header_bytes[..CHECKSUM_OFFSET]) {
            return Err(EmbeddingCacheError::ChecksumMismatch);
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&header_bytes[1..33]);

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&header_bytes[33..65]);

        let dimensions = u16::from_le_bytes([header_bytes[65], header_bytes[66]]);

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header_bytes[67..75]);
        let row_count = u64::from_le_bytes(count_bytes);

        Ok(Header {
            version,
            model_id,
            fingerprint,
            dimensions,
            row_count,
        })
    }

    fn read_row(reader: &mut impl Read, dimensions: usize) -> Result<Vec<f32>, EmbeddingCacheError> {
        let mut bytes = vec![0u8; dimensions * 4];
        reader.read_exact(&mut bytes)?;

        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

/// Fingerprint the exact texts that were embedded.
///
/// Any change to the corpus questions, their order, or the normalization
/// that produced them yields a different fingerprint.
pub fn corpus_fingerprint(texts: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((texts.len() as u64).to_le_bytes());
    for text in texts {
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().into()
}

/// File header structure.
#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    fingerprint: [u8; 32],
    dimensions: u16,
    row_count: u64,
}

impl Header {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut header_bytes = [0u8; HEADER_SIZE];

        header_bytes[0] = self.version;
        header_bytes[1..33].copy_from_slice(&self.model_id);
        header_bytes[33..65].copy_from_slice(&self.fingerprint);
        header_bytes[65..67].copy_from_slice(&self.dimensions.to_le_bytes());
        header_bytes[67..75].copy_from_slice(&self.row_count.to_le_bytes());

        let checksum = crc32fast::hash(&header_bytes[..CHECKSUM_OFFSET]);
        header_bytes[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_le_bytes());

        header_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};

    fn test_model_id() -> [u8; 32] {
        let mut id = [0u8; 32];
        id[0] = 0xAB;
        id[31] = 0xCD;
        id
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn rows() -> Vec<Vec<f32>> {
        vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.25, -0.5, 2.0]]
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));
        let fingerprint = corpus_fingerprint(&texts(&["a", "b", "c"]));

        cache.save(3, &rows(), &test_model_id(), &fingerprint).unwrap();
        assert!(cache.exists());

        let loaded = cache.load(&test_model_id(), &fingerprint).unwrap();
        assert_eq!(loaded.dimensions, 3);
        assert_eq!(loaded.rows, rows());

        let size = std::fs::metadata(cache.path()).unwrap().len();
        assert_eq!(size, (HEADER_SIZE + 3 * 3 * 4) as u64);
    }

    #[test]
    fn test_save_and_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));
        let fingerprint = corpus_fingerprint(&[]);

        cache.save(768, &[], &test_model_id(), &fingerprint).unwrap();

        let loaded = cache.load(&test_model_id(), &fingerprint).unwrap();
        assert_eq!(loaded.dimensions, 768);
        assert!(loaded.rows.is_empty());
    }

    #[test]
    fn test_model_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));
        let fingerprint = corpus_fingerprint(&texts(&["a"]));
        cache.save(3, &rows()[..1], &test_model_id(), &fingerprint).unwrap();

        let mut wrong_model_id = [0u8; 32];
        wrong_model_id[0] = 0xFF;

        let result = cache.load(&wrong_model_id, &fingerprint);
        assert!(matches!(result, Err(EmbeddingCacheError::ModelMismatch)));
    }

    #[test]
    fn test_fingerprint_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));
        let fingerprint = corpus_fingerprint(&texts(&["reset password"]));
        cache.save(3, &rows()[..1], &test_model_id(), &fingerprint).unwrap();

        let changed = corpus_fingerprint(&texts(&["change email"]));
        let result = cache.load(&test_model_id(), &changed);
        assert!(matches!(result, Err(EmbeddingCacheError::FingerprintMismatch)));
        assert!(result.unwrap_err().is_stale());
    }

    #[test]
    fn test_fingerprint_sensitive_to_order_and_boundaries() {
        let a = corpus_fingerprint(&texts(&["ab", "c"]));
        let b = corpus_fingerprint(&texts(&["a", "bc"]));
        let c = corpus_fingerprint(&texts(&["c", "ab"]));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, corpus_fingerprint(&texts(&["ab", "c"])));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        let cache = EmbeddingCache::new(path.clone());
        let fingerprint = corpus_fingerprint(&texts(&["a", "b", "c"]));
        cache.save(3, &rows(), &test_model_id(), &fingerprint).unwrap();

        // Corrupt the dimensions field
        let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(65)).unwrap();
        file.write_all(&[0xFF]).unwrap();

        let result = cache.load(&test_model_id(), &fingerprint);
        assert!(matches!(result, Err(EmbeddingCacheError::ChecksumMismatch)));
    }

    #[test]
    fn test_truncated_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        let cache = EmbeddingCache::new(path.clone());
        let fingerprint = corpus_fingerprint(&texts(&["a", "b", "c"]));
        cache.save(3, &rows(), &test_model_id(), &fingerprint).unwrap();

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len((HEADER_SIZE + 4 * 4) as u64).unwrap();

        let result = cache.load(&test_model_id(), &fingerprint);
        assert!(matches!(
            result,
            Err(EmbeddingCacheError::Truncated { expected: 3 })
        ));
    }

    #[test]
    fn test_short_file_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        std::fs::write(&path, [FORMAT_VERSION, 1, 2, 3]).unwrap();

        let cache = EmbeddingCache::new(path);
        let result = cache.load(&test_model_id(), &[0u8; 32]);
        assert!(matches!(result, Err(EmbeddingCacheError::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_file_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("missing.bin"));

        let err = cache.load(&test_model_id(), &[0u8; 32]).unwrap_err();
        assert!(matches!(err, EmbeddingCacheError::Io(_)));
        assert!(!err.is_stale());
    }

    #[test]
    fn test_version_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.bin");
        std::fs::write(&path, [FORMAT_VERSION + 1; HEADER_SIZE]).unwrap();

        let cache = EmbeddingCache::new(path);
        let result = cache.load(&test_model_id(), &[0u8; 32]);
        assert!(matches!(
            result,
            Err(EmbeddingCacheError::VersionMismatch(2, 1))
        ));
    }

    #[test]
    fn test_save_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));

        let result = cache.save(3, &[vec![1.0, 2.0]], &test_model_id(), &[0u8; 32]);
        assert!(matches!(result, Err(EmbeddingCacheError::InvalidFormat(_))));
        assert!(!cache.exists());
    }

    #[test]
    fn test_atomic_write_cleans_up_on_error() {
        let path = PathBuf::from("/nonexistent/directory/embeddings.bin");
        let cache = EmbeddingCache::new(path.clone());

        let result = cache.save(3, &rows(), &test_model_id(), &[0u8; 32]);

        assert!(result.is_err());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::new(dir.path().join("embeddings.bin"));
        cache.save(3, &rows(), &test_model_id(), &[0u8; 32]).unwrap();
        assert!(cache.exists());

        cache.delete().unwrap();
        assert!(!cache.exists());
    }
}

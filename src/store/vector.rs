//! Flat L2 similarity index and its on-disk layout
//!
//! The index is exhaustive (no hierarchy): search compares the query with
//! every stored row. It is persisted as a small binary file next to a JSON
//! array of chunk texts; row *i* of the index always belongs to text *i*.
//!
//! Binary layout (little-endian):
//! `magic[8] | version u32 | dimension u64 | count u64 | count*dimension f32`

use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::{Result, ScopeError};

const MAGIC: &[u8; 8] = b"SGFLATL2";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 8 + 8;

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub row: usize,
    /// Squared L2 distance
    pub distance: f32,
}

/// A search hit resolved to its chunk text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub row: usize,
    pub distance: f32,
    pub text: String,
}

/// Exhaustive L2-distance index over fixed-length vectors
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Append vectors; every vector must match the index dimension
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for (i, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(ScopeError::Index(format!(
                    "vector {} has dimension {}, index expects {}",
                    i,
                    vector.len(),
                    self.dimension
                )));
            }
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored vector at `row`
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// The `k` rows closest to `query`, nearest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(ScopeError::Index(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<SearchHit> = (0..self.len())
            .filter_map(|row| {
                self.vector(row).map(|v| SearchHit {
                    row,
                    distance: squared_l2(v, query),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.row.cmp(&b.row))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize to the binary layout
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.data.len() * 4);
        buf.put_slice(MAGIC);
        buf.put_u32_le(FORMAT_VERSION);
        buf.put_u64_le(self.dimension as u64);
        buf.put_u64_le(self.len() as u64);
        for value in &self.data {
            buf.put_f32_le(*value);
        }
        buf
    }

    /// Parse the binary layout
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            return Err(ScopeError::Index("not a scopegen flat index".to_string()));
        }
        bytes.advance(8);

        let version = bytes.get_u32_le();
        if version != FORMAT_VERSION {
            return Err(ScopeError::Index(format!(
                "unsupported index version {}",
                version
            )));
        }

        let dimension = bytes.get_u64_le() as usize;
        let count = bytes.get_u64_le() as usize;
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| ScopeError::Index("index header overflows".to_string()))?;

        if bytes.remaining() != expected {
            return Err(ScopeError::Index(format!(
                "index body has {} bytes, header promises {}",
                bytes.remaining(),
                expected
            )));
        }

        let mut data = Vec::with_capacity(count * dimension);
        while bytes.has_remaining() {
            data.push(bytes.get_f32_le());
        }

        Ok(Self { dimension, data })
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index file plus parallel chunk-text file
#[derive(Debug, Clone)]
pub struct VectorStore {
    index_path: PathBuf,
    texts_path: PathBuf,
}

impl VectorStore {
    pub fn new(index_path: impl Into<PathBuf>, texts_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            texts_path: texts_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.index_path(), config.texts_path())
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn texts_path(&self) -> &Path {
        &self.texts_path
    }

    /// Persist the index and its texts, replacing whatever was there
    pub fn save(&self, index: &FlatL2Index, texts: &[String]) -> Result<()> {
        if index.len() != texts.len() {
            return Err(ScopeError::Index(format!(
                "index has {} rows but {} texts were given",
                index.len(),
                texts.len()
            )));
        }

        for path in [&self.index_path, &self.texts_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        index.write_to(&self.index_path)?;
        std::fs::write(&self.texts_path, serde_json::to_string(texts)?)?;
        Ok(())
    }

    /// Load the index and texts, checking that they line up
    pub fn load(&self) -> Result<(FlatL2Index, Vec<String>)> {
        let index = FlatL2Index::read_from(&self.index_path)?;
        let texts: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&self.texts_path)?)?;

        if index.len() != texts.len() {
            return Err(ScopeError::Index(format!(
                "{} has {} rows but {} has {} texts",
                self.index_path.display(),
                index.len(),
                self.texts_path.display(),
                texts.len()
            )));
        }
        Ok((index, texts))
    }

    /// Nearest chunks to `query` from the persisted index
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let (index, texts) = self.load()?;
        Ok(index
            .search(query, k)?
            .into_iter()
            .map(|hit| RetrievedChunk {
                row: hit.row,
                distance: hit.distance,
                text: texts[hit.row].clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatL2Index {
        let mut index = FlatL2Index::new(2);
        index
            .add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]])
            .unwrap();
        index
    }

    #[test]
    fn test_add_and_len() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.vector(1), Some(&[0.0, 1.0][..]));
        assert!(index.vector(3).is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = FlatL2Index::new(3);
        assert!(index.add(&[vec![1.0, 2.0]]).is_err());
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = sample_index();
        let hits = index.search(&[0.9, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, 0);
        assert_eq!(hits[1].row, 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let index = sample_index();
        let decoded = FlatL2Index::from_bytes(&index.to_bytes()).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn test_rejects_truncated_file() {
        let bytes = sample_index().to_bytes();
        assert!(FlatL2Index::from_bytes(&bytes[..bytes.len() - 2]).is_err());
        assert!(FlatL2Index::from_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_store_save_load_keeps_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(
            dir.path().join("vector_store/index.faiss"),
            dir.path().join("vector_store/texts.json"),
        );
        let texts = vec!["east".to_string(), "north".to_string(), "north-east".to_string()];

        store.save(&sample_index(), &texts).unwrap();
        let (index, loaded) = store.load().unwrap();
        assert_eq!(index.len(), loaded.len());
        assert_eq!(loaded, texts);

        let hits = store.query(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].text, "north");
    }

    #[test]
    fn test_store_rejects_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().join("i.bin"), dir.path().join("t.json"));
        let err = store.save(&sample_index(), &["only one".to_string()]).unwrap_err();
        assert!(matches!(err, ScopeError::Index(_)));
    }

    #[test]
    fn test_save_overwrites_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::new(dir.path().join("i.bin"), dir.path().join("t.json"));
        store
            .save(&sample_index(), &["a".into(), "b".into(), "c".into()])
            .unwrap();

        let mut smaller = FlatL2Index::new(2);
        smaller.add(&[vec![0.5, 0.5]]).unwrap();
        store.save(&smaller, &["only".into()]).unwrap();

        let (index, texts) = store.load().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(texts, vec!["only".to_string()]);
    }
}

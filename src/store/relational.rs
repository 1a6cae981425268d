//! Relational sink for chunks and reference scope tables (SQLite)

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::errors::{Result, ScopeError};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS document_chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        chunk_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sample_scope_examples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        example_name TEXT NOT NULL,
        scope_table TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_document_chunks_file ON document_chunks(file_name);
"#;

/// A persisted chunk row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub file_name: String,
    /// 1-based chunk ordinal
    pub page_number: i64,
    pub chunk_text: String,
}

/// A persisted reference scope table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleScope {
    pub id: i64,
    pub example_name: String,
    pub scope_table: String,
    pub created_at: String,
}

/// SQLite-backed chunk store
pub struct ChunkStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> ScopeError + '_ {
    move |e| ScopeError::Storage(format!("{}: {}", context, e))
}

impl ChunkStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScopeError::Storage(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(storage_err("Failed to open database"))?;
        Self::init(conn, Some(db_path.to_path_buf()))
    }

    /// Throwaway in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(storage_err("Failed to open database"))?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(storage_err("Failed to create schema"))?;
        Ok(Self { conn, db_path })
    }

    /// Insert one row per chunk in a single transaction. Returns rows written.
    pub fn store_chunks(&mut self, file_name: &str, chunks: &[Chunk]) -> Result<usize> {
        let created_at = chrono::Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction()
            .map_err(storage_err("Failed to begin transaction"))?;

        for chunk in chunks {
            tx.execute(
                "INSERT INTO document_chunks (file_name, page_number, chunk_text, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    file_name,
                    chunk.index as i64,
                    clean_chunk_text(&chunk.text),
                    created_at
                ],
            )
            .map_err(storage_err("Failed to insert chunk"))?;
        }

        tx.commit().map_err(storage_err("Failed to commit chunks"))?;
        Ok(chunks.len())
    }

    /// Chunk rows stored for a file, in ordinal order
    pub fn chunks_for(&self, file_name: &str) -> Result<Vec<StoredChunk>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT file_name, page_number, chunk_text FROM document_chunks
                 WHERE file_name = ?1 ORDER BY page_number, id",
            )
            .map_err(storage_err("Failed to query chunks"))?;

        let rows = stmt
            .query_map(params![file_name], |row| {
                Ok(StoredChunk {
                    file_name: row.get(0)?,
                    page_number: row.get(1)?,
                    chunk_text: row.get(2)?,
                })
            })
            .map_err(storage_err("Failed to query chunks"))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("Failed to read chunk row"))
    }

    /// Number of chunk rows stored for a file
    pub fn chunk_count(&self, file_name: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM document_chunks WHERE file_name = ?1",
                params![file_name],
                |row| row.get(0),
            )
            .map_err(storage_err("Failed to count chunks"))?;
        Ok(count as usize)
    }

    /// Store a reference scope table as serialized JSON text
    pub fn store_sample_scope(&self, example_name: &str, scope_json: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO sample_scope_examples (example_name, scope_table, created_at)
                 VALUES (?1, ?2, ?3)",
                params![example_name, scope_json, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(storage_err("Failed to insert sample scope"))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All stored reference scope tables, oldest first
    pub fn sample_scopes(&self) -> Result<Vec<SampleScope>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, example_name, scope_table, created_at
                 FROM sample_scope_examples ORDER BY id",
            )
            .map_err(storage_err("Failed to query sample scopes"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SampleScope {
                    id: row.get(0)?,
                    example_name: row.get(1)?,
                    scope_table: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(storage_err("Failed to query sample scopes"))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err("Failed to read sample scope row"))
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

/// Strip characters that commonly break text columns (NUL, U+FFFD) and trim
pub fn clean_chunk_text(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0' && *c != '\u{FFFD}')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            start: 0,
            end: text.len(),
        }
    }

    #[test]
    fn test_store_chunks_contiguous_ordinals() {
        let mut store = ChunkStore::in_memory().unwrap();
        let chunks = vec![chunk(1, "alpha"), chunk(2, " beta\u{0} "), chunk(3, "gamma")];

        assert_eq!(store.store_chunks("reqs.docx", &chunks).unwrap(), 3);

        let rows = store.chunks_for("reqs.docx").unwrap();
        let ordinals: Vec<i64> = rows.iter().map(|r| r.page_number).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(rows[1].chunk_text, "beta");
        assert!(store.chunks_for("other.pdf").unwrap().is_empty());
        assert_eq!(store.chunk_count("reqs.docx").unwrap(), 3);
        assert_eq!(store.chunk_count("other.pdf").unwrap(), 0);
    }

    #[test]
    fn test_sample_scope_roundtrip() {
        let store = ChunkStore::in_memory().unwrap();
        let id = store
            .store_sample_scope("hr-payroll", r#"{"scope_of_work": []}"#)
            .unwrap();

        let samples = store.sample_scopes().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].id, id);
        assert_eq!(samples[0].example_name, "hr-payroll");
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("scope.db");

        let mut store = ChunkStore::open(&path).unwrap();
        store.store_chunks("a.txt", &[chunk(1, "x")]).unwrap();
        assert!(path.exists());
        assert_eq!(store.db_path(), Some(path.as_path()));
    }

    #[test]
    fn test_open_failure_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as a database file
        let err = ChunkStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, ScopeError::Storage(_)));
    }

    #[test]
    fn test_clean_chunk_text() {
        assert_eq!(clean_chunk_text("  a\u{FFFD}b\0c \n"), "abc");
    }
}

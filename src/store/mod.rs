//! Persistence sinks
//!
//! - Relational: chunk rows and reference scope tables in SQLite
//! - Vector: flat L2 index file plus the parallel chunk-text file

pub mod relational;
pub mod vector;

pub use relational::{ChunkStore, SampleScope, StoredChunk};
pub use vector::{FlatL2Index, RetrievedChunk, SearchHit, VectorStore};

//! scopegen - requirements document to Scope of Work
//!
//! A retrieval-augmented pipeline that turns a client requirements document
//! (`.pdf`, `.docx`, `.txt`) into a structured Scope of Work using a local or
//! hosted LLM, persisting chunks, embeddings and the generated tables along
//! the way.
//!
//! # Architecture
//!
//! - **Ingestion**: `extract` → `chunking` → `embedding`
//! - **Persistence**: `store` (SQLite rows, flat L2 index + chunk texts)
//! - **Generation**: `prompt` → `generation` → `parser` → `scope`
//! - **Output**: `export` (JSON, CSV, XLSX)
//! - **Orchestration**: `pipeline`, with `telemetry` for console reporting

pub mod errors;
pub mod config;

pub mod extract;
pub mod chunking;
pub mod embedding;
pub mod store;

pub mod prompt;
pub mod generation;
pub mod parser;
pub mod scope;
pub mod export;

pub mod pipeline;
pub mod telemetry;

// Terminal interface
pub mod cli;
pub mod doctor;

// Re-export commonly used types
pub use config::Config;
pub use errors::{Result, ScopeError};
pub use pipeline::{PipelineReport, ScopePipeline};
pub use scope::ScopeOfWork;

//! Error types for scopegen
//!
//! One taxonomy for the whole pipeline. Only `UnsupportedFormat` is fatal to a
//! run by default; the pipeline downgrades the other stage failures to
//! warnings and empty results.

use thiserror::Error;

/// Main error type for the scope generation pipeline
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Input file extension is not one of pdf/docx/txt
    #[error("Unsupported file format: {extension:?} (expected .pdf, .docx or .txt)")]
    UnsupportedFormat { extension: String },

    /// Text extraction failed for a supported format
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// Relational persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    Index(String),

    /// LLM transport / process errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Model output could not be turned into JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Flattening or writing the tabular output failed
    #[error("Export error: {0}")]
    Export(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_display() {
        let err = ScopeError::UnsupportedFormat {
            extension: "xls".to_string(),
        };
        assert!(err.to_string().contains("xls"));
    }

    #[test]
    fn test_stage_errors_name_their_stage() {
        assert!(ScopeError::Generation("boom".to_string())
            .to_string()
            .contains("boom"));
        assert!(ScopeError::Storage("db down".to_string())
            .to_string()
            .contains("db down"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ScopeError = io.into();
        assert!(matches!(err, ScopeError::Io(_)));
    }
}

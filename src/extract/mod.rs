//! Text extraction for requirement documents
//!
//! Dispatches on the (case-insensitive) file extension to a PDF, DOCX or
//! plain-text reader. Anything else is an `UnsupportedFormat` error.

pub mod docx;
pub mod pdf;

use std::path::Path;

use crate::errors::{Result, ScopeError};

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

impl DocumentFormat {
    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::Txt),
            _ => Err(ScopeError::UnsupportedFormat { extension: ext }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Txt => "txt",
        }
    }
}

/// A requirements document and its raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Base name of the source file
    pub file_name: String,
    pub format: DocumentFormat,
    pub text: String,
}

impl Document {
    /// True when nothing but whitespace was extracted
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Read a document from disk and return its text
pub fn extract_text(path: &Path) -> Result<Document> {
    let format = DocumentFormat::from_path(path)?;

    let text = match format {
        DocumentFormat::Pdf => pdf::extract_pdf_text(path)?,
        DocumentFormat::Docx => docx::extract_docx_text(path)?,
        DocumentFormat::Txt => std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Extraction(format!("Failed to read {}: {}", path.display(), e))
        })?,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document {
        file_name,
        format,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_detection_is_case_insensitive() {
        assert_eq!(
            DocumentFormat::from_path(&PathBuf::from("Brief.PDF")).unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_path(&PathBuf::from("a/b/Reqs.Docx")).unwrap(),
            DocumentFormat::Docx
        );
        assert_eq!(
            DocumentFormat::from_path(&PathBuf::from("notes.txt")).unwrap(),
            DocumentFormat::Txt
        );
    }

    #[test]
    fn test_unsupported_format() {
        let err = DocumentFormat::from_path(&PathBuf::from("sheet.xlsx")).unwrap_err();
        assert!(matches!(err, ScopeError::UnsupportedFormat { ref extension } if extension == "xlsx"));

        let err = DocumentFormat::from_path(&PathBuf::from("README")).unwrap_err();
        assert!(matches!(err, ScopeError::UnsupportedFormat { ref extension } if extension.is_empty()));
    }

    #[test]
    fn test_extract_txt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.TXT");
        std::fs::write(&path, "Payroll must run monthly.\nStaff can view payslips.").unwrap();

        let doc = extract_text(&path).unwrap();
        assert_eq!(doc.file_name, "requirements.TXT");
        assert_eq!(doc.format, DocumentFormat::Txt);
        assert!(doc.text.contains("payslips"));
        assert!(!doc.is_blank());
    }

    #[test]
    fn test_missing_txt_is_extraction_error() {
        let err = extract_text(&PathBuf::from("/nonexistent/input.txt")).unwrap_err();
        assert!(matches!(err, ScopeError::Extraction(_)));
    }
}

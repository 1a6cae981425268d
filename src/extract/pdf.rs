//! PDF text extraction via pdf-extract
//!
//! Pages are concatenated in page order. pdf-extract can panic on malformed
//! font tables, so the call is wrapped in `catch_unwind`.

use std::path::Path;

use crate::errors::{Result, ScopeError};

/// Extract text from every page of a PDF, in order
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let pages_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    let pages = match pages_result {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            return Err(ScopeError::Extraction(format!(
                "Cannot read PDF {}: {}",
                path.display(),
                e
            )))
        }
        Err(panic_payload) => {
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            return Err(ScopeError::Extraction(format!(
                "PDF reader crashed on {}: {}",
                path.display(),
                panic_msg
            )));
        }
    };

    Ok(join_pages(&pages))
}

/// Concatenate page texts, keeping a line break between pages
pub(crate) fn join_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page);
        if !page.ends_with('\n') {
            text.push('\n');
        }
    }
    text
}

//! Recursive character text splitter
//!
//! Splits raw document text into bounded, overlapping chunks. The text is cut
//! on the first separator that occurs (paragraph break, line break, space,
//! then individual characters); pieces are merged greedily up to
//! `chunk_size` characters and each new chunk re-uses trailing pieces of the
//! previous one, up to `chunk_overlap` characters.
//!
//! Splitting works on byte ranges of the original text so callers can map a
//! chunk back to its position (see [`TextSplitter::split_spans`]).

use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::errors::{Result, ScopeError};
use crate::extract::Document;

/// Separators tried in order, coarsest first. `""` means "split per character".
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// One chunk of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based ordinal within the document
    pub index: usize,
    pub text: String,
    /// Byte range in the source text
    pub start: usize,
    pub end: usize,
}

/// Recursive character splitter
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter {
    /// Create a splitter; overlap must be smaller than the chunk size
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ScopeError::Config("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ScopeError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let splitter = Self::new(config.chunk_size, config.chunk_overlap)?;
        Ok(match &config.separators {
            Some(seps) => {
                splitter.with_separators(&seps.iter().map(String::as_str).collect::<Vec<_>>())
            }
            None => splitter,
        })
    }

    /// Replace the separator list. An empty-string separator is appended if
    /// missing so that every piece can always be cut down to size.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        let mut seps: Vec<String> = separators.iter().map(|s| s.to_string()).collect();
        if seps.last().map_or(true, |s| !s.is_empty()) {
            seps.push(String::new());
        }
        self.separators = seps;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into chunk strings
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|r| text[r].to_string())
            .collect()
    }

    /// Split a document into 1-based ordered chunks
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split_spans(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, r)| Chunk {
                index: i + 1,
                text: document.text[r.clone()].to_string(),
                start: r.start,
                end: r.end,
            })
            .collect()
    }

    /// Byte ranges of each chunk in `text`, whitespace-trimmed, in order
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();

        self.split_range(text, 0..text.len(), &separators)
            .into_iter()
            .filter_map(|r| trim_range(text, r))
            .collect()
    }

    fn split_range(&self, text: &str, range: Range<usize>, separators: &[&str]) -> Vec<Range<usize>> {
        let slice = &text[range.clone()];

        let sep_idx = separators
            .iter()
            .position(|s| s.is_empty() || slice.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(sep_idx).copied().unwrap_or("");
        let remaining = separators.get(sep_idx + 1..).unwrap_or(&[]);

        let pieces = split_keeping_separator(slice, separator, range.start);

        let mut out = Vec::new();
        let mut good: Vec<Range<usize>> = Vec::new();

        for piece in pieces {
            if char_len(text, &piece) <= self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                out.extend(self.merge(text, &good));
                good.clear();
            }

            if remaining.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_range(text, piece, remaining));
            }
        }

        if !good.is_empty() {
            out.extend(self.merge(text, &good));
        }

        out
    }

    /// Merge adjacent pieces into windows of at most `chunk_size` characters
    fn merge(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(text, piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    out.push(first.0.start..last.0.end);
                }

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece.clone(), len));
            total += len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            out.push(first.0.start..last.0.end);
        }

        out
    }
}

/// Split `slice` on `separator`, keeping the separator at the start of the
/// following piece so pieces stay contiguous. Offsets are shifted by `base`.
fn split_keeping_separator(slice: &str, separator: &str, base: usize) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in slice.match_indices(separator) {
        if idx > start {
            pieces.push(base + start..base + idx);
        }
        start = idx;
    }
    if start < slice.len() {
        pieces.push(base + start..base + slice.len());
    }
    pieces
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead + trail >= slice.len() {
        return None;
    }
    Some(range.start + lead..range.end - trail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DocumentFormat;

    fn squash(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_text() {
        let splitter = TextSplitter::default();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("  \n\n  ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let splitter = TextSplitter::default();
        let chunks = splitter.split("  Short requirement.\n");
        assert_eq!(chunks, vec!["Short requirement.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let splitter = TextSplitter::new(40, 10).unwrap();
        let text = "Employees submit leave requests. Managers approve them. \
                    Payroll runs monthly and exports payslips. Admins manage roles.";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn test_paragraphs_preferred() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let text = "Attendance tracking.\n\nPayroll processing.\n\nRecruitment flow.";
        let chunks = splitter.split(text);
        assert_eq!(
            chunks,
            vec![
                "Attendance tracking.".to_string(),
                "Payroll processing.".to_string(),
                "Recruitment flow.".to_string()
            ]
        );
    }

    #[test]
    fn test_overlap_carries_context() {
        let splitter = TextSplitter::new(20, 8).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev_last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].starts_with(prev_last_word),
                "{:?} should start with {:?}",
                pair[1],
                prev_last_word
            );
        }
    }

    #[test]
    fn test_long_word_split_per_character() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let chunks = splitter.split("abcdefghij");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(chunks.first().map(String::as_str), Some("abcd"));
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = TextSplitter::new(5, 2).unwrap();
        let text = "héllo wörld ñandú über";
        let chunks = splitter.split(text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
    }

    #[test]
    fn test_reconstruction_from_spans() {
        let splitter = TextSplitter::new(25, 6).unwrap();
        let text = "Module one covers login.\nModule two covers payroll and tax.\n\nModule three handles reporting dashboards for managers.";
        let spans = splitter.split_spans(text);

        let mut rebuilt = String::new();
        let mut cursor = 0;
        for span in spans {
            let start = span.start.max(cursor);
            if start < span.end {
                rebuilt.push_str(&text[start..span.end]);
                cursor = span.end;
            }
        }
        assert_eq!(squash(&rebuilt), squash(text));
    }

    #[test]
    fn test_chunk_document_ordinals() {
        let splitter = TextSplitter::new(20, 5).unwrap();
        let doc = Document {
            file_name: "reqs.txt".to_string(),
            format: DocumentFormat::Txt,
            text: "one two three four five six seven eight nine ten eleven twelve".to_string(),
        };
        let chunks = splitter.chunk_document(&doc);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i + 1);
            assert_eq!(&doc.text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_invalid_settings() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn test_custom_separators_get_char_fallback() {
        let splitter = TextSplitter::new(3, 0).unwrap().with_separators(&["|"]);
        let chunks = splitter.split("abcdef|gh");
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn test_configured_separators_used() {
        let config = ChunkingConfig {
            chunk_size: 12,
            chunk_overlap: 0,
            separators: Some(vec![";".to_string()]),
        };
        let splitter = TextSplitter::from_config(&config).unwrap();
        let chunks = splitter.split("alpha beta;gamma delta");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("alpha beta"));
        assert!(chunks[1].contains("gamma delta"));
    }
}

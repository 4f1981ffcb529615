//! Sliding-window text chunker.
//!
//! Splits normalized text into overlapping windows of `chunk_size`
//! characters. Consecutive windows start `chunk_size - chunk_overlap`
//! characters apart, so every chunk except the last brings at least that
//! many characters of new text.
//!
//! Offsets count Unicode scalar values, never bytes, so accented text is
//! cut at the same places as ASCII text of the same length.
//!
//! # Algorithm
//!
//! 1. Window `[start, start + chunk_size)` clipped to the text length.
//! 2. Trim the slice; drop it if nothing is left.
//! 3. Advance `start` by the stride until it reaches the end of the text.
//!
//! # Example
//!
//! ```rust
//! use campus_rag_core::chunk::{chunk_text, ChunkParams};
//!
//! let text = "a".repeat(2000);
//! let chunks = chunk_text(&text, ChunkParams::default()).unwrap();
//! let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(spans, vec![(0, 850), (720, 1570), (1440, 2000)]);
//! ```

use crate::error::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 850;
pub const DEFAULT_CHUNK_OVERLAP: usize = 130;

/// Window size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkParams {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let params = Self {
            chunk_size,
            chunk_overlap,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Processing("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Processing(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// One window of text. `start..end` is the untrimmed window in characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: i64,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Split `text` into overlapping windows.
///
/// Returns an empty vector for blank text and exactly one chunk when the
/// text is shorter than `chunk_size`.
pub fn chunk_text(text: &str, params: ChunkParams) -> Result<Vec<TextChunk>> {
    params.validate()?;

    // Byte offset of every char boundary, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let char_len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < char_len {
        let end = (start + params.chunk_size).min(char_len);
        let slice = text[bounds[start]..bounds[end]].trim();
        if !slice.is_empty() {
            chunks.push(TextChunk {
                index: chunks.len() as i64,
                start,
                end,
                text: slice.to_string(),
            });
        }
        start += params.stride();
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_boundaries_on_2000_chars() {
        let text: String = (0..2000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let chunks = chunk_text(&text, ChunkParams::default()).unwrap();
        let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 850), (720, 1570), (1440, 2000)]);
        assert_eq!(chunks[1].text, text[720..1570]);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("  cours algèbre  ", ChunkParams::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "cours algèbre");
    }

    #[test]
    fn test_blank_text_no_chunks() {
        assert!(chunk_text("", ChunkParams::default()).unwrap().is_empty());
        assert!(chunk_text("   \n ", ChunkParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_only_window_dropped() {
        let text = format!("{}{}", "x".repeat(10), " ".repeat(20));
        let chunks = chunk_text(&text, ChunkParams::new(10, 0).unwrap()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_offsets_count_chars_not_bytes() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, ChunkParams::new(10, 2).unwrap()).unwrap();
        let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(spans, vec![(0, 10), (8, 18), (16, 26), (24, 30)]);
        assert_eq!(chunks[0].text.chars().count(), 10);
    }

    #[test]
    fn test_indices_contiguous() {
        let text = "mot ".repeat(1000);
        let chunks = chunk_text(&text, ChunkParams::default()).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i as i64);
        }
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(ChunkParams::new(100, 100).is_err());
        assert!(ChunkParams::new(0, 0).is_err());
        let bad = ChunkParams {
            chunk_size: 10,
            chunk_overlap: 20,
        };
        assert!(chunk_text("abc", bad).is_err());
    }

    #[test]
    fn test_deterministic() {
        let text = "graphe arbre sommet arête ".repeat(200);
        let a = chunk_text(&text, ChunkParams::default()).unwrap();
        let b = chunk_text(&text, ChunkParams::default()).unwrap();
        assert_eq!(a, b);
    }
}

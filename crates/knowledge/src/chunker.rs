//! Recursive character chunking with overlap.
//!
//! Documents are split on the coarsest boundary that yields pieces no longer
//! than `chunk_size` characters (paragraph, line, sentence, word, then raw
//! characters). Pieces are then packed into chunks, each new chunk starting
//! with up to `chunk_overlap` characters carried over from the previous one.

use std::collections::VecDeque;

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size`; a zero size becomes 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        self.collect_pieces(text, SEPARATORS, &mut pieces);

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            if window_len + piece_len > self.chunk_size && !window.is_empty() {
                Self::emit(&window, &mut chunks);
                while window_len > self.chunk_overlap
                    || (window_len > 0 && window_len + piece_len > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(front) => window_len -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            window_len += piece_len;
        }

        if !window.is_empty() {
            Self::emit(&window, &mut chunks);
        }
        chunks
    }

    fn emit(window: &VecDeque<&str>, chunks: &mut Vec<String>) {
        let chunk: String = window.iter().copied().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
    }

    fn collect_pieces<'a>(&self, text: &'a str, separators: &[&str], out: &mut Vec<&'a str>) {
        if text.is_empty() {
            return;
        }
        if char_len(text) <= self.chunk_size {
            out.push(text);
            return;
        }

        match separators.split_first() {
            Some((sep, rest)) if text.contains(sep) => {
                for part in text.split_inclusive(sep) {
                    self.collect_pieces(part, rest, out);
                }
            }
            Some((_, rest)) => self.collect_pieces(text, rest, out),
            None => {
                // No boundary left: cut on character boundaries.
                let mut start = 0;
                for (count, (idx, _)) in text.char_indices().enumerate() {
                    if count > 0 && count % self.chunk_size == 0 {
                        out.push(&text[start..idx]);
                        start = idx;
                    }
                }
                out.push(&text[start..]);
            }
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = TextChunker::default().split("  I feel anxious.  ");
        assert_eq!(chunks, vec!["I feel anxious."]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(TextChunker::default().split("").is_empty());
        assert!(TextChunker::default().split("   \n\n ").is_empty());
    }

    #[test]
    fn chunks_respect_size() {
        let text = "Thoughts shape feelings. ".repeat(80);
        let chunker = TextChunker::new(120, 20);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..60).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let chunks = TextChunker::new(50, 15).split(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{:?} / {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn paragraphs_preferred_over_words() {
        let para = "a".repeat(30);
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = TextChunker::new(40, 0).split(&text);
        assert_eq!(chunks, vec![para.clone(), para.clone(), para]);
    }

    #[test]
    fn unbroken_text_is_hard_split() {
        let text = "x".repeat(25);
        let chunks = TextChunker::new(10, 0).split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2], "xxxxx");
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(12);
        let chunks = TextChunker::new(5, 0).split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 5);
    }

    #[test]
    fn overlap_clamped_below_size() {
        let chunker = TextChunker::new(10, 50);
        assert_eq!(chunker.chunk_overlap(), 9);
    }
}

//! crates/bizdesk_core/src/chunking.rs
//!
//! Recursive character splitting of extracted document text.
//!
//! Text is first cut into pieces at the coarsest separator present
//! (paragraph, line, word, then single characters), recursing into any piece
//! still longer than the chunk size. Pieces keep their trailing separator, so
//! every chunk is an exact slice of the input. Pieces are then packed greedily
//! into chunks of at most `chunk_size` characters, each chunk starting with at
//! most `chunk_overlap` characters carried over from the previous one.

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A chunk and its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkerConfig,
}

impl RecursiveChunker {
    /// A zero chunk size is raised to one and the overlap is kept strictly
    /// below the chunk size.
    pub fn new(config: ChunkerConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            config: ChunkerConfig {
                chunk_size,
                chunk_overlap: config.chunk_overlap.min(chunk_size - 1),
            },
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        self.split_spans(text, 0, &SEPARATORS, &mut spans);
        self.merge(text, spans)
    }

    /// The chunk texts only, in order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.chunk(text).into_iter().map(|c| c.text).collect()
    }

    fn split_spans(&self, text: &str, offset: usize, separators: &[&str], out: &mut Vec<Span>) {
        let chars = text.chars().count();
        if chars <= self.config.chunk_size {
            out.push(Span {
                start: offset,
                end: offset + text.len(),
                chars,
            });
            return;
        }

        let index = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(index).copied().unwrap_or("");
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        if separator.is_empty() {
            for (i, c) in text.char_indices() {
                out.push(Span {
                    start: offset + i,
                    end: offset + i + c.len_utf8(),
                    chars: 1,
                });
            }
            return;
        }

        let mut piece_start = 0;
        for (at, matched) in text.match_indices(separator) {
            let piece_end = at + matched.len();
            self.split_spans(&text[piece_start..piece_end], offset + piece_start, finer, out);
            piece_start = piece_end;
        }
        if piece_start < text.len() {
            self.split_spans(&text[piece_start..], offset + piece_start, finer, out);
        }
    }

    fn merge(&self, text: &str, spans: Vec<Span>) -> Vec<Chunk> {
        let ChunkerConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut chunks = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut total = 0;

        for span in spans {
            if total + span.chars > chunk_size && !window.is_empty() {
                chunks.push(Self::emit(text, &window));
                while total > chunk_overlap || (total > 0 && total + span.chars > chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }
            total += span.chars;
            window.push_back(span);
        }
        if !window.is_empty() {
            chunks.push(Self::emit(text, &window));
        }
        chunks
    }

    fn emit(text: &str, window: &VecDeque<Span>) -> Chunk {
        let start = window.front().map(|s| s.start).unwrap_or(0);
        let end = window.back().map(|s| s.end).unwrap_or(start);
        Chunk {
            text: text[start..end].to_string(),
            start,
            end,
        }
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

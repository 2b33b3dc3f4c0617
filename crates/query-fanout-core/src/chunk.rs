//! Sentence-aware, word-bounded text chunker.
//!
//! Splits page text into [`ContentChunk`]s of roughly `size` words, with
//! `overlap` words carried from the end of one chunk into the start of
//! the next for context continuity.
//!
//! # Algorithm
//!
//! 1. Split the text into sentences at `.`, `!` or `?` followed by
//!    whitespace.
//! 2. Append each sentence's words to a running buffer.
//! 3. When the next sentence would push the buffer past `size` words
//!    (and the buffer is non-empty), flush the buffer as a chunk and seed
//!    the next buffer with its last `overlap` words.
//! 4. Sentences are never split: a single sentence longer than `size`
//!    yields an oversized chunk.
//! 5. Flush the remainder at end of input. Empty input yields no chunks.
//!
//! [`chunk_semantic`] places boundaries where the meaning shifts instead,
//! and falls back to [`chunk_text`] whenever it cannot embed.
//!
//! # Example
//!
//! ```rust
//! use query_fanout_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("One two three. Four five six.", 4, 0);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].text, "Four five six.");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::capability::{cosine_similarity, embed_all, Embedder, EmbeddingCache};
use crate::models::{ChunkingMethod, ContentChunk};

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"))
}

/// Split text into sentences at end-of-sentence punctuation followed by
/// whitespace. The punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_break().find_iter(text) {
        // punctuation is a single ASCII byte
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split text into overlapping word-bounded chunks.
///
/// Returns chunks with contiguous indices starting at 0.
///
/// # Guarantees
///
/// - Deterministic: identical input and parameters give identical output.
/// - With `overlap = 0` the chunks partition the input's words exactly.
/// - Chunk `i > 0` starts with the last `min(overlap, len(i-1))` words of
///   chunk `i - 1`; everything after that prefix is new text.
/// - `overlap >= size` is not rejected; it produces near-duplicate chunks.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<ContentChunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in split_sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        if current.len() + words.len() > size && !current.is_empty() {
            let carry_from = current.len() - overlap.min(current.len());
            let carry: Vec<&str> = current[carry_from..].to_vec();
            push_chunk(&mut chunks, &current);
            current = carry;
        }
        current.extend(words);
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, &current);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<ContentChunk>, words: &[&str]) {
    chunks.push(ContentChunk {
        index: chunks.len(),
        text: words.join(" "),
        word_count: words.len(),
    });
}

/// Chunk on semantic boundaries, falling back to [`chunk_text`].
///
/// Each sentence is embedded together with its neighbours; a boundary is
/// placed wherever the cosine distance between consecutive windows is
/// above the `breakpoint_percentile` of all such distances. Segments
/// longer than `size` words are re-chunked mechanically.
///
/// Falls back to the mechanical chunker (same output as calling
/// [`chunk_text`] directly) when there are fewer than three sentences or
/// any window fails to embed. Returns the method actually used.
pub async fn chunk_semantic(
    embedder: &dyn Embedder,
    text: &str,
    size: usize,
    overlap: usize,
    breakpoint_percentile: f64,
) -> (Vec<ContentChunk>, ChunkingMethod) {
    let sentences = split_sentences(text);
    if sentences.len() < 3 {
        debug!(sentences = sentences.len(), "too few sentences for semantic chunking");
        return (chunk_text(text, size, overlap), ChunkingMethod::Mechanical);
    }

    let windows: Vec<String> = (0..sentences.len())
        .map(|i| {
            let lo = i.saturating_sub(1);
            let hi = (i + 1).min(sentences.len() - 1);
            sentences[lo..=hi].join(" ")
        })
        .collect();

    let mut cache = EmbeddingCache::new();
    let vectors = embed_all(embedder, &windows, &mut cache).await;
    if vectors.iter().any(|v| v.is_empty()) {
        warn!("semantic chunking could not embed every sentence window, using mechanical chunking");
        return (chunk_text(text, size, overlap), ChunkingMethod::Mechanical);
    }

    let distances: Vec<f64> = vectors
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]) as f64)
        .collect();
    let threshold = percentile(&distances, breakpoint_percentile);

    let mut segments: Vec<Vec<&str>> = vec![Vec::new()];
    for (i, sentence) in sentences.iter().enumerate() {
        if let Some(last) = segments.last_mut() {
            last.push(*sentence);
        }
        if i < distances.len() && distances[i] > threshold {
            segments.push(Vec::new());
        }
    }

    let mut chunks = Vec::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        let segment_text = segment.join(" ");
        for piece in chunk_text(&segment_text, size, overlap) {
            chunks.push(ContentChunk {
                index: chunks.len(),
                ..piece
            });
        }
    }

    debug!(
        segments = segments.len(),
        chunks = chunks.len(),
        threshold,
        "semantic chunking complete"
    );
    (chunks, ChunkingMethod::Semantic)
}

/// Linear-interpolated percentile (`p` in `[0, 100]`) of a sample.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

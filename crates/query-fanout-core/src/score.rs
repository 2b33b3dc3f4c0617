//! Nearest-chunk similarity scoring.
//!
//! Every chunk and every query is embedded once; each query is matched
//! to the chunk with the highest cosine similarity (first occurrence
//! wins on ties) and marked covered when that similarity reaches the
//! threshold. Texts that fail to embed score `0.0` and stay uncovered.

use std::collections::BTreeMap;

use tracing::debug;

use crate::capability::{cosine_similarity, embed_all, Embedder, EmbeddingCache};
use crate::models::{ContentChunk, CoverageResult, EnrichedQuery};

/// Per-query coverage plus chunk usage bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutput {
    pub results: Vec<CoverageResult>,
    /// chunk index → number of queries that picked it as best match.
    /// Only chunks picked at least once appear.
    pub chunk_usage: BTreeMap<usize, usize>,
    /// Chunk indices never picked as a best match, ascending.
    pub unused_chunks: Vec<usize>,
}

/// Index and similarity of the best chunk, or `None` when there is
/// nothing to compare against. Chunks that failed to embed (empty
/// vectors) never compete.
pub fn best_match(query_vec: &[f32], chunk_vecs: &[Vec<f32>]) -> Option<(usize, f32)> {
    if query_vec.is_empty() {
        return None;
    }
    let mut best: Option<(usize, f32)> = None;
    for (i, chunk_vec) in chunk_vecs.iter().enumerate() {
        if chunk_vec.is_empty() {
            continue;
        }
        let sim = cosine_similarity(query_vec, chunk_vec);
        match best {
            Some((_, best_sim)) if sim <= best_sim => {}
            _ => best = Some((i, sim)),
        }
    }
    best
}

/// Score every enriched query against the chunks.
pub async fn score(
    embedder: &dyn Embedder,
    queries: &[EnrichedQuery],
    chunks: &[ContentChunk],
    threshold: f32,
) -> ScoreOutput {
    let chunk_texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let query_texts: Vec<String> = queries.iter().map(|q| q.query.clone()).collect();

    let mut chunk_cache = EmbeddingCache::new();
    let mut query_cache = EmbeddingCache::new();
    let (chunk_vecs, query_vecs) = futures::join!(
        embed_all(embedder, &chunk_texts, &mut chunk_cache),
        embed_all(embedder, &query_texts, &mut query_cache),
    );

    let mut chunk_usage: BTreeMap<usize, usize> = BTreeMap::new();
    let mut results = Vec::with_capacity(queries.len());

    for (query, query_vec) in queries.iter().zip(&query_vecs) {
        let matched = best_match(query_vec, &chunk_vecs);
        let (best_chunk_index, similarity) = match matched {
            Some((i, sim)) => (Some(chunks[i].index), sim),
            None => (None, 0.0),
        };
        if let Some(index) = best_chunk_index {
            *chunk_usage.entry(index).or_insert(0) += 1;
        }

        let covered = best_chunk_index.is_some() && similarity >= threshold;
        let best_chunk_text = match (covered, matched) {
            (true, Some((i, _))) => chunks[i].text.clone(),
            _ => String::new(),
        };
        debug!(query = %query.query, similarity, covered, "query scored");

        results.push(CoverageResult {
            query: query.query.clone(),
            query_type: query.query_type,
            user_intent: query.user_intent,
            routing_format: query.routing_format,
            reasoning: query.reasoning.clone(),
            format_reason: query.format_reason.clone(),
            similarity,
            best_chunk_index,
            best_chunk_text,
            covered,
        });
    }

    let unused_chunks = chunks
        .iter()
        .map(|c| c.index)
        .filter(|index| !chunk_usage.contains_key(index))
        .collect();

    ScoreOutput {
        results,
        chunk_usage,
        unused_chunks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Looks each text up in a fixed table; unknown texts fail.
    struct TableEmbedder(HashMap<String, Vec<f32>>);

    impl TableEmbedder {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            texts
                .iter()
                .map(|t| {
                    self.0
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("unknown text: {t}"))
                })
                .collect()
        }
    }

    fn chunk(index: usize, text: &str) -> ContentChunk {
        ContentChunk {
            index,
            text: text.to_string(),
            word_count: text.split_whitespace().count(),
        }
    }

    #[tokio::test]
    async fn test_identical_vector_is_best_match() {
        let embedder = TableEmbedder::new(&[
            ("c0", vec![1.0, 0.0, 0.0]),
            ("c1", vec![0.0, 1.0, 0.0]),
            ("c2", vec![0.0, 0.0, 1.0]),
            ("espresso grind size", vec![0.0, 1.0, 0.0]),
        ]);
        let chunks = vec![chunk(0, "c0"), chunk(1, "c1"), chunk(2, "c2")];
        let queries = vec![enrich("espresso grind size")];

        let out = score(&embedder, &queries, &chunks, 1.0).await;
        let r = &out.results[0];
        assert_eq!(r.best_chunk_index, Some(1));
        assert!((r.similarity - 1.0).abs() < 1e-6);
        assert!(r.covered);
        assert_eq!(r.best_chunk_text, "c1");
        assert_eq!(out.unused_chunks, vec![0, 2]);
        assert_eq!(out.chunk_usage[&1], 1);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let embedder = TableEmbedder::new(&[("c0", vec![1.0, 0.0]), ("exact", vec![1.0, 0.0])]);
        let chunks = vec![chunk(0, "c0")];
        let queries = vec![enrich("exact")];
        for threshold in [0.0, 0.65, 0.75, 1.0] {
            let out = score(&embedder, &queries, &chunks, threshold).await;
            let r = &out.results[0];
            assert_eq!(r.covered, r.similarity >= threshold);
            assert!(r.covered);
        }
    }

    #[tokio::test]
    async fn test_uncovered_has_empty_text() {
        let embedder = TableEmbedder::new(&[("c0", vec![1.0, 0.0]), ("far", vec![0.5, 1.0])]);
        let out = score(&embedder, &[enrich("far")], &[chunk(0, "c0")], 0.65).await;
        let r = &out.results[0];
        assert!(!r.covered);
        assert!(r.best_chunk_text.is_empty());
        assert_eq!(r.best_chunk_index, Some(0));
        assert!(out.unused_chunks.is_empty());
    }

    #[tokio::test]
    async fn test_ties_pick_lowest_index() {
        let embedder = TableEmbedder::new(&[
            ("c0", vec![1.0, 0.0]),
            ("c1", vec![1.0, 0.0]),
            ("q", vec![1.0, 0.0]),
        ]);
        let out = score(&embedder, &[enrich("q")], &[chunk(0, "c0"), chunk(1, "c1")], 0.5).await;
        assert_eq!(out.results[0].best_chunk_index, Some(0));
    }

    #[tokio::test]
    async fn test_failed_query_embedding_is_uncovered() {
        let embedder = TableEmbedder::new(&[("c0", vec![1.0, 0.0])]);
        let out = score(&embedder, &[enrich("unknown query")], &[chunk(0, "c0")], 0.0).await;
        let r = &out.results[0];
        assert_eq!(r.similarity, 0.0);
        assert!(!r.covered);
        assert_eq!(r.best_chunk_index, None);
        assert_eq!(out.unused_chunks, vec![0]);
    }

    #[tokio::test]
    async fn test_failed_chunk_embedding_scores_zero() {
        let embedder = TableEmbedder::new(&[("c1", vec![0.0, 1.0]), ("q", vec![1.0, 0.0])]);
        let out = score(&embedder, &[enrich("q")], &[chunk(0, "broken"), chunk(1, "c1")], 0.5).await;
        let r = &out.results[0];
        assert_eq!(r.similarity, 0.0);
        assert!(!r.covered);
    }

    #[tokio::test]
    async fn test_failed_chunk_never_matches_at_zero_threshold() {
        let embedder = TableEmbedder::new(&[("q", vec![1.0, 0.0])]);
        let out = score(&embedder, &[enrich("q")], &[chunk(0, "broken")], 0.0).await;
        let r = &out.results[0];
        assert_eq!(r.best_chunk_index, None);
        assert_eq!(r.similarity, 0.0);
        assert!(!r.covered);
        assert!(out.chunk_usage.is_empty());
        assert_eq!(out.unused_chunks, vec![0]);
    }

    #[test]
    fn test_best_match_skips_empty_vectors() {
        let chunk_vecs = vec![Vec::new(), vec![0.0, 1.0], Vec::new()];
        assert_eq!(best_match(&[1.0, 0.0], &chunk_vecs), Some((1, 0.0)));
        assert_eq!(best_match(&[1.0, 0.0], &[Vec::new()]), None);
    }

    #[tokio::test]
    async fn test_no_chunks() {
        let embedder = TableEmbedder::new(&[("q", vec![1.0])]);
        let out = score(&embedder, &[enrich("q")], &[], 0.0).await;
        assert_eq!(out.results[0].best_chunk_index, None);
        assert!(!out.results[0].covered);
        assert!(out.chunk_usage.is_empty());
    }
}

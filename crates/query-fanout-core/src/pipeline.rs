//! The end-to-end analysis pipeline.
//!
//! Stages run strictly in order: entity extraction, query generation,
//! enrichment, chunking, scoring, aggregation, recommendations. The only
//! fatal condition is an empty query set after both generation paths;
//! every other failure is recovered inside its stage.
//!
//! An [`Analyzer`] holds no mutable state, so one instance can serve
//! concurrent analyses. Embedding caches are created per run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::capability::{Embedder, TextGenerator};
use crate::chunk::{chunk_semantic, chunk_text};
use crate::coverage::aggregate;
use crate::enrich::enrich_all;
use crate::entity;
use crate::generate::{self, GenerationSettings, QueryDistribution};
use crate::models::{
    AnalysisResult, ChunkingMethod, ContentStats, FanoutInfo, ModelInfo, SearchMode,
};
use crate::parse::Strictness;
use crate::recommend::recommend;
use crate::score::score;

pub const DEFAULT_THRESHOLD: f32 = 0.65;
pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_BREAKPOINT_PERCENTILE: f64 = 95.0;

/// Already-extracted page text supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub title: String,
    pub content: String,
    /// Word count of `content`; recomputed when `0`.
    #[serde(default)]
    pub word_count: usize,
}

impl PageContent {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count();
        Self {
            title: title.into(),
            content,
            word_count,
        }
    }

    fn effective_word_count(&self) -> usize {
        if self.word_count == 0 {
            self.content.split_whitespace().count()
        } else {
            self.word_count
        }
    }
}

/// How page text is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkingStrategy {
    /// Sentence-accumulating word windows with overlap.
    Mechanical,
    /// Embedding-based topic breakpoints, falling back to mechanical.
    Semantic { breakpoint_percentile: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Minimum cosine similarity for a query to count as covered.
    pub threshold: f32,
    /// Nominal chunk size in words.
    pub chunk_size: usize,
    /// Words carried from one chunk into the next.
    pub chunk_overlap: usize,
    pub chunking: ChunkingStrategy,
    pub mode: SearchMode,
    /// Overrides the mode's query budget when set.
    pub target_queries: Option<usize>,
    pub distribution: QueryDistribution,
    pub parse_strictness: Strictness,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            chunking: ChunkingStrategy::Mechanical,
            mode: SearchMode::Complex,
            target_queries: None,
            distribution: QueryDistribution::default(),
            parse_strictness: Strictness::Standard,
        }
    }
}

impl AnalyzerConfig {
    pub fn query_count(&self) -> usize {
        self.target_queries
            .unwrap_or_else(|| self.mode.default_query_count())
    }
}

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no queries generated for {url}: {reason}")]
    NoQueriesGenerated { url: String, reason: String },
}

impl AnalysisError {
    pub fn url(&self) -> &str {
        match self {
            AnalysisError::NoQueriesGenerated { url, .. } => url,
        }
    }

    /// Structured failure record for the caller to persist or report.
    pub fn to_failure(&self) -> AnalysisFailure {
        AnalysisFailure {
            success: false,
            url: self.url().to_string(),
            error: self.to_string(),
        }
    }
}

/// Serializable record of an aborted analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub success: bool,
    pub url: String,
    pub error: String,
}

/// Runs the pipeline against one generator and one embedder.
pub struct Analyzer<G, E> {
    generator: G,
    embedder: E,
    config: AnalyzerConfig,
}

impl<G: TextGenerator, E: Embedder> Analyzer<G, E> {
    pub fn new(generator: G, embedder: E, config: AnalyzerConfig) -> Self {
        Self {
            generator,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub async fn analyze(
        &self,
        url: &str,
        page: &PageContent,
    ) -> Result<AnalysisResult, AnalysisError> {
        let config = &self.config;
        info!(url, title = %page.title, "starting analysis");

        let entity = entity::extract(&self.generator, &page.title, &page.content).await;
        info!(entity = %entity.entity_name, "entity identified");

        let settings = GenerationSettings {
            distribution: config.distribution,
            strictness: config.parse_strictness,
        };
        let generated =
            generate::generate(&self.generator, &entity.entity_name, config.query_count(), &settings)
                .await;
        if generated.queries.is_empty() {
            warn!(url, "no queries generated, aborting");
            return Err(AnalysisError::NoQueriesGenerated {
                url: url.to_string(),
                reason: generated.facets_reasoning,
            });
        }
        info!(
            count = generated.queries.len(),
            method = ?generated.method,
            "queries generated"
        );

        let enriched = enrich_all(&generated.queries);

        let (chunks, chunking_method) = match config.chunking {
            ChunkingStrategy::Mechanical => (
                chunk_text(&page.content, config.chunk_size, config.chunk_overlap),
                ChunkingMethod::Mechanical,
            ),
            ChunkingStrategy::Semantic {
                breakpoint_percentile,
            } => {
                chunk_semantic(
                    &self.embedder,
                    &page.content,
                    config.chunk_size,
                    config.chunk_overlap,
                    breakpoint_percentile,
                )
                .await
            }
        };
        info!(chunks = chunks.len(), method = ?chunking_method, "content chunked");

        let scored = score(&self.embedder, &enriched, &chunks, config.threshold).await;
        let summary = aggregate(&scored.results);
        info!(
            score = summary.score,
            covered = summary.covered_count,
            total = summary.total_count,
            unused_chunks = scored.unused_chunks.len(),
            "coverage scored"
        );

        let recommendations = recommend(
            &scored.results,
            &entity.entity_name,
            &scored.chunk_usage,
            &scored.unused_chunks,
        );

        Ok(AnalysisResult {
            url: url.to_string(),
            timestamp: Utc::now(),
            content: ContentStats {
                title: page.title.clone(),
                word_count: page.effective_word_count(),
                chunks_count: chunks.len(),
                chunking_method,
            },
            query_fanout: FanoutInfo {
                original_query: format!("What is {}?", entity.entity_name),
                search_mode: config.mode,
                generated_count: generated.queries.len(),
                facets_reasoning: generated.facets_reasoning,
                generation_method: generated.method,
            },
            entity,
            score: summary.score,
            covered_count: summary.covered_count,
            total_count: summary.total_count,
            similarity_threshold: config.threshold,
            chunk_usage: scored.chunk_usage,
            unused_chunks: scored.unused_chunks,
            query_details: scored.results,
            recommendations,
            models: ModelInfo {
                llm: self.generator.model_name().to_string(),
                embeddings: self.embedder.model_name().to_string(),
            },
        })
    }
}

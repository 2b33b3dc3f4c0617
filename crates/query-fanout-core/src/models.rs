//! Core data models that flow through the fanout pipeline.
//!
//! Every type here is a plain value: produced once by a pipeline stage
//! and never mutated afterwards. All of them serialize with serde so the
//! calling application can persist an [`AnalysisResult`] as-is.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous, word-bounded span of the page text.
///
/// `index` is positional within one chunking run and is only used for
/// usage tracking and back-references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub index: usize,
    pub text: String,
    pub word_count: usize,
}

/// Structural shape of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryType {
    Question,
    LongTail,
    Conversational,
    Keyword,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Question => "question",
            QueryType::LongTail => "long-tail",
            QueryType::Conversational => "conversational",
            QueryType::Keyword => "keyword",
        }
    }
}

/// What the user is trying to accomplish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserIntent {
    Informational,
    Commercial,
    Transactional,
    Navigational,
}

impl UserIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIntent::Informational => "informational",
            UserIntent::Commercial => "commercial",
            UserIntent::Transactional => "transactional",
            UserIntent::Navigational => "navigational",
        }
    }
}

/// Preferred content presentation for a query (fixed 23-label taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoutingFormat {
    #[serde(rename = "web_article")]
    WebArticle,
    #[serde(rename = "faq_page")]
    FaqPage,
    #[serde(rename = "how_to_steps")]
    HowToSteps,
    #[serde(rename = "comparison_table")]
    ComparisonTable,
    #[serde(rename = "buyers_guide")]
    BuyersGuide,
    #[serde(rename = "checklist")]
    Checklist,
    #[serde(rename = "product_spec_sheet")]
    ProductSpecSheet,
    #[serde(rename = "glossary/definition")]
    GlossaryDefinition,
    #[serde(rename = "pricing_page")]
    PricingPage,
    #[serde(rename = "review_roundup")]
    ReviewRoundup,
    #[serde(rename = "tutorial_video/transcript")]
    TutorialVideo,
    #[serde(rename = "podcast_transcript")]
    PodcastTranscript,
    #[serde(rename = "code_samples/docs")]
    CodeSamples,
    #[serde(rename = "api_reference")]
    ApiReference,
    #[serde(rename = "calculator/tool")]
    CalculatorTool,
    #[serde(rename = "dataset")]
    Dataset,
    #[serde(rename = "image_gallery")]
    ImageGallery,
    #[serde(rename = "map/local_pack")]
    MapLocalPack,
    #[serde(rename = "forum/qna")]
    ForumQna,
    #[serde(rename = "pdf_whitepaper")]
    PdfWhitepaper,
    #[serde(rename = "case_study")]
    CaseStudy,
    #[serde(rename = "press_release")]
    PressRelease,
    #[serde(rename = "interactive_widget")]
    InteractiveWidget,
}

impl RoutingFormat {
    /// Every label, in the order of the published taxonomy.
    pub const ALL: [RoutingFormat; 23] = [
        RoutingFormat::WebArticle,
        RoutingFormat::FaqPage,
        RoutingFormat::HowToSteps,
        RoutingFormat::ComparisonTable,
        RoutingFormat::BuyersGuide,
        RoutingFormat::Checklist,
        RoutingFormat::ProductSpecSheet,
        RoutingFormat::GlossaryDefinition,
        RoutingFormat::PricingPage,
        RoutingFormat::ReviewRoundup,
        RoutingFormat::TutorialVideo,
        RoutingFormat::PodcastTranscript,
        RoutingFormat::CodeSamples,
        RoutingFormat::ApiReference,
        RoutingFormat::CalculatorTool,
        RoutingFormat::Dataset,
        RoutingFormat::ImageGallery,
        RoutingFormat::MapLocalPack,
        RoutingFormat::ForumQna,
        RoutingFormat::PdfWhitepaper,
        RoutingFormat::CaseStudy,
        RoutingFormat::PressRelease,
        RoutingFormat::InteractiveWidget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingFormat::WebArticle => "web_article",
            RoutingFormat::FaqPage => "faq_page",
            RoutingFormat::HowToSteps => "how_to_steps",
            RoutingFormat::ComparisonTable => "comparison_table",
            RoutingFormat::BuyersGuide => "buyers_guide",
            RoutingFormat::Checklist => "checklist",
            RoutingFormat::ProductSpecSheet => "product_spec_sheet",
            RoutingFormat::GlossaryDefinition => "glossary/definition",
            RoutingFormat::PricingPage => "pricing_page",
            RoutingFormat::ReviewRoundup => "review_roundup",
            RoutingFormat::TutorialVideo => "tutorial_video/transcript",
            RoutingFormat::PodcastTranscript => "podcast_transcript",
            RoutingFormat::CodeSamples => "code_samples/docs",
            RoutingFormat::ApiReference => "api_reference",
            RoutingFormat::CalculatorTool => "calculator/tool",
            RoutingFormat::Dataset => "dataset",
            RoutingFormat::ImageGallery => "image_gallery",
            RoutingFormat::MapLocalPack => "map/local_pack",
            RoutingFormat::ForumQna => "forum/qna",
            RoutingFormat::PdfWhitepaper => "pdf_whitepaper",
            RoutingFormat::CaseStudy => "case_study",
            RoutingFormat::PressRelease => "press_release",
            RoutingFormat::InteractiveWidget => "interactive_widget",
        }
    }
}

impl fmt::Display for RoutingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated query with its deterministic classification attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedQuery {
    pub query: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub user_intent: UserIntent,
    pub routing_format: RoutingFormat,
    pub format_reason: String,
    pub reasoning: String,
}

/// Per-query coverage outcome.
///
/// `covered` is always `similarity >= threshold`. `best_chunk_text` is
/// empty unless the query is covered. `best_chunk_index` is `None` when
/// there were no chunks or the query itself could not be embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub query: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub user_intent: UserIntent,
    pub routing_format: RoutingFormat,
    pub reasoning: String,
    pub format_reason: String,
    pub similarity: f32,
    pub best_chunk_index: Option<usize>,
    pub best_chunk_text: String,
    pub covered: bool,
}

/// Recommendation urgency, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub title: String,
    pub description: String,
    pub affected_queries: usize,
    pub example_queries: Vec<String>,
}

/// The page's main topic as identified by the entity extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_name: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Query budget preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// "AI Overview" style: a short fanout.
    Simple,
    /// "AI Mode" style: a wide fanout.
    Complex,
}

impl SearchMode {
    pub fn default_query_count(&self) -> usize {
        match self {
            SearchMode::Simple => 10,
            SearchMode::Complex => 20,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::Simple => "AI Overview (simple)",
            SearchMode::Complex => "AI Mode (complex)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMethod {
    Mechanical,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMethod {
    /// Two-stage prompt: facet reasoning, then the query array.
    Facets,
    /// Single-shot prompt used when the facets prompt yields nothing.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStats {
    pub title: String,
    pub word_count: usize,
    pub chunks_count: usize,
    pub chunking_method: ChunkingMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutInfo {
    pub original_query: String,
    pub search_mode: SearchMode,
    pub generated_count: usize,
    pub facets_reasoning: String,
    pub generation_method: GenerationMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub llm: String,
    pub embeddings: String,
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub entity: Entity,
    pub content: ContentStats,
    pub query_fanout: FanoutInfo,
    /// Visibility score: `100 × covered / total`, `0.0` for no queries.
    pub score: f64,
    pub covered_count: usize,
    pub total_count: usize,
    pub similarity_threshold: f32,
    /// Chunk index → number of queries that picked it as best match.
    pub chunk_usage: BTreeMap<usize, usize>,
    pub unused_chunks: Vec<usize>,
    pub query_details: Vec<CoverageResult>,
    pub recommendations: Vec<Recommendation>,
    pub models: ModelInfo,
}

impl AnalysisResult {
    /// Score rounded to two decimals for presentation.
    pub fn rounded_score(&self) -> f64 {
        (self.score * 100.0).round() / 100.0
    }
}

//! End-to-end pipeline tests against scripted backends.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use query_fanout_core::capability::{Embedder, GenerationOptions, TextGenerator};
use query_fanout_core::models::{GenerationMethod, Priority, SearchMode};
use query_fanout_core::pipeline::{AnalysisError, Analyzer, AnalyzerConfig, PageContent};

const PAGE: &str = "Grind size controls extraction speed for every espresso shot. \
                    Descale the boiler monthly to prevent mineral buildup inside. \
                    Steam wands froth milk for lattes and cappuccinos quickly.";

/// Answers the entity prompt with a fixed entity and every other prompt
/// with `queries_reply`.
struct ScriptedGenerator {
    queries_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(queries_reply: &str) -> Self {
        Self {
            queries_reply: queries_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted-llm"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.starts_with("Extract the main entity") {
            return Ok(
                "```json\n{\"entity_name\": \"Espresso Machines\", \"reasoning\": \"page topic\"}\n```"
                    .to_string(),
            );
        }
        Ok(self.queries_reply.clone())
    }
}

/// One axis per keyword; the vector counts keyword occurrences.
struct KeywordEmbedder;

const AXES: [&str; 5] = ["grind", "descale", "milk", "price", "warranty"];

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-embedder"
    }

    fn dims(&self) -> usize {
        AXES.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                AXES.iter().map(|k| lower.matches(k).count() as f32).collect()
            })
            .collect())
    }
}

fn config() -> AnalyzerConfig {
    AnalyzerConfig {
        chunk_size: 10,
        chunk_overlap: 0,
        mode: SearchMode::Simple,
        ..AnalyzerConfig::default()
    }
}

#[tokio::test]
async fn test_espresso_scenario() {
    let reply = "FACETS:\nMaintenance, preparation, buying\nQUERIES:\n[\
        \"espresso grind size for light roasts\", \
        \"how often to descale an espresso machine\", \
        \"espresso machine price comparison\", \
        \"espresso machine warranty coverage\", \
        \"price and warranty of espresso grinders\"]";
    let generator = ScriptedGenerator::new(reply);
    let analyzer = Analyzer::new(generator, KeywordEmbedder, config());

    let page = PageContent::new("Espresso Machine Care", PAGE);
    let result = analyzer
        .analyze("https://example.com/espresso", &page)
        .await
        .unwrap();

    assert_eq!(result.entity.entity_name, "Espresso Machines");
    assert_eq!(result.query_fanout.original_query, "What is Espresso Machines?");
    assert_eq!(result.query_fanout.generation_method, GenerationMethod::Facets);
    assert_eq!(result.query_fanout.facets_reasoning, "Maintenance, preparation, buying");
    assert_eq!(result.content.chunks_count, 3);
    assert_eq!(result.total_count, 5);
    assert_eq!(result.covered_count, 2);
    assert_eq!(result.score, 40.0);
    assert_eq!(result.similarity_threshold, 0.65);

    let covered: Vec<&str> = result
        .query_details
        .iter()
        .filter(|r| r.covered)
        .map(|r| r.query.as_str())
        .collect();
    assert_eq!(
        covered,
        vec![
            "espresso grind size for light roasts",
            "how often to descale an espresso machine"
        ]
    );
    for r in &result.query_details {
        assert_eq!(r.covered, r.similarity >= 0.65);
        assert_eq!(r.covered, !r.best_chunk_text.is_empty());
    }

    assert_eq!(result.unused_chunks, vec![2]);
    assert_eq!(result.chunk_usage.get(&0), Some(&4));
    assert_eq!(result.chunk_usage.get(&1), Some(&1));

    let overhaul = result
        .recommendations
        .iter()
        .find(|r| r.priority == Priority::Critical)
        .expect("critical overhaul recommendation");
    assert_eq!(overhaul.title, "Comprehensive Content Overhaul");
    assert_eq!(overhaul.affected_queries, 3);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.title == "Add Comparison Content"));

    assert_eq!(result.models.llm, "scripted-llm");
    assert_eq!(result.models.embeddings, "keyword-embedder");
}

#[tokio::test]
async fn test_all_queries_hit_first_chunk() {
    let reply = "QUERIES:\n[\"best grind for espresso\", \"grind consistency tips\", \"burr grind settings\"]";
    let analyzer = Analyzer::new(ScriptedGenerator::new(reply), KeywordEmbedder, config());
    let result = analyzer
        .analyze("https://example.com/grind", &PageContent::new("Grinding", PAGE))
        .await
        .unwrap();

    assert_eq!(result.unused_chunks, vec![1, 2]);
    assert_eq!(result.chunk_usage.get(&0), Some(&3));
    assert_eq!(result.score, 100.0);
    assert!(result
        .recommendations
        .iter()
        .any(|r| r.category == "Content Optimization" && r.description.starts_with("2 content chunks")));
}

#[tokio::test]
async fn test_mode_sets_query_budget() {
    let generator = Arc::new(ScriptedGenerator::new("[\"espresso grind size chart\"]"));
    let analyzer = Analyzer::new(Arc::clone(&generator), KeywordEmbedder, config());
    analyzer
        .analyze("https://example.com", &PageContent::new("Espresso", PAGE))
        .await
        .unwrap();

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("exactly 10"));
}

#[tokio::test]
async fn test_no_queries_is_fatal() {
    let analyzer = Analyzer::new(ScriptedGenerator::new("[]"), KeywordEmbedder, config());
    let err = analyzer
        .analyze("https://example.com/empty", &PageContent::new("Espresso", PAGE))
        .await
        .unwrap_err();

    let AnalysisError::NoQueriesGenerated { url, .. } = &err;
    assert_eq!(url, "https://example.com/empty");
    let failure = err.to_failure();
    assert!(!failure.success);
    assert!(failure.error.starts_with("no queries generated"));
}

#[tokio::test]
async fn test_direct_fallback_in_pipeline() {
    struct TwoStep;

    #[async_trait]
    impl TextGenerator for TwoStep {
        fn model_name(&self) -> &str {
            "two-step"
        }

        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            if prompt.starts_with("Extract the main entity") {
                anyhow::bail!("entity backend unavailable");
            }
            if prompt.contains("FACETS:") {
                return Ok("FACETS:\nnothing useful\nQUERIES:\n".to_string());
            }
            Ok("- milk frothing temperature guide".to_string())
        }
    }

    let analyzer = Analyzer::new(TwoStep, KeywordEmbedder, config());
    let result = analyzer
        .analyze("https://example.com/milk", &PageContent::new("Milk Frothing", PAGE))
        .await
        .unwrap();

    assert_eq!(result.entity.entity_name, "Milk Frothing");
    assert_eq!(result.entity.reasoning, "Fallback");
    assert_eq!(result.query_fanout.generation_method, GenerationMethod::Direct);
    assert_eq!(result.total_count, 1);
    assert_eq!(result.query_details[0].best_chunk_index, Some(2));
    assert!(result.query_details[0].covered);
}

//! Fanout query generation.
//!
//! The primary path is a two-stage "facets" prompt: the model first
//! reasons about the entity's information facets (under a `FACETS:`
//! marker) and then emits the query array (under `QUERIES:`). When that
//! yields no parseable queries, a single-shot direct prompt is tried.
//!
//! Generation never fails outright. An empty [`GeneratedQueries::queries`]
//! is the signal for the caller to abort the analysis.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capability::{GenerationOptions, TextGenerator};
use crate::models::GenerationMethod;
use crate::parse::{parse_queries, Strictness};

const FACETS_MARKER: &str = "FACETS:";
const QUERIES_MARKER: &str = "QUERIES:";

const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 2000;

/// Target share of each query category. Rendered into the facets prompt
/// as percentages; the shares are not required to sum to exactly 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryDistribution {
    #[serde(default = "default_basic")]
    pub basic: f64,
    #[serde(default = "default_technical")]
    pub technical: f64,
    #[serde(default = "default_advanced")]
    pub advanced: f64,
    #[serde(default = "default_business")]
    pub business: f64,
}

fn default_basic() -> f64 {
    0.10
}

fn default_technical() -> f64 {
    0.50
}

fn default_advanced() -> f64 {
    0.20
}

fn default_business() -> f64 {
    0.20
}

impl Default for QueryDistribution {
    fn default() -> Self {
        Self {
            basic: default_basic(),
            technical: default_technical(),
            advanced: default_advanced(),
            business: default_business(),
        }
    }
}

impl QueryDistribution {
    pub fn total(&self) -> f64 {
        self.basic + self.technical + self.advanced + self.business
    }

    /// Whole-number query budget for the basic category (at least 1).
    fn basic_cap(&self, count: usize) -> usize {
        ((self.basic * count as f64).round() as usize).max(1)
    }
}

/// Knobs that shape the prompts and the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationSettings {
    pub distribution: QueryDistribution,
    pub strictness: Strictness,
}

/// Outcome of query generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQueries {
    pub queries: Vec<String>,
    /// The model's facet analysis, `"N/A"` when absent, or an
    /// `"Error: ..."` marker when the backend failed.
    pub facets_reasoning: String,
    pub method: GenerationMethod,
}

fn pct(share: f64) -> u32 {
    (share * 100.0).round() as u32
}

/// The two-stage facets prompt.
pub fn build_facets_prompt(
    entity: &str,
    current_date: &str,
    count: usize,
    distribution: &QueryDistribution,
) -> String {
    format!(
        "You are simulating the query fan-out of a generative search engine.\n\
         Main entity/topic: \"{entity}\"\n\
         Current date: {current_date}\n\n\
         Step 1. Under a line reading {FACETS_MARKER} identify 3-5 key information facets for this entity:\n\
         - Definitional/Explanatory (core concepts, what/why)\n\
         - Practical/Implementation (how-to, tools, methods, step-by-step)\n\
         - Comparative/Analytical (benefits, drawbacks, alternatives, comparison)\n\
         - Current/Temporal (recent trends, updates as of {current_date})\n\
         - Related/Adjacent (sub-topics, related concepts, ecosystem)\n\n\
         Step 2. Under a line reading {QUERIES_MARKER} generate exactly {count} SPECIFIC, TECHNICAL search queries.\n\n\
         Requirements:\n\
         1. Avoid generic queries like \"what is X\" or \"why is X important\"\n\
         2. Focus on implementation details, tools, methods, examples\n\
         3. Include specific scenarios, use cases, or contexts\n\
         4. Reference specific tools, platforms, or technical aspects\n\n\
         Query distribution:\n\
         - {basic}% basic definitional (at most {basic_cap} queries)\n\
         - {technical}% technical implementation (tools, methods, code, examples)\n\
         - {advanced}% advanced optimization (troubleshooting, best practices)\n\
         - {business}% business/comparison (pricing, services, ROI)\n\n\
         After {QUERIES_MARKER} return ONLY a valid JSON array of strings: [\"query1\", \"query2\", ...]",
        basic = pct(distribution.basic),
        basic_cap = distribution.basic_cap(count),
        technical = pct(distribution.technical),
        advanced = pct(distribution.advanced),
        business = pct(distribution.business),
    )
}

/// The single-shot fallback prompt.
pub fn build_direct_prompt(entity: &str, count: usize) -> String {
    format!(
        "Generate {count} unique search queries that users might ask about \"{entity}\".\n\
         Cover reformulations, related queries, implicit queries, comparative queries, \
         entity expansions, and personalized queries.\n\
         Return ONLY a valid JSON array of strings: [\"query1\", \"query2\", ...]"
    )
}

/// Split a facets completion into (reasoning, query section).
///
/// Without a `QUERIES:` marker the whole completion is treated as the
/// query section and the reasoning is `"N/A"`.
pub fn split_facets(completion: &str) -> (String, &str) {
    let Some(q_pos) = completion.find(QUERIES_MARKER) else {
        return ("N/A".to_string(), completion);
    };
    let head = &completion[..q_pos];
    let queries = &completion[q_pos + QUERIES_MARKER.len()..];
    let reasoning = match head.find(FACETS_MARKER) {
        Some(f_pos) => &head[f_pos + FACETS_MARKER.len()..],
        None => head,
    };
    let reasoning = reasoning.trim();
    let reasoning = if reasoning.is_empty() { "N/A" } else { reasoning };
    (reasoning.to_string(), queries)
}

/// Generate up to `count` raw queries for `entity`.
pub async fn generate(
    generator: &dyn TextGenerator,
    entity: &str,
    count: usize,
    settings: &GenerationSettings,
) -> GeneratedQueries {
    let options = GenerationOptions {
        temperature: Some(GENERATION_TEMPERATURE),
        max_tokens: Some(GENERATION_MAX_TOKENS),
    };
    let today = Utc::now().format("%B %d, %Y").to_string();

    let facets_prompt = build_facets_prompt(entity, &today, count, &settings.distribution);
    let facets_reasoning = match generator.generate(&facets_prompt, &options).await {
        Ok(completion) => {
            let (reasoning, section) = split_facets(&completion);
            let (queries, strategy) = parse_queries(section, count, settings.strictness);
            if !queries.is_empty() {
                info!(
                    count = queries.len(),
                    strategy = strategy.unwrap_or("none"),
                    "generated queries via facets prompt"
                );
                return GeneratedQueries {
                    queries,
                    facets_reasoning: reasoning,
                    method: GenerationMethod::Facets,
                };
            }
            warn!("facets prompt yielded no parseable queries, trying direct prompt");
            reasoning
        }
        Err(e) => {
            warn!(error = %e, "facets generation failed, trying direct prompt");
            format!("Error: {e}")
        }
    };

    let direct_prompt = build_direct_prompt(entity, count);
    let queries = match generator.generate(&direct_prompt, &options).await {
        Ok(completion) => {
            let (queries, strategy) = parse_queries(&completion, count, settings.strictness);
            debug!(
                count = queries.len(),
                strategy = strategy.unwrap_or("none"),
                "direct prompt parsed"
            );
            queries
        }
        Err(e) => {
            warn!(error = %e, "direct generation failed");
            Vec::new()
        }
    };

    GeneratedQueries {
        queries,
        facets_reasoning,
        method: GenerationMethod::Direct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a queue; `Err` entries simulate backend failures.
    struct Queue {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Queue {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Queue {
        fn model_name(&self) -> &str {
            "queue"
        }
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(anyhow::anyhow!(e)),
                None => Err(anyhow::anyhow!("no scripted reply")),
            }
        }
    }

    #[test]
    fn test_split_facets() {
        let (reasoning, section) =
            split_facets("FACETS:\n1. Definitional\n2. Practical\nQUERIES:\n[\"a\"]");
        assert_eq!(reasoning, "1. Definitional\n2. Practical");
        assert_eq!(section.trim(), "[\"a\"]");

        let (reasoning, section) = split_facets("[\"only queries\"]");
        assert_eq!(reasoning, "N/A");
        assert_eq!(section, "[\"only queries\"]");
    }

    #[test]
    fn test_facets_prompt_renders_distribution() {
        let prompt = build_facets_prompt("Espresso Machines", "March 01, 2025", 20, &QueryDistribution::default());
        assert!(prompt.contains("\"Espresso Machines\""));
        assert!(prompt.contains("March 01, 2025"));
        assert!(prompt.contains("exactly 20"));
        assert!(prompt.contains("10% basic definitional (at most 2 queries)"));
        assert!(prompt.contains("50% technical"));
        assert!(prompt.contains(FACETS_MARKER));
        assert!(prompt.contains(QUERIES_MARKER));
    }

    #[tokio::test]
    async fn test_generate_via_facets() {
        let gen = Queue::new(vec![Ok(
            "FACETS:\nPractical setup and maintenance\nQUERIES:\n```json\n[\"espresso grind size chart\", \"descaling a breville espresso machine\"]\n```",
        )]);
        let out = generate(&gen, "Espresso Machines", 10, &GenerationSettings::default()).await;
        assert_eq!(out.method, GenerationMethod::Facets);
        assert_eq!(out.queries.len(), 2);
        assert_eq!(out.facets_reasoning, "Practical setup and maintenance");
        assert_eq!(gen.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_falls_back_to_direct() {
        let gen = Queue::new(vec![
            Ok("FACETS:\nSome facets\nQUERIES:\n"),
            Ok("1. espresso vs drip coffee\n2. best espresso machine under $500"),
        ]);
        let out = generate(&gen, "Espresso Machines", 10, &GenerationSettings::default()).await;
        assert_eq!(out.method, GenerationMethod::Direct);
        assert_eq!(
            out.queries,
            vec!["espresso vs drip coffee", "best espresso machine under $500"]
        );
        assert_eq!(out.facets_reasoning, "Some facets");
        let prompts = gen.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("Generate 10 unique search queries"));
    }

    #[tokio::test]
    async fn test_generate_error_then_direct() {
        let gen = Queue::new(vec![Err("rate limited"), Ok("[\"espresso tamping pressure\"]")]);
        let out = generate(&gen, "Espresso Machines", 5, &GenerationSettings::default()).await;
        assert_eq!(out.method, GenerationMethod::Direct);
        assert_eq!(out.queries, vec!["espresso tamping pressure"]);
        assert_eq!(out.facets_reasoning, "Error: rate limited");
    }

    #[tokio::test]
    async fn test_generate_total_failure_is_empty() {
        let gen = Queue::new(vec![Err("down"), Err("still down")]);
        let out = generate(&gen, "Espresso Machines", 5, &GenerationSettings::default()).await;
        assert!(out.queries.is_empty());
        assert!(out.facets_reasoning.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_generate_truncates_to_count() {
        let gen = Queue::new(vec![Ok("QUERIES: [\"one query\", \"two query\", \"three query\"]")]);
        let out = generate(&gen, "X", 2, &GenerationSettings::default()).await;
        assert_eq!(out.queries, vec!["one query", "two query"]);
    }
}

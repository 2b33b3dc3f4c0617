//! Content recommendations.
//!
//! Each rule looks at the scored queries independently; any number of
//! them may fire. Output order follows the rule order below, not
//! priority.
//!
//! | Rule | Fires on | Priority |
//! |------|----------|----------|
//! | Comparison content | uncovered comparative queries | high |
//! | Step-by-step guides | uncovered `how_to_steps` / `tutorial_video/transcript` | high |
//! | FAQ section | uncovered `faq_page` | medium |
//! | Implicit questions | uncovered `keyword` queries | medium |
//! | Content overhaul | score below 50 | critical |
//! | Unused content | chunks no query matched | medium |
//! | Distribution imbalance | a chunk matched by more than 5 queries | low |

use std::collections::BTreeMap;

use crate::coverage::aggregate;
use crate::enrich::is_comparative;
use crate::models::{CoverageResult, Priority, QueryType, Recommendation, RoutingFormat};

/// Maximum example queries per recommendation.
pub const MAX_EXAMPLES: usize = 3;

/// Scores below this trigger the overhaul recommendation.
pub const OVERHAUL_SCORE: f64 = 50.0;

/// A chunk matched by more queries than this is over-relied on.
pub const REPETITION_LIMIT: usize = 5;

fn examples<'a>(queries: impl IntoIterator<Item = &'a CoverageResult>) -> Vec<String> {
    queries
        .into_iter()
        .take(MAX_EXAMPLES)
        .map(|r| r.query.clone())
        .collect()
}

fn rec(
    priority: Priority,
    category: &str,
    title: &str,
    description: String,
    affected: &[&CoverageResult],
) -> Recommendation {
    Recommendation {
        priority,
        category: category.to_string(),
        title: title.to_string(),
        description,
        affected_queries: affected.len(),
        example_queries: examples(affected.iter().copied()),
    }
}

/// An uncovered query asking to weigh options against each other.
pub fn is_comparative_result(r: &CoverageResult) -> bool {
    r.routing_format == RoutingFormat::ComparisonTable || is_comparative(&r.query)
}

/// An uncovered query that never states its question outright.
pub fn is_implicit_result(r: &CoverageResult) -> bool {
    r.query_type == QueryType::Keyword
}

/// Build the recommendation list for one analysis.
pub fn recommend(
    results: &[CoverageResult],
    entity: &str,
    chunk_usage: &BTreeMap<usize, usize>,
    unused_chunks: &[usize],
) -> Vec<Recommendation> {
    let uncovered: Vec<&CoverageResult> = results.iter().filter(|r| !r.covered).collect();
    let mut out = Vec::new();

    let comparative: Vec<_> = uncovered.iter().copied().filter(|r| is_comparative_result(r)).collect();
    if !comparative.is_empty() {
        out.push(rec(
            Priority::High,
            "Content Gap",
            "Add Comparison Content",
            format!("Create comparison tables or sections comparing {entity} with alternatives"),
            &comparative,
        ));
    }

    let steps: Vec<_> = uncovered
        .iter()
        .copied()
        .filter(|r| {
            matches!(
                r.routing_format,
                RoutingFormat::HowToSteps | RoutingFormat::TutorialVideo
            )
        })
        .collect();
    if !steps.is_empty() {
        out.push(rec(
            Priority::High,
            "Content Format",
            "Add Step-by-Step Guides",
            format!("Create detailed how-to guides or tutorials about {entity}"),
            &steps,
        ));
    }

    let faq: Vec<_> = uncovered
        .iter()
        .copied()
        .filter(|r| r.routing_format == RoutingFormat::FaqPage)
        .collect();
    if !faq.is_empty() {
        out.push(rec(
            Priority::Medium,
            "Content Format",
            "Create FAQ Section",
            format!("Add a comprehensive FAQ section addressing common questions about {entity}"),
            &faq,
        ));
    }

    let implicit: Vec<_> = uncovered.iter().copied().filter(|r| is_implicit_result(r)).collect();
    if !implicit.is_empty() {
        out.push(rec(
            Priority::Medium,
            "Content Depth",
            "Address Implicit Questions",
            format!("Add content that answers implicit questions users have about {entity}"),
            &implicit,
        ));
    }

    let summary = aggregate(results);
    if summary.score < OVERHAUL_SCORE {
        out.push(rec(
            Priority::Critical,
            "Overall Strategy",
            "Comprehensive Content Overhaul",
            format!(
                "Your content covers less than 50% of AI search queries. \
                 Consider a complete content audit and expansion strategy for {entity}"
            ),
            &uncovered,
        ));
    }

    if !unused_chunks.is_empty() {
        let n = unused_chunks.len();
        out.push(Recommendation {
            priority: Priority::Medium,
            category: "Content Optimization".to_string(),
            title: "Review Unused Content".to_string(),
            description: format!(
                "{n} content chunk{} never matched any query about {entity}. \
                 They may hold irrelevant content or point to missing query coverage",
                if n == 1 { "" } else { "s" }
            ),
            affected_queries: 0,
            example_queries: Vec::new(),
        });
    }

    let heavy: Vec<usize> = chunk_usage
        .iter()
        .filter(|(_, count)| **count > REPETITION_LIMIT)
        .map(|(&index, _)| index)
        .collect();
    if !heavy.is_empty() {
        let leaning: Vec<&CoverageResult> = results
            .iter()
            .filter(|r| r.best_chunk_index.is_some_and(|i| heavy.contains(&i)))
            .collect();
        let list = heavy
            .iter()
            .map(|i| format!("#{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push(rec(
            Priority::Low,
            "Content Structure",
            "Content Distribution Imbalance",
            format!(
                "Chunk {list} answers more than {REPETITION_LIMIT} queries each. \
                 Spread coverage of {entity} across more sections"
            ),
            &leaning,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich;

    fn scored(query: &str, covered: bool, chunk: usize) -> CoverageResult {
        let q = enrich(query);
        CoverageResult {
            query: q.query,
            query_type: q.query_type,
            user_intent: q.user_intent,
            routing_format: q.routing_format,
            reasoning: q.reasoning,
            format_reason: q.format_reason,
            similarity: if covered { 0.8 } else { 0.3 },
            best_chunk_index: Some(chunk),
            best_chunk_text: String::new(),
            covered,
        }
    }

    fn titles(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_all_covered_no_recommendations() {
        let results = vec![
            scored("espresso vs drip coffee", true, 0),
            scored("how to descale an espresso machine", true, 0),
        ];
        let usage = BTreeMap::from([(0, 2)]);
        assert!(recommend(&results, "Espresso Machines", &usage, &[]).is_empty());
    }

    #[test]
    fn test_comparison_and_steps() {
        let results = vec![
            scored("which is better espresso vs drip coffee", false, 0),
            scored("how to descale an espresso machine", false, 0),
            scored("espresso machine maintenance schedule guide", true, 0),
            scored("breville barista express review roundup", true, 0),
            scored("espresso tamping pressure explained", true, 0),
        ];
        let usage = BTreeMap::from([(0, 5)]);
        let recs = recommend(&results, "Espresso Machines", &usage, &[]);
        assert_eq!(titles(&recs), vec!["Add Comparison Content", "Add Step-by-Step Guides"]);
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(
            recs[0].example_queries,
            vec!["which is better espresso vs drip coffee"]
        );
        assert!(recs[0].description.contains("Espresso Machines"));
        assert_eq!(recs[1].affected_queries, 1);
    }

    #[test]
    fn test_overhaul_below_fifty() {
        let results = vec![
            scored("espresso", false, 0),
            scored("crema", false, 0),
            scored("portafilter", true, 0),
        ];
        let usage = BTreeMap::from([(0, 3)]);
        let recs = recommend(&results, "Espresso Machines", &usage, &[]);
        let overhaul = recs
            .iter()
            .find(|r| r.priority == Priority::Critical)
            .expect("overhaul recommendation");
        assert_eq!(overhaul.title, "Comprehensive Content Overhaul");
        assert_eq!(overhaul.affected_queries, 2);
        // single-word keywords are implicit
        assert!(titles(&recs).contains(&"Address Implicit Questions"));
    }

    #[test]
    fn test_faq_section() {
        let results = vec![
            scored("is it safe to leave an espresso machine on", false, 0),
            scored("espresso machine maintenance schedule guide", true, 0),
        ];
        let usage = BTreeMap::from([(0, 2)]);
        let recs = recommend(&results, "Espresso Machines", &usage, &[]);
        assert_eq!(results[0].routing_format, RoutingFormat::FaqPage);
        assert!(titles(&recs).contains(&"Create FAQ Section"));
    }

    #[test]
    fn test_unused_chunks_notice() {
        let results = vec![scored("espresso machine maintenance schedule guide", true, 0)];
        let usage = BTreeMap::from([(0, 1)]);
        let recs = recommend(&results, "Espresso Machines", &usage, &[1, 2]);
        let notice = recs.iter().find(|r| r.category == "Content Optimization").unwrap();
        assert_eq!(notice.priority, Priority::Medium);
        assert!(notice.description.starts_with("2 content chunks"));
    }

    #[test]
    fn test_imbalance_and_example_cap() {
        let results: Vec<_> = (0..7)
            .map(|i| scored(&format!("espresso machine question number {i} explained"), true, 0))
            .collect();
        let usage = BTreeMap::from([(0, 7)]);
        let recs = recommend(&results, "Espresso Machines", &usage, &[]);
        let imbalance = recs
            .iter()
            .find(|r| r.title == "Content Distribution Imbalance")
            .unwrap();
        assert_eq!(imbalance.priority, Priority::Low);
        assert_eq!(imbalance.affected_queries, 7);
        assert_eq!(imbalance.example_queries.len(), MAX_EXAMPLES);
    }

    #[test]
    fn test_example_cap_on_comparisons() {
        let results: Vec<_> = ["a vs b", "b vs c", "c vs d", "d vs e"]
            .iter()
            .map(|q| scored(q, false, 0))
            .collect();
        let recs = recommend(&results, "Letters", &BTreeMap::new(), &[]);
        assert_eq!(recs[0].affected_queries, 4);
        assert_eq!(recs[0].example_queries.len(), MAX_EXAMPLES);
    }
}

//! Plain-text rendering of analyses for the terminal.
//!
//! `--json` output bypasses this module and prints the serde form.

use query_fanout_core::models::{AnalysisResult, ContentChunk, EnrichedQuery};
use query_fanout_core::pipeline::AnalysisFailure;

use crate::store::{AnalysisSummary, StoredAnalysis, StoredRecord};

const EXCERPT_CHARS: usize = 160;

/// First `max_chars` characters of `text` on one line, with `...` when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

pub fn print_analysis(result: &AnalysisResult) {
    println!("--- Analysis ---");
    println!("url:          {}", result.url);
    println!("timestamp:    {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("entity:       {}", result.entity.entity_name);
    if !result.entity.reasoning.is_empty() {
        println!("reasoning:    {}", result.entity.reasoning);
    }
    println!("title:        {}", result.content.title);
    println!(
        "content:      {} words, {} chunks ({:?})",
        result.content.word_count, result.content.chunks_count, result.content.chunking_method
    );
    println!(
        "fanout:       {} queries, {} ({:?})",
        result.query_fanout.generated_count,
        result.query_fanout.search_mode.label(),
        result.query_fanout.generation_method
    );
    println!("models:       llm={} embeddings={}", result.models.llm, result.models.embeddings);
    println!();

    println!(
        "Visibility score: {:.2}% ({}/{} queries covered, threshold {:.2})",
        result.rounded_score(),
        result.covered_count,
        result.total_count,
        result.similarity_threshold
    );
    println!();

    println!("--- Queries ({}) ---", result.query_details.len());
    for (i, q) in result.query_details.iter().enumerate() {
        let mark = if q.covered { "✓" } else { "✗" };
        println!("{}. {} [{:.3}] {}", i + 1, mark, q.similarity, q.query);
        println!(
            "    type: {}  intent: {}  format: {}",
            q.query_type.as_str(),
            q.user_intent.as_str(),
            q.routing_format
        );
        if let (true, Some(index)) = (q.covered, q.best_chunk_index) {
            println!(
                "    chunk {}: \"{}\"",
                index,
                excerpt(&q.best_chunk_text, EXCERPT_CHARS)
            );
        }
    }
    println!();

    println!("--- Chunk usage ---");
    if result.chunk_usage.is_empty() {
        println!("No chunk matched any query.");
    }
    for (index, count) in &result.chunk_usage {
        println!("chunk {}: {} quer{}", index, count, if *count == 1 { "y" } else { "ies" });
    }
    if !result.unused_chunks.is_empty() {
        let unused: Vec<String> = result.unused_chunks.iter().map(|i| i.to_string()).collect();
        println!("unused: {}", unused.join(", "));
    }
    println!();

    println!("--- Recommendations ({}) ---", result.recommendations.len());
    if result.recommendations.is_empty() {
        println!("None. Coverage looks balanced.");
    }
    for rec in &result.recommendations {
        println!(
            "[{}] {} ({})",
            rec.priority.as_str().to_uppercase(),
            rec.title,
            rec.category
        );
        println!("    {}", rec.description);
        for example in &rec.example_queries {
            println!("    - {}", example);
        }
    }
}

pub fn print_failure(failure: &AnalysisFailure) {
    println!("--- Analysis failed ---");
    println!("url:          {}", failure.url);
    println!("error:        {}", failure.error);
}

pub fn print_record(record: &StoredRecord) {
    println!("id:           {}", record.id);
    println!("recorded_at:  {}", record.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    match &record.analysis {
        StoredAnalysis::Completed(result) => print_analysis(result),
        StoredAnalysis::Failed(failure) => print_failure(failure),
    }
}

pub fn print_history(summaries: &[AnalysisSummary]) {
    if summaries.is_empty() {
        println!("No analyses stored.");
        return;
    }
    for (i, s) in summaries.iter().enumerate() {
        let outcome = match (s.success, s.score) {
            (true, Some(score)) => format!("{:.2}%", score),
            _ => "failed".to_string(),
        };
        println!(
            "{}. [{}] {} / {}",
            i + 1,
            outcome,
            s.entity.as_deref().unwrap_or("(no entity)"),
            s.url
        );
        println!("    recorded: {}", s.recorded_at.format("%Y-%m-%d %H:%M"));
        println!("    id: {}", s.id);
        println!();
    }
}

pub fn print_enriched(queries: &[EnrichedQuery]) {
    for (i, q) in queries.iter().enumerate() {
        println!("{}. {}", i + 1, q.query);
        println!("    type: {}", q.query_type.as_str());
        println!("    intent: {}", q.user_intent.as_str());
        println!("    format: {} ({})", q.routing_format, q.format_reason);
        println!("    reasoning: {}", q.reasoning);
        println!();
    }
}

pub fn print_chunks(chunks: &[ContentChunk]) {
    if chunks.is_empty() {
        println!("No chunks.");
        return;
    }
    for chunk in chunks {
        println!("[chunk {}] {} words", chunk.index, chunk.word_count);
        println!("{}", chunk.text);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_text_unchanged() {
        assert_eq!(excerpt("Dial in the\n grind.", 40), "Dial in the grind.");
    }

    #[test]
    fn test_excerpt_truncates_on_chars() {
        let text = "é".repeat(10);
        assert_eq!(excerpt(&text, 4), "éééé...");
    }
}

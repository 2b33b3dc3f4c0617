//! Main-entity extraction.
//!
//! Asks the generative backend for the page's main topic as strict
//! JSON. Any failure (backend error, unparseable completion, blank
//! name) is recovered by using the page title as the entity.

use tracing::{debug, warn};

use crate::capability::{GenerationOptions, TextGenerator};
use crate::models::Entity;
use crate::parse::parse_json_object;

/// Characters of page content included in the prompt.
pub const CONTENT_PREVIEW_CHARS: usize = 500;

pub const FALLBACK_REASONING: &str = "Fallback";

const ENTITY_TEMPERATURE: f32 = 0.3;

/// Build the extraction prompt from the title and a content preview.
pub fn build_prompt(title: &str, content: &str) -> String {
    let preview: String = content.chars().take(CONTENT_PREVIEW_CHARS).collect();
    format!(
        "Extract the main entity/topic.\n\n\
         Title: {title}\n\
         Content: {preview}\n\n\
         Return JSON:\n\
         {{\"entity_name\": \"main topic\", \"reasoning\": \"why\"}}"
    )
}

/// Identify the page's main entity. Never fails.
pub async fn extract(generator: &dyn TextGenerator, title: &str, content: &str) -> Entity {
    let prompt = build_prompt(title, content);
    let options = GenerationOptions {
        temperature: Some(ENTITY_TEMPERATURE),
        max_tokens: None,
    };

    let completion = match generator.generate(&prompt, &options).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "entity extraction failed, falling back to title");
            return fallback(title);
        }
    };

    match parse_json_object::<Entity>(&completion) {
        Some(entity) if !entity.entity_name.trim().is_empty() => {
            debug!(entity = %entity.entity_name, "entity extracted");
            Entity {
                entity_name: entity.entity_name.trim().to_string(),
                reasoning: entity.reasoning,
            }
        }
        _ => {
            warn!("entity completion was not valid JSON, falling back to title");
            fallback(title)
        }
    }
}

fn fallback(title: &str) -> Entity {
    Entity {
        entity_name: title.to_string(),
        reasoning: FALLBACK_REASONING.to_string(),
    }
}

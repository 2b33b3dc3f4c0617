//! Deterministic query classification.
//!
//! [`enrich`] labels a raw query along four independent dimensions:
//! user intent, routing format, reasoning, and structural type. Every
//! dimension is a pure function of the query text, driven by ordered
//! keyword tables evaluated top-down where the first match wins. Each
//! dimension falls back to its most generic label, so classification
//! never fails.
//!
//! Matching is case-insensitive substring search over a normalized form
//! of the query: lowercased, punctuation other than `-` and `'` replaced
//! by spaces, and padded with a space on both ends. Keywords written with
//! surrounding spaces (e.g. `" vs "`) therefore match whole words only;
//! that is reserved for short tokens that occur inside unrelated words.

use crate::models::{EnrichedQuery, QueryType, RoutingFormat, UserIntent};

/// One row of an ordered keyword table.
#[derive(Debug, Clone, Copy)]
pub struct Rule<T> {
    pub keywords: &'static [&'static str],
    pub label: T,
    pub explanation: &'static str,
}

const fn rule<T>(keywords: &'static [&'static str], label: T, explanation: &'static str) -> Rule<T> {
    Rule {
        keywords,
        label,
        explanation,
    }
}

/// Keywords that mark a query as comparing alternatives.
pub const COMPARISON_KEYWORDS: &[&str] = &[
    " vs ",
    "versus",
    "compare",
    "comparison",
    "difference between",
    "alternative",
];

/// Intent rules, in priority order.
pub const INTENT_RULES: &[Rule<UserIntent>] = &[
    rule(
        &["how to", "tutorial", "guide", "steps", "methods", "process"],
        UserIntent::Informational,
        "learning how something works or is done",
    ),
    rule(
        &[
            "buy", "price", "cost", "pricing", "services", "hire", "purchase", " vs ", "versus",
            "compare", "comparison", "difference", "better",
        ],
        UserIntent::Commercial,
        "evaluating options or providers before spending",
    ),
    rule(
        &["download", "login", "log in", "sign up", "signup", "register", "subscribe"],
        UserIntent::Transactional,
        "completing a concrete action",
    ),
    rule(
        &["navigate", "find", "where is", "locate", "contact"],
        UserIntent::Navigational,
        "reaching a specific place or resource",
    ),
];

/// Routing-format rules, in priority order. Checklist precedes how-to so
/// that "checklist for how to …" routes to a checklist.
pub const FORMAT_RULES: &[Rule<RoutingFormat>] = &[
    rule(
        &["checklist", "check list", "to-do list", "todo list"],
        RoutingFormat::Checklist,
        "A checklist lets readers verify each item in order",
    ),
    rule(
        &["price", "pricing", " cost ", " costs ", "how much", " fee ", " fees "],
        RoutingFormat::PricingPage,
        "A pricing page answers cost and budget questions directly",
    ),
    rule(
        COMPARISON_KEYWORDS,
        RoutingFormat::ComparisonTable,
        "A side-by-side table makes the comparison scannable",
    ),
    rule(
        &["buying guide", "buyer", " buy ", "purchase", "which should i", "worth it"],
        RoutingFormat::BuyersGuide,
        "A buyer's guide supports a purchase decision",
    ),
    rule(
        &[" review", " ratings", " rated ", "roundup", "top 10", "top 5"],
        RoutingFormat::ReviewRoundup,
        "A review roundup summarizes opinions across options",
    ),
    rule(
        &["tutorial", "video", "walkthrough", "course", "youtube"],
        RoutingFormat::TutorialVideo,
        "A tutorial or transcript walks through the process end to end",
    ),
    rule(
        &[
            "how to", "how-to", "how do i", "how can i", "step by step", "step-by-step", "steps to",
            " set up ", "setup", "install", "configure",
        ],
        RoutingFormat::HowToSteps,
        "Numbered steps match a procedural intent",
    ),
    rule(
        &[" code", "script", "python", "javascript", "snippet", " sdk ", "regex", " sql "],
        RoutingFormat::CodeSamples,
        "Code samples give a working implementation to copy",
    ),
    rule(
        &[" api ", " apis ", "endpoint", "webhook"],
        RoutingFormat::ApiReference,
        "An API reference documents parameters and responses",
    ),
    rule(
        &["calculator", "calculate", "estimator", "estimate"],
        RoutingFormat::CalculatorTool,
        "A calculator answers numeric what-if questions",
    ),
    rule(
        &["what is", "what are", " define ", "definition", "meaning of", "glossary", "stand for"],
        RoutingFormat::GlossaryDefinition,
        "A concise definition answers what-is questions",
    ),
    rule(
        &["faq", "frequently asked", "common questions", " can i ", " can you ", " should i ", " is it ", "do i need"],
        RoutingFormat::FaqPage,
        "An FAQ collects short, direct answers",
    ),
    rule(
        &["specs", "specification", "dimensions", "features of", "technical details", "wattage", "capacity"],
        RoutingFormat::ProductSpecSheet,
        "A spec sheet lists technical attributes at a glance",
    ),
    rule(
        &["case study", "case studies", "success story", "real-world", "real world", "results from"],
        RoutingFormat::CaseStudy,
        "A case study proves outcomes with a concrete example",
    ),
    rule(
        &["statistics", " stats ", "dataset", "data on", "benchmark", "survey"],
        RoutingFormat::Dataset,
        "Data and statistics back the answer with numbers",
    ),
    rule(
        &["whitepaper", "white paper", "research paper", " report ", " pdf ", "ebook"],
        RoutingFormat::PdfWhitepaper,
        "A whitepaper covers the subject in research depth",
    ),
    rule(
        &["near me", "nearby", "in my area", " local ", "directions to"],
        RoutingFormat::MapLocalPack,
        "A local pack surfaces nearby providers and locations",
    ),
    rule(
        &["reddit", "forum", "quora", "community", "experiences with", "opinions"],
        RoutingFormat::ForumQna,
        "Forum threads capture first-hand experience",
    ),
    rule(
        &["podcast", "interview", "episode"],
        RoutingFormat::PodcastTranscript,
        "A podcast transcript serves conversational expert discussion",
    ),
    rule(
        &["images", "pictures", "photos", "gallery", "inspiration", "ideas for"],
        RoutingFormat::ImageGallery,
        "A gallery answers visual inspiration queries",
    ),
    rule(
        &["announcement", "announced", "launch", "press release", " news ", "latest update", "release date"],
        RoutingFormat::PressRelease,
        "A press release covers announcements and launches",
    ),
    rule(
        &["interactive", "simulator", "quiz", "configurator", "generator", "checker"],
        RoutingFormat::InteractiveWidget,
        "An interactive widget lets users explore options hands-on",
    ),
];

/// Reasoning templates, in priority order.
pub const REASONING_RULES: &[Rule<&str>] = &[
    rule(
        &["what is", "what are", " define ", "definition", "meaning", "explain"],
        "definition",
        "Seeks a clear definition of the core concept",
    ),
    rule(
        &["how to", "how do", "implement", " set up ", "setup", "install", "configure", "steps", " use "],
        "implementation",
        "Looks for practical implementation guidance",
    ),
    rule(
        &[" vs ", "versus", "compare", "comparison", "difference", "alternative"],
        "comparison",
        "Weighs options against each other before deciding",
    ),
    rule(
        &["optimize", "optimise", "improve", "best practice", "performance", "faster", " tips "],
        "optimization",
        "Wants better results from an existing setup",
    ),
    rule(
        &["price", "pricing", "cost", " roi ", "services", "hire", "agency", "budget"],
        "business",
        "Evaluates commercial value, cost, or providers",
    ),
    rule(
        &["automate", "automation", "script", "workflow", "schedule"],
        "automation",
        "Wants to reduce manual effort through automation",
    ),
    rule(
        &[" fix ", "error", "troubleshoot", "not working", "issue", "problem", "broken"],
        "troubleshooting",
        "Is trying to diagnose and resolve a problem",
    ),
    rule(
        &["tool", "software", "platform", "plugin", " app ", " apps ", "extension"],
        "tools",
        "Is looking for tools or software that support the task",
    ),
];

pub const DEFAULT_FORMAT_REASON: &str = "General informational content format";
pub const DEFAULT_REASONING: &str = "Explores a related facet of the main topic";

const INTERROGATIVES: &[&str] = &[
    "what", "why", "how", "when", "where", "which", "who", "whom", "whose", "is", "are", "can",
    "could", "should", "would", "will", "do", "does", "did",
];

const CONVERSATIONAL_PHRASES: &[&str] = &[" explain", " tell me", " i want to", " help me", " show me"];

/// Lowercase, blank out punctuation (keeping `-` and `'`), pad with spaces.
pub fn normalize(query: &str) -> String {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '\'' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(" {} ", collapsed)
}

fn first_match<'a, T>(rules: &'a [Rule<T>], normalized: &str) -> Option<&'a Rule<T>> {
    rules
        .iter()
        .find(|r| r.keywords.iter().any(|k| normalized.contains(k)))
}

pub fn classify_intent(query: &str) -> UserIntent {
    first_match(INTENT_RULES, &normalize(query))
        .map(|r| r.label)
        .unwrap_or(UserIntent::Informational)
}

/// Routing format plus the one-sentence reason for it.
pub fn classify_format(query: &str) -> (RoutingFormat, &'static str) {
    first_match(FORMAT_RULES, &normalize(query))
        .map(|r| (r.label, r.explanation))
        .unwrap_or((RoutingFormat::WebArticle, DEFAULT_FORMAT_REASON))
}

pub fn classify_reasoning(query: &str) -> &'static str {
    first_match(REASONING_RULES, &normalize(query))
        .map(|r| r.explanation)
        .unwrap_or(DEFAULT_REASONING)
}

pub fn classify_type(query: &str) -> QueryType {
    let trimmed = query.trim();
    let normalized = normalize(trimmed);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let starts_interrogative = words
        .first()
        .map(|w| INTERROGATIVES.contains(w))
        .unwrap_or(false);
    if trimmed.ends_with('?') || starts_interrogative {
        return QueryType::Question;
    }
    if words.len() > 6 {
        return QueryType::LongTail;
    }
    if CONVERSATIONAL_PHRASES.iter().any(|p| normalized.contains(p)) {
        return QueryType::Conversational;
    }
    QueryType::Keyword
}

/// Whether the query compares alternatives.
pub fn is_comparative(query: &str) -> bool {
    let normalized = normalize(query);
    COMPARISON_KEYWORDS.iter().any(|k| normalized.contains(k))
}

/// Classify a raw query. Pure and total.
pub fn enrich(raw_query: &str) -> EnrichedQuery {
    let query = raw_query.trim().to_string();
    let (routing_format, format_reason) = classify_format(&query);
    EnrichedQuery {
        query_type: classify_type(&query),
        user_intent: classify_intent(&query),
        routing_format,
        format_reason: format_reason.to_string(),
        reasoning: classify_reasoning(&query).to_string(),
        query,
    }
}

pub fn enrich_all(raw_queries: &[String]) -> Vec<EnrichedQuery> {
    raw_queries.iter().map(|q| enrich(q)).collect()
}

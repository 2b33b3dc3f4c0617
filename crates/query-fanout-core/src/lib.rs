//! # Query Fanout Core
//!
//! Runtime-free logic for the query-fanout coverage analyzer: data
//! models, word-bounded chunking, deterministic query enrichment,
//! tolerant parsing of model completions, embedding-based coverage
//! scoring, aggregation, and recommendations.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. The
//! generative and embedding backends are reached only through the
//! traits in [`capability`], so the whole pipeline can be driven by
//! scripted fakes in tests.
//!
//! ```text
//! title + content ──▶ entity ──▶ generate ──▶ enrich ─┐
//!                                                     ├─▶ score ──▶ coverage ──▶ recommend
//! content ─────────────────────────────────▶ chunk ───┘
//! ```

pub mod capability;
pub mod chunk;
pub mod coverage;
pub mod enrich;
pub mod entity;
pub mod generate;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod recommend;
pub mod score;

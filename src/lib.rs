//! # Query Fanout
//!
//! Measures how well a web page answers the sub-queries a generative search
//! engine would fan a topic out into.
//!
//! The analysis itself lives in the `query-fanout-core` crate, which only
//! knows about the [`TextGenerator`](query_fanout_core::capability::TextGenerator)
//! and [`Embedder`](query_fanout_core::capability::Embedder) traits. This
//! crate supplies the concrete HTTP/local providers, TOML configuration,
//! history storage, and the `fanout` CLI.
//!
//! ## Architecture
//!
//! ```text
//! page text ──▶ entity ──▶ fanout queries ──▶ enrich
//!                                              │
//!      chunks ◀── chunk ◀── page text          ▼
//!        └──────────────▶ similarity ──▶ coverage ──▶ recommendations
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`generation`] | OpenAI / Ollama text generators |
//! | [`embedding`] | OpenAI / Ollama / local embedders |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`store`] | Analysis history (in-memory and JSON directory) |
//! | [`report`] | Terminal rendering |

pub mod config;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod report;
pub mod store;

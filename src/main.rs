//! # Query Fanout CLI (`fanout`)
//!
//! ## Usage
//!
//! ```bash
//! fanout --config ./config/fanout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fanout analyze` | Run a full coverage analysis of one page |
//! | `fanout enrich <query>...` | Classify queries without any model calls |
//! | `fanout chunk` | Show how a page would be chunked |
//! | `fanout history` | List stored analyses |
//! | `fanout show <id>` | Print a stored analysis |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze a page whose text was saved to page.txt
//! fanout analyze --url https://example.com/espresso --title "Espresso Machines" \
//!     --content-file page.txt --mode simple --save
//!
//! # Machine-readable output
//! fanout analyze --url https://example.com/espresso --content-file page.txt --json
//!
//! # Classification only
//! fanout enrich "how to descale an espresso machine" "espresso vs drip coffee"
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use query_fanout::config::{self, Config};
use query_fanout::embedding::create_embedder;
use query_fanout::generation::create_generator;
use query_fanout::report;
use query_fanout::store::{new_id, JsonDirStore, ResultStore, StoredAnalysis};
use query_fanout_core::chunk::chunk_text;
use query_fanout_core::enrich::enrich_all;
use query_fanout_core::models::SearchMode;
use query_fanout_core::pipeline::{Analyzer, PageContent};
use tracing_subscriber::EnvFilter;

/// Query Fanout: how much of a topic's query fanout does a page answer?
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fanout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fanout",
    about = "Query fanout coverage analyzer",
    version,
    long_about = "Identifies a page's main entity, fans it out into the sub-queries a generative \
    search engine would issue, and measures which of them the page's content answers."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fanout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// 10 queries.
    Simple,
    /// 20 queries.
    Complex,
}

impl From<ModeArg> for SearchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Simple => SearchMode::Simple,
            ModeArg::Complex => SearchMode::Complex,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one page.
    ///
    /// Requires `[generation]` and `[embedding]` providers in the config.
    Analyze {
        /// Page URL, used as the analysis identifier.
        #[arg(long)]
        url: String,

        /// Page title. Defaults to the first non-empty line of the content.
        #[arg(long)]
        title: Option<String>,

        /// File holding the already-extracted page text.
        #[arg(long)]
        content_file: PathBuf,

        /// Query budget preset.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Exact number of queries to request (overrides --mode).
        #[arg(long)]
        queries: Option<usize>,

        /// Coverage threshold in [0, 1].
        #[arg(long)]
        threshold: Option<f32>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Store the outcome in the history directory.
        #[arg(long)]
        save: bool,
    },

    /// Classify queries by type, intent, and format.
    Enrich {
        /// Queries to classify.
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Chunk a page with the mechanical chunker.
    Chunk {
        #[arg(long)]
        content_file: PathBuf,

        /// Chunk size in words (defaults to config).
        #[arg(long)]
        size: Option<usize>,

        /// Overlap in words (defaults to config).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// List stored analyses, newest first.
    History,

    /// Print a stored analysis.
    Show {
        /// Analysis id from `fanout history`.
        id: String,

        #[arg(long)]
        json: bool,
    },
}

fn read_content(path: &Path) -> anyhow::Result<String> {
    use anyhow::Context;
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read content file: {}", path.display()))
}

fn default_title(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

/// `RUST_LOG` when it parses, `info` otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Enrich { queries, json } => {
            let enriched = enrich_all(queries);
            if *json {
                println!("{}", serde_json::to_string_pretty(&enriched)?);
            } else {
                report::print_enriched(&enriched);
            }
            return Ok(());
        }
        Commands::Chunk {
            content_file,
            size,
            overlap,
        } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            let content = read_content(content_file)?;
            let chunks = chunk_text(
                &content,
                size.unwrap_or(cfg.chunking.size_words),
                overlap.unwrap_or(cfg.chunking.overlap_words),
            );
            report::print_chunks(&chunks);
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            url,
            title,
            content_file,
            mode,
            queries,
            threshold,
            json,
            save,
        } => {
            let mut analyzer_config = cfg.analyzer_config();
            if let Some(mode) = mode {
                analyzer_config.mode = mode.into();
                analyzer_config.target_queries = None;
            }
            if let Some(n) = queries {
                if n == 0 {
                    anyhow::bail!("--queries must be >= 1");
                }
                analyzer_config.target_queries = Some(n);
            }
            if let Some(t) = threshold {
                if !(0.0..=1.0).contains(&t) {
                    anyhow::bail!("--threshold must be in [0.0, 1.0]");
                }
                analyzer_config.threshold = t;
            }

            let content = read_content(&content_file)?;
            let title = title.unwrap_or_else(|| default_title(&content));
            let page = PageContent::new(title, content);

            let generator = create_generator(&cfg.generation)?;
            let embedder = create_embedder(&cfg.embedding)?;
            let analyzer = Analyzer::new(generator, embedder, analyzer_config);
            let store = JsonDirStore::new(&cfg.store.dir);

            match analyzer.analyze(&url, &page).await {
                Ok(result) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        report::print_analysis(&result);
                    }
                    if save {
                        let id = new_id();
                        store.put(&id, StoredAnalysis::Completed(result)).await?;
                        eprintln!("Saved analysis {}", id);
                    }
                }
                Err(e) => {
                    let failure = e.to_failure();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&failure)?);
                    } else {
                        report::print_failure(&failure);
                    }
                    if save {
                        let id = new_id();
                        store.put(&id, StoredAnalysis::Failed(failure)).await?;
                        eprintln!("Saved failed analysis {}", id);
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::History => {
            let store = JsonDirStore::new(&cfg.store.dir);
            report::print_history(&store.list().await?);
        }
        Commands::Show { id, json } => {
            let store = JsonDirStore::new(&cfg.store.dir);
            match store.get(&id).await? {
                Some(record) if json => println!("{}", serde_json::to_string_pretty(&record)?),
                Some(record) => report::print_record(&record),
                None => {
                    eprintln!("Error: analysis not found: {}", id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Enrich { .. } | Commands::Chunk { .. } => unreachable!(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_honours_rust_log_level() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title("\n  Espresso Guide \nbody"), "Espresso Guide");
        assert_eq!(default_title("   "), "Untitled");
    }
}

//! TOML configuration for the `fanout` binary.
//!
//! Every section is optional; a missing key takes the default shown in
//! `config/fanout.example.toml`. [`load_config`] parses and validates
//! the file and bails on the first invalid value.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use query_fanout_core::generate::QueryDistribution;
use query_fanout_core::models::SearchMode;
use query_fanout_core::parse::Strictness;
use query_fanout_core::pipeline::{AnalyzerConfig, ChunkingStrategy};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub distribution: QueryDistribution,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_mode")]
    pub mode: SearchMode,
    #[serde(default)]
    pub target_queries: Option<usize>,
    #[serde(default)]
    pub strictness: Strictness,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            mode: default_mode(),
            target_queries: None,
            strictness: Strictness::default(),
        }
    }
}

fn default_threshold() -> f32 {
    0.65
}
fn default_mode() -> SearchMode {
    SearchMode::Complex
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_size_words")]
    pub size_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_breakpoint_percentile")]
    pub breakpoint_percentile: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size_words: default_size_words(),
            overlap_words: default_overlap_words(),
            strategy: default_strategy(),
            breakpoint_percentile: default_breakpoint_percentile(),
        }
    }
}

fn default_size_words() -> usize {
    512
}
fn default_overlap_words() -> usize {
    50
}
fn default_strategy() -> String {
    "mechanical".to_string()
}
fn default_breakpoint_percentile() -> f64 {
    95.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (OpenAI-compatible `/v1` root or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generation_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_generation_max_retries(),
        }
    }
}

fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_generation_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./history")
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// All defaults; used by commands that run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Pipeline settings derived from this configuration.
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        let chunking = match self.chunking.strategy.as_str() {
            "semantic" => ChunkingStrategy::Semantic {
                breakpoint_percentile: self.chunking.breakpoint_percentile,
            },
            _ => ChunkingStrategy::Mechanical,
        };
        AnalyzerConfig {
            threshold: self.analysis.threshold,
            chunk_size: self.chunking.size_words,
            chunk_overlap: self.chunking.overlap_words,
            chunking,
            mode: self.analysis.mode,
            target_queries: self.analysis.target_queries,
            distribution: self.distribution,
            parse_strictness: self.analysis.strictness,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate analysis
    if !(0.0..=1.0).contains(&config.analysis.threshold) {
        bail!("analysis.threshold must be in [0.0, 1.0]");
    }
    if config.analysis.target_queries == Some(0) {
        bail!("analysis.target_queries must be >= 1");
    }

    // Validate chunking
    if config.chunking.size_words == 0 {
        bail!("chunking.size_words must be > 0");
    }
    match config.chunking.strategy.as_str() {
        "mechanical" | "semantic" => {}
        other => bail!(
            "Unknown chunking strategy: '{}'. Must be mechanical or semantic.",
            other
        ),
    }
    if !(0.0..=100.0).contains(&config.chunking.breakpoint_percentile) {
        bail!("chunking.breakpoint_percentile must be in [0, 100]");
    }

    // Validate distribution
    let d = &config.distribution;
    if [d.basic, d.technical, d.advanced, d.business]
        .iter()
        .any(|share| *share < 0.0)
    {
        bail!("distribution shares must be >= 0");
    }
    if d.total() <= 0.0 {
        bail!("distribution shares must not all be zero");
    }

    // Validate providers
    match config.generation.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.generation.is_enabled() && config.generation.model.is_none() {
        bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.analysis.threshold, 0.65);
        assert_eq!(cfg.analysis.mode, SearchMode::Complex);
        assert_eq!(cfg.chunking.size_words, 512);
        assert_eq!(cfg.chunking.overlap_words, 50);
        assert_eq!(cfg.distribution, QueryDistribution::default());
        assert!(!cfg.generation.is_enabled());
        assert!(!cfg.embedding.is_enabled());

        let analyzer = cfg.analyzer_config();
        assert_eq!(analyzer.query_count(), 20);
        assert_eq!(analyzer.chunking, ChunkingStrategy::Mechanical);
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
[analysis]
threshold = 0.75
mode = "simple"
strictness = "strict"

[chunking]
size_words = 256
overlap_words = 25
strategy = "semantic"
breakpoint_percentile = 90.0

[generation]
provider = "ollama"
model = "llama3.1"
url = "http://localhost:11434"

[distribution]
basic = 0.2
technical = 0.4

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768

[store]
dir = "/tmp/fanout-history"
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        let analyzer = cfg.analyzer_config();
        assert_eq!(analyzer.threshold, 0.75);
        assert_eq!(analyzer.query_count(), 10);
        assert_eq!(analyzer.parse_strictness, Strictness::Strict);
        assert_eq!(
            analyzer.chunking,
            ChunkingStrategy::Semantic {
                breakpoint_percentile: 90.0
            }
        );
        assert_eq!(cfg.distribution.basic, 0.2);
        assert_eq!(cfg.distribution.advanced, 0.2);
        assert_eq!(cfg.store.dir, PathBuf::from("/tmp/fanout-history"));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let file = write_config("[analysis]\nthreshold = 1.5\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let file = write_config("[generation]\nprovider = \"gemini\"\nmodel = \"x\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_requires_model() {
        let file = write_config("[embedding]\nprovider = \"openai\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let file = write_config("[chunking]\nstrategy = \"paragraph\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/fanout.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}

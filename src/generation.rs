//! Text-generation providers.
//!
//! Concrete [`TextGenerator`] implementations:
//! - **[`OpenAIGenerator`]**: `POST {base}/chat/completions` on any
//!   OpenAI-compatible endpoint.
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with streaming off.
//!
//! Both use the retry policy in [`crate::http`]. Use [`create_generator`]
//! to build the one named by `[generation].provider`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use query_fanout_core::capability::{GenerationOptions, TextGenerator};

use crate::config::GenerationConfig;
use crate::http::post_json;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

fn model_or_bail(config: &GenerationConfig) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("generation.model required for {} provider", config.provider))
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============ OpenAI ============

/// Chat-completions generator. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    model: String,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = model_or_bail(config)?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base_url = config
            .url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            base_url,
            api_key,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

/// Build the chat-completions request body.
pub fn openai_request(model: &str, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(t) = options.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    if let Some(m) = options.max_tokens {
        body["max_tokens"] = serde_json::json!(m);
    }
    body
}

/// Extract `choices[0].message.content`.
pub fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let body = openai_request(&self.model, prompt, options);
        let url = format!("{}/chat/completions", self.base_url);
        let json = post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

// ============ Ollama ============

/// Generator backed by a local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = model_or_bail(config)?;
        let url = config
            .url
            .as_deref()
            .unwrap_or(OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            url,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

/// Build the `/api/generate` request body.
pub fn ollama_request(model: &str, prompt: &str, options: &GenerationOptions) -> serde_json::Value {
    let mut opts = serde_json::Map::new();
    if let Some(t) = options.temperature {
        opts.insert("temperature".to_string(), serde_json::json!(t));
    }
    if let Some(m) = options.max_tokens {
        opts.insert("num_predict".to_string(), serde_json::json!(m));
    }
    serde_json::json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": opts,
    })
}

pub fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let body = ollama_request(&self.model, prompt, options);
        let url = format!("{}/api/generate", self.url);
        let json = post_json(&self.client, &url, None, &body, self.max_retries, "Ollama").await?;
        parse_ollama_response(&json)
    }
}

/// Create the [`TextGenerator`] named by the configuration.
///
/// | Config Value | Generator |
/// |-------------|----------|
/// | `"openai"` | [`OpenAIGenerator`] |
/// | `"ollama"` | [`OllamaGenerator`] |
///
/// # Errors
///
/// `"disabled"`, unknown providers, a missing model, or a missing
/// `OPENAI_API_KEY` are reported here, before any analysis starts.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        "disabled" => bail!("Generation provider is disabled; set [generation].provider to run an analysis"),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_request_shape() {
        let options = GenerationOptions {
            temperature: Some(0.7),
            max_tokens: Some(2000),
        };
        let body = openai_request("gpt-4o-mini", "hello", &options);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 2000);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);

        let bare = openai_request("m", "p", &GenerationOptions::default());
        assert!(bare.get("temperature").is_none());
    }

    #[test]
    fn test_parse_openai_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "[\"q1\"]" } }]
        });
        assert_eq!(parse_openai_response(&json).unwrap(), "[\"q1\"]");
        assert!(parse_openai_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_ollama_request_shape() {
        let options = GenerationOptions {
            temperature: Some(0.3),
            max_tokens: None,
        };
        let body = ollama_request("llama3.1", "hi", &options);
        assert_eq!(body["stream"], false);
        assert_eq!(body["prompt"], "hi");
        assert!(body["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_parse_ollama_response() {
        let json = serde_json::json!({ "model": "llama3.1", "response": "text", "done": true });
        assert_eq!(parse_ollama_response(&json).unwrap(), "text");
        assert!(parse_ollama_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_create_generator_errors() {
        let disabled = GenerationConfig::default();
        assert!(create_generator(&disabled).is_err());

        let unknown = GenerationConfig {
            provider: "gemini".to_string(),
            ..GenerationConfig::default()
        };
        let err = create_generator(&unknown).err().unwrap();
        assert!(err.to_string().contains("Unknown generation provider"));

        let no_model = GenerationConfig {
            provider: "ollama".to_string(),
            ..GenerationConfig::default()
        };
        assert!(create_generator(&no_model).is_err());
    }

    #[test]
    fn test_create_ollama_generator() {
        let config = GenerationConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.1".to_string()),
            url: Some("http://localhost:11434/".to_string()),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.model_name(), "llama3.1");
    }
}

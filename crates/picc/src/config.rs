//! TOML configuration, loaded once at startup.
//!
//! Secrets are never stored in the file: `llm.api_key_env` and
//! `embedding.api_key_env` name environment variables that [`load_config`]
//! reads once. Everything downstream receives the resolved [`Config`] by
//! reference.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// A structural container must have more visible text than this.
    #[serde(default = "default_min_section_chars")]
    pub min_section_chars: usize,
    /// Pages with less extracted text than this are rejected.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            min_section_chars: default_min_section_chars(),
            min_content_chars: default_min_content_chars(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; PICC-Bot/1.0; +https://picc.com.au)".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_min_section_chars() -> usize {
    200
}
fn default_min_content_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,
    #[serde(default)]
    pub min_similarity: f64,
    /// Budget for `build_context`, in approximate tokens.
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            semantic_limit: default_semantic_limit(),
            min_similarity: 0.0,
            context_tokens: default_context_tokens(),
        }
    }
}

fn default_limit() -> usize {
    20
}
fn default_semantic_limit() -> usize {
    10
}
fn default_context_tokens() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,
    /// Resolved from `api_key_env` by [`load_config`].
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            base_url: default_anthropic_url(),
            api_key_env: default_anthropic_key_env(),
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            base_url: default_openai_url(),
            api_key_env: default_openai_key_env(),
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_batch_size() -> usize {
    64
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Parse and validate a config document. Does not touch the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }

    if config.scraper.timeout_secs == 0 {
        bail!("scraper.timeout_secs must be > 0");
    }

    if config.search.default_limit == 0 || config.search.semantic_limit == 0 {
        bail!("search.default_limit and search.semantic_limit must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.search.min_similarity) {
        bail!("search.min_similarity must be in [0.0, 1.0]");
    }

    match config.llm.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        let provider = &config.embedding.provider;
        if !matches!(config.embedding.dims, Some(d) if d > 0) {
            bail!("embedding provider '{}' needs a positive embedding.dims", provider);
        }
        if config.embedding.model.is_none() {
            bail!("embedding provider '{}' needs embedding.model", provider);
        }
    }

    Ok(config)
}

/// Read, validate, and resolve secrets for the config at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    resolve_secrets(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Fill `api_key` fields for enabled providers using `lookup`.
pub fn resolve_secrets<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if config.llm.is_enabled() {
        let key = lookup(&config.llm.api_key_env).filter(|k| !k.is_empty());
        if key.is_none() {
            bail!(
                "{} must be set when llm.provider is '{}'",
                config.llm.api_key_env,
                config.llm.provider
            );
        }
        config.llm.api_key = key;
    }

    if config.embedding.is_enabled() {
        let key = lookup(&config.embedding.api_key_env).filter(|k| !k.is_empty());
        if key.is_none() {
            bail!(
                "{} must be set when embedding.provider is '{}'",
                config.embedding.api_key_env,
                config.embedding.provider
            );
        }
        config.embedding.api_key = key;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let c = parse_config("[db]\npath = \"./data/picc.sqlite\"\n").unwrap();
        assert_eq!(c.chunking.chunk_size, 1000);
        assert_eq!(c.scraper.timeout_secs, 30);
        assert_eq!(c.scraper.min_section_chars, 200);
        assert_eq!(c.scraper.min_content_chars, 100);
        assert!(c.scraper.user_agent.contains("PICC-Bot/1.0"));
        assert_eq!(c.search.default_limit, 20);
        assert!(!c.llm.is_enabled());
        assert!(!c.embedding.is_enabled());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = "[db]\npath = \"x.sqlite\"\n";
        for extra in [
            "[chunking]\nchunk_size = 0\n",
            "[search]\nmin_similarity = 1.5\n",
            "[llm]\nprovider = \"gpt\"\n",
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n",
            "[embedding]\nprovider = \"local\"\n",
        ] {
            let doc = format!("{}{}", base, extra);
            assert!(parse_config(&doc).is_err(), "accepted: {}", extra);
        }
    }

    #[test]
    fn test_secrets_resolved_once_from_lookup() {
        let mut c = parse_config(
            "[db]\npath = \"x.sqlite\"\n[llm]\nprovider = \"anthropic\"\napi_key_env = \"PICC_TEST_KEY\"\n",
        )
        .unwrap();
        assert!(resolve_secrets(&mut c.clone(), |_| None).is_err());

        resolve_secrets(&mut c, |name| {
            (name == "PICC_TEST_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        assert_eq!(c.llm.api_key.as_deref(), Some("sk-test"));
    }
}

//! Configuration loading and path helpers.
//!
//! Uses Figment to merge `propgen.toml` + `propgen.<env>.toml` + `PROPGEN_*`
//! env vars into typed settings structs. Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 150 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidate pool size fetched from the vector index.
    pub candidate_k: usize,
    /// Final result count after reranking.
    pub final_k: usize,
    /// Reranked entries scoring below this are dropped.
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { candidate_k: 20, final_k: 4, min_score: 0.05 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// Base URL of an OpenAI-compatible `/v1/rerank` endpoint. When unset,
    /// the deterministic lexical scorer is used instead.
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
    /// Domain keyword set; each distinct match boosts a candidate's score.
    /// Tuned per deployment, not a fixed vocabulary.
    pub keywords: Vec<String>,
    pub boost_per_keyword: f32,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 30,
            keywords: vec![
                "objective".to_string(),
                "security".to_string(),
                "crisis management".to_string(),
                "simulated exercise".to_string(),
            ],
            boost_per_keyword: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// OpenAI-compatible chat-completions endpoint.
    pub base_url: String,
    pub model: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Maximum character length of the assembled retrieval context.
    pub context_budget: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 60,
            context_budget: 12_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub rerank: RerankSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("propgen.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("propgen.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("propgen.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("propgen.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("PROPGEN_").split("__"));

        let settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("failed to load settings: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }
        if self.retrieval.final_k > self.retrieval.candidate_k {
            anyhow::bail!("retrieval.final_k cannot exceed retrieval.candidate_k");
        }
        if self.generation.context_budget == 0 {
            anyhow::bail!("generation.context_budget must be positive");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after
/// expansion. Absolute paths are returned as-is.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

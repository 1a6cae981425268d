//! Configuration management for scopegen
//!
//! Provides TOML-based configuration with defaults, environment overrides and
//! validation. Location: ~/.scopegen/config.toml unless `--config` is given.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embedding::Pooling;
use crate::errors::{Result, ScopeError};
use crate::prompt::PromptTemplate;

/// Environment variable holding the hosted API key
pub const ENV_API_KEY: &str = "SCOPEGEN_API_KEY";
/// Fallback environment variable for the Gemini API key
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable overriding the generation model
pub const ENV_MODEL: &str = "SCOPEGEN_MODEL";
/// Environment variable overriding the SQLite database path
pub const ENV_DATABASE: &str = "SCOPEGEN_DATABASE";

/// Complete configuration for scopegen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Which LLM backend answers the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// `ollama run <model>` with the prompt on stdin
    OllamaCli,
    /// Ollama HTTP API (`/api/generate`)
    OllamaHttp,
    /// Hosted Gemini `generateContent` API
    Gemini,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::OllamaCli => "ollama-cli",
            Backend::OllamaHttp => "ollama-http",
            Backend::Gemini => "gemini",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama-cli" | "ollama" => Ok(Backend::OllamaCli),
            "ollama-http" => Ok(Backend::OllamaHttp),
            "gemini" => Ok(Backend::Gemini),
            other => Err(format!(
                "unknown backend '{}' (expected ollama-cli, ollama-http or gemini)",
                other
            )),
        }
    }
}

/// What to do when the relational sink fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    /// Log the failure and keep going without relational persistence
    BestEffort,
    /// Abort the run
    Strict,
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub backend: Backend,
    pub model: String,
    pub host: String,
    pub port: u16,
    /// Only used by the hosted backend; prefer the environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub api_base: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_id: String,
    pub pooling: Pooling,
}

/// Text splitter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Split points tried in order; the built-in paragraph/line/word/char list when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separators: Option<Vec<String>>,
}

/// Relational sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub enabled: bool,
    pub database_path: String,
    pub policy: StoragePolicy,
}

/// Artifact locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub vector_dir: String,
    pub index_file: String,
    pub texts_file: String,
    pub output_json: String,
    pub output_csv: String,
    pub output_xlsx: String,
}

/// Prompt selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub template: PromptTemplate,
    /// Upper bound on context characters sent to the model, 0 = unlimited
    pub max_context_chars: usize,
    pub default_query: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: Backend::OllamaCli,
            model: "llama3.1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 11434,
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.0,
            timeout_secs: 600,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "BAAI/bge-small-en".to_string(),
            pooling: Pooling::Cls,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: "rag_scope.db".to_string(),
            policy: StoragePolicy::BestEffort,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vector_dir: "vector_store".to_string(),
            index_file: "index.faiss".to_string(),
            texts_file: "texts.json".to_string(),
            output_json: "scope_output.json".to_string(),
            output_csv: "scope_of_work.csv".to_string(),
            output_xlsx: "scope_of_work.xlsx".to_string(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: PromptTemplate::Modules,
            max_context_chars: 0,
            default_query: "Generate a structured Scope of Work in JSON based on the attached \
                            document. Group by module, and describe each feature clearly."
                .to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults, apply environment
    /// overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`] but without validation, for callers that layer
    /// further overrides on top or report problems themselves
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::load_default()?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ScopeError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| ScopeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".scopegen").join("config.toml"))
    }

    /// Overlay values from the environment. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY).or_else(|| non_empty(ENV_GEMINI_API_KEY)) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.generation.model = model;
        }
        if let Some(db) = non_empty(ENV_DATABASE) {
            self.storage.database_path = db;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(ScopeError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ScopeError::Config(
                "chunk_overlap must be less than chunk_size".to_string(),
            ));
        }

        if self.generation.model.trim().is_empty() {
            return Err(ScopeError::Config("model must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ScopeError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.generation.backend == Backend::Gemini
            && self
                .generation
                .api_key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
        {
            return Err(ScopeError::Config(format!(
                "gemini backend requires an API key (set {} or {})",
                ENV_API_KEY, ENV_GEMINI_API_KEY
            )));
        }

        if self.embedding.model_id.trim().is_empty() {
            return Err(ScopeError::Config("embedding model_id must not be empty".to_string()));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ScopeError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScopeError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ScopeError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Get Ollama base URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.generation.host, self.generation.port)
    }

    /// Path of the persisted similarity index
    pub fn index_path(&self) -> PathBuf {
        Path::new(&self.paths.vector_dir).join(&self.paths.index_file)
    }

    /// Path of the chunk-text side file
    pub fn texts_path(&self) -> PathBuf {
        Path::new(&self.paths.vector_dir).join(&self.paths.texts_file)
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// SQLite database path with tilde expanded
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.storage.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.backend, Backend::OllamaCli);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.storage.policy, StoragePolicy::BestEffort);
        assert_eq!(config.index_path(), PathBuf::from("vector_store/index.faiss"));
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gemini_requires_key() {
        let mut config = Config::default();
        config.generation.backend = Backend::Gemini;
        assert!(config.validate().is_err());

        config.generation.api_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_GEMINI_API_KEY, "from-env"),
            (ENV_MODEL, "mistral"),
            (ENV_DATABASE, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.generation.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.generation.model, "mistral");
        // blank values are ignored
        assert_eq!(config.storage.database_path, "rag_scope.db");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [generation]
            backend = "ollama-http"
            model = "mistral"
            host = "localhost"
            port = 8080
            api_base = "unused"
            temperature = 0.0
            timeout_secs = 30

            [storage]
            enabled = false
            database_path = "x.db"
            policy = "strict"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.generation.backend, Backend::OllamaHttp);
        assert_eq!(config.storage.policy, StoragePolicy::Strict);
        assert_eq!(config.ollama_url(), "http://localhost:8080");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.prompt.template, PromptTemplate::Modules);
        assert!(config.chunking.separators.is_none());
    }

    #[test]
    fn test_chunking_separators_from_toml() {
        let toml_str = r#"
            [chunking]
            chunk_size = 200
            chunk_overlap = 20
            separators = ["\n## ", "\n", " "]
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.chunking.separators,
            Some(vec!["\n## ".to_string(), "\n".to_string(), " ".to_string()])
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.prompt.template = PromptTemplate::FullPlan;
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.prompt.template, PromptTemplate::FullPlan);
    }

    #[test]
    fn test_resolve_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

        assert!(Config::resolve(Some(&path)).is_ok());
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("gemini".parse::<Backend>().unwrap(), Backend::Gemini);
        assert_eq!("Ollama".parse::<Backend>().unwrap(), Backend::OllamaCli);
        assert!("openai".parse::<Backend>().is_err());
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let expanded = Config::expand_path("/absolute/path");
        assert_eq!(expanded.to_string_lossy(), "/absolute/path");
    }
}

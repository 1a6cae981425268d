//! LLM generation backends
//!
//! Every backend is request/response: one prompt in, the full completion
//! text out. The pipeline only sees the [`Generator`] trait.

pub mod gemini;
pub mod ollama;
pub mod ollama_cli;

use async_trait::async_trait;

use crate::config::{Backend, Config};
use crate::errors::Result;

pub use gemini::GeminiGenerator;
pub use ollama::OllamaHttpGenerator;
pub use ollama_cli::OllamaCliGenerator;

/// Sends a prompt to a language model and returns its raw text output
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`; transport and process failures are `Generation` errors
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Human-readable backend/model label
    fn name(&self) -> String;
}

/// Construct the backend selected in the configuration
pub fn build_generator(config: &Config) -> Result<Box<dyn Generator>> {
    let generation = &config.generation;
    let generator: Box<dyn Generator> = match generation.backend {
        Backend::OllamaCli => Box::new(OllamaCliGenerator::from_config(generation)),
        Backend::OllamaHttp => Box::new(OllamaHttpGenerator::with_config(
            &config.ollama_url(),
            generation,
        )?),
        Backend::Gemini => Box::new(GeminiGenerator::from_config(generation)?),
    };
    Ok(generator)
}

//! `ollama run <model>` subprocess backend

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::Generator;
use crate::config::GenerationConfig;
use crate::errors::{Result, ScopeError};

/// Runs the local Ollama CLI with the prompt on stdin
#[derive(Debug, Clone)]
pub struct OllamaCliGenerator {
    program: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaCliGenerator {
    pub fn new(model: &str, timeout_secs: u64) -> Self {
        Self {
            program: "ollama".to_string(),
            model: model.to_string(),
            timeout_secs,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(&config.model, config.timeout_secs)
    }

    /// Use a different executable (tests, non-standard installs)
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn run(&self, prompt: &str) -> Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .arg("run")
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScopeError::Generation(format!("Failed to start '{}': {}", self.program, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await.map_err(|e| {
                ScopeError::Generation(format!("Failed to write prompt: {}", e))
            })?;
            // dropping stdin closes the pipe so the model sees EOF
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| ScopeError::Generation(format!("Failed to read model output: {}", e)))
    }
}

#[async_trait]
impl Generator for OllamaCliGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let output = match timeout(Duration::from_secs(self.timeout_secs), self.run(prompt)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ScopeError::Generation(format!(
                    "'{} run {}' timed out after {}s",
                    self.program, self.model, self.timeout_secs
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScopeError::Generation(format!(
                "'{} run {}' exited with {}: {}",
                self.program,
                self.model,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn name(&self) -> String {
        format!("ollama-cli:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_generation_error() {
        let generator =
            OllamaCliGenerator::new("llama3.1", 5).with_program("scopegen-no-such-binary");
        let err = generator.generate("hello").await.unwrap_err();
        assert!(matches!(err, ScopeError::Generation(_)));
    }

    #[test]
    fn test_name_includes_model() {
        let generator = OllamaCliGenerator::from_config(&GenerationConfig::default());
        assert_eq!(generator.name(), "ollama-cli:llama3.1");
        assert_eq!(generator.model(), "llama3.1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let generator = OllamaCliGenerator::new("llama3.1", 5).with_program("false");
        assert!(generator.generate("x").await.is_err());
    }
}

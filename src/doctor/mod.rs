//! Doctor command for environment diagnostics
//!
//! Checks that a run can succeed before spending minutes on a document:
//! configuration, generation backend, embedding model cache, relational
//! store and the filesystem.

use colored::*;
use hf_hub::Cache;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::System;
use tokio::process::Command;

use crate::config::{Backend, Config};
use crate::generation::OllamaHttpGenerator;
use crate::store::ChunkStore;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config: Config,
    working_dir: PathBuf,
}

impl Doctor {
    pub fn new(config: Config, working_dir: PathBuf) -> Self {
        Self {
            config,
            working_dir,
        }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = vec![self.check_config()];

        checks.push(self.check_backend().await);
        if self.config.generation.backend != Backend::Gemini {
            checks.push(self.check_model_installed().await);
        }
        checks.push(self.check_embedding_cache());
        checks.push(self.check_database());
        checks.push(self.check_permissions());
        checks.push(self.check_disk_space());
        checks.push(self.check_memory());

        checks
    }

    fn check_config(&self) -> HealthCheck {
        match self.config.validate() {
            Ok(()) => HealthCheck::new("Configuration", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Configuration", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_backend(&self) -> HealthCheck {
        let generation = &self.config.generation;
        let name = format!("Backend ({})", generation.backend.as_str());

        let status = match generation.backend {
            Backend::OllamaCli => {
                let version_cmd = Command::new("ollama")
                    .arg("--version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status();
                match tokio::time::timeout(Duration::from_secs(10), version_cmd).await {
                    Ok(Ok(status)) if status.success() => HealthStatus::Pass,
                    Ok(Ok(status)) => {
                        HealthStatus::Fail(format!("'ollama --version' exited with {}", status))
                    }
                    Ok(Err(_)) => {
                        HealthStatus::Fail("ollama binary not found on PATH".to_string())
                    }
                    Err(_) => HealthStatus::Warn("'ollama --version' timed out".to_string()),
                }
            }
            Backend::OllamaHttp => match self.ollama_client() {
                Some(client) => match client.health_check().await {
                    Ok(true) => HealthStatus::Pass,
                    _ => HealthStatus::Fail(format!(
                        "Ollama not reachable at {}",
                        self.config.ollama_url()
                    )),
                },
                None => HealthStatus::Fail("Could not build HTTP client".to_string()),
            },
            Backend::Gemini => {
                let has_key = generation
                    .api_key
                    .as_deref()
                    .map(|k| !k.trim().is_empty())
                    .unwrap_or(false);
                if has_key {
                    HealthStatus::Pass
                } else {
                    HealthStatus::Fail(
                        "No API key (set SCOPEGEN_API_KEY or GEMINI_API_KEY)".to_string(),
                    )
                }
            }
        };

        HealthCheck { name, status }
    }

    async fn check_model_installed(&self) -> HealthCheck {
        let wanted = &self.config.generation.model;
        let name = "Generation Model";

        let Some(client) = self.ollama_client() else {
            return HealthCheck::new(name, HealthStatus::Warn("Cannot check models".to_string()));
        };

        match client.list_models().await {
            Ok(models) if models.iter().any(|m| model_matches(m, wanted)) => {
                HealthCheck::new(name, HealthStatus::Pass)
            }
            Ok(models) if models.is_empty() => {
                HealthCheck::new(name, HealthStatus::Warn("No models installed".to_string()))
            }
            Ok(_) => HealthCheck::new(
                name,
                HealthStatus::Warn(format!(
                    "'{}' is not installed (ollama pull {})",
                    wanted, wanted
                )),
            ),
            Err(e) => HealthCheck::new(
                name,
                HealthStatus::Warn(format!("Cannot check models: {}", e)),
            ),
        }
    }

    fn check_embedding_cache(&self) -> HealthCheck {
        let model_id = &self.config.embedding.model_id;
        let cached = Cache::default()
            .model(model_id.clone())
            .get("model.safetensors")
            .is_some();

        if cached {
            HealthCheck::new("Embedding Model", HealthStatus::Pass)
        } else {
            HealthCheck::new(
                "Embedding Model",
                HealthStatus::Warn(format!("{} will be downloaded on first run", model_id)),
            )
        }
    }

    fn check_database(&self) -> HealthCheck {
        let name = "Relational Store";
        if !self.config.storage.enabled {
            return HealthCheck::new(
                name,
                HealthStatus::Warn("Disabled in configuration".to_string()),
            );
        }

        let path = self.config.database_path();
        if !path.exists() {
            return HealthCheck::new(name, HealthStatus::Pass);
        }

        match ChunkStore::open(&path) {
            Ok(_) => HealthCheck::new(name, HealthStatus::Pass),
            Err(e) => HealthCheck::new(name, HealthStatus::Fail(e.to_string())),
        }
    }

    fn check_permissions(&self) -> HealthCheck {
        if !self.working_dir.exists() {
            return HealthCheck::new(
                "Permissions",
                HealthStatus::Fail("Working directory does not exist".to_string()),
            );
        }

        let test_file = self.working_dir.join(".scopegen_write_test");
        match std::fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_file);
                HealthCheck::new("Permissions", HealthStatus::Pass)
            }
            Err(_) => HealthCheck::new(
                "Permissions",
                HealthStatus::Fail("No write permission in working directory".to_string()),
            ),
        }
    }

    fn check_disk_space(&self) -> HealthCheck {
        use sysinfo::Disks;
        let disks = Disks::new_with_refreshed_list();

        // longest matching mount point wins
        let disk = disks
            .iter()
            .filter(|d| self.working_dir.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());

        let Some(disk) = disk else {
            return HealthCheck::new(
                "Disk Space",
                HealthStatus::Warn("Could not determine disk space".to_string()),
            );
        };

        let available_gb = disk.available_space() / (1024 * 1024 * 1024);
        let status = if available_gb < 1 {
            HealthStatus::Fail(format!("Less than 1GB available ({} GB)", available_gb))
        } else if available_gb < 2 {
            HealthStatus::Warn(format!("Low disk space ({} GB available)", available_gb))
        } else {
            HealthStatus::Pass
        };
        HealthCheck::new("Disk Space", status)
    }

    fn check_memory(&self) -> HealthCheck {
        let mut sys = System::new();
        sys.refresh_memory();

        let available_gb = sys.available_memory() / (1024 * 1024 * 1024);
        let status = if available_gb < 1 {
            HealthStatus::Warn(format!(
                "Less than 1GB RAM available ({} GB); embedding may be slow",
                available_gb
            ))
        } else {
            HealthStatus::Pass
        };
        HealthCheck::new("Memory", status)
    }

    fn ollama_client(&self) -> Option<OllamaHttpGenerator> {
        let mut generation = self.config.generation.clone();
        generation.timeout_secs = 5;
        OllamaHttpGenerator::with_config(&self.config.ollama_url(), &generation).ok()
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "scopegen Diagnostics".bold());
        println!("{:<24} Status", "Check");
        println!("{}", "=".repeat(60));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("{} {}", "WARN:".yellow(), msg),
                HealthStatus::Fail(msg) => format!("{} {}", "FAIL:".red(), msg),
            };
            println!("{:<24} {}", check.name, status);
        }

        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

/// `llama3.1` matches `llama3.1:latest`
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || installed
            .strip_prefix(wanted)
            .map(|rest| rest.starts_with(':'))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        let checks = vec![
            HealthCheck::new("a", HealthStatus::Pass),
            HealthCheck::new("b", HealthStatus::Warn("warning".to_string())),
        ];
        assert!(Doctor::overall_status(&checks));

        let checks = vec![
            HealthCheck::new("a", HealthStatus::Pass),
            HealthCheck::new("b", HealthStatus::Fail("error".to_string())),
        ];
        assert!(!Doctor::overall_status(&checks));
    }

    #[test]
    fn test_model_matches() {
        assert!(model_matches("llama3.1:latest", "llama3.1"));
        assert!(model_matches("mistral", "mistral"));
        assert!(!model_matches("llama3.10:latest", "llama3.1"));
        assert!(!model_matches("llama3.1", "llama3.1:8b"));
    }

    #[test]
    fn test_config_check_fails_on_invalid_config() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        let doctor = Doctor::new(config, std::env::temp_dir());
        assert!(matches!(doctor.check_config().status, HealthStatus::Fail(_)));
    }

    #[tokio::test]
    async fn test_gemini_backend_without_key() {
        let mut config = Config::default();
        config.generation.backend = Backend::Gemini;
        config.generation.api_key = None;
        let doctor = Doctor::new(config, std::env::temp_dir());
        assert!(matches!(doctor.check_backend().await.status, HealthStatus::Fail(_)));
    }

    #[test]
    fn test_permissions_in_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let doctor = Doctor::new(Config::default(), dir.path().to_path_buf());
        assert_eq!(doctor.check_permissions().status, HealthStatus::Pass);

        let missing = Doctor::new(Config::default(), dir.path().join("nope"));
        assert!(matches!(missing.check_permissions().status, HealthStatus::Fail(_)));
    }

    #[test]
    fn test_database_check_with_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.database_path = dir.path().join("db.sqlite").to_string_lossy().into_owned();
        ChunkStore::open(&config.database_path()).unwrap();

        let doctor = Doctor::new(config, dir.path().to_path_buf());
        assert_eq!(doctor.check_database().status, HealthStatus::Pass);
    }
}

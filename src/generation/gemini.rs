//! Hosted Gemini `generateContent` backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Generator;
use crate::config::GenerationConfig;
use crate::errors::{Result, ScopeError};

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScopeError::Config("the gemini backend needs an API key".to_string())
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationSettings {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request(prompt))
            .send()
            .await
            .map_err(|e| ScopeError::Generation(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ScopeError::Generation(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ScopeError::Generation(format!("Malformed response: {}", e)))?;

        body.text()
            .ok_or_else(|| ScopeError::Generation("response contained no candidates".to_string()))
    }

    fn name(&self) -> String {
        format!("gemini:{}", self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationSettings {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        Some(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> GenerationConfig {
        GenerationConfig {
            model: "gemini-1.5-flash".to_string(),
            api_key: Some("test-key".to_string()),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let mut config = config_with_key();
        config.api_key = Some("   ".to_string());
        assert!(matches!(
            GeminiGenerator::from_config(&config),
            Err(ScopeError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_and_request_shape() {
        let generator = GeminiGenerator::from_config(&config_with_key()).unwrap();
        assert_eq!(
            generator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );

        let body = serde_json::to_value(generator.request("hello")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert_eq!(generator.name(), "gemini:gemini-1.5-flash");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"scope_of_work\":"},{"text":" []}"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.text().unwrap(), "{\"scope_of_work\": []}");
    }

    #[test]
    fn test_response_without_candidates() {
        let body: GenerateContentResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(body.text().is_none());
    }
}

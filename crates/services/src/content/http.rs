use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ContentGenerator;
use crate::error::ContentGenerationError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Clone, Debug)]
pub struct ContentGeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ContentGeneratorConfig {
    /// Read `CURRICULUM_AI_*` variables. `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("CURRICULUM_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("CURRICULUM_AI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("CURRICULUM_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// `ContentGenerator` backed by a chat completions API.
///
/// Without a config every call fails with `ContentGenerationError::Disabled`.
#[derive(Clone)]
pub struct HttpContentGenerator {
    client: Client,
    config: Option<ContentGeneratorConfig>,
}

impl HttpContentGenerator {
    /// # Errors
    ///
    /// Returns `ContentGenerationError::Http` if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ContentGenerationError> {
        Self::new(ContentGeneratorConfig::from_env())
    }

    /// # Errors
    ///
    /// Returns `ContentGenerationError::Http` if the HTTP client cannot be
    /// built, e.g. when the TLS backend fails to initialize.
    pub fn new(config: Option<ContentGeneratorConfig>) -> Result<Self, ContentGenerationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .inspect_err(|err| {
                tracing::error!(error = %err, "failed to build content generator HTTP client");
            })?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, ContentGenerationError> {
        let config = self
            .config
            .as_ref()
            .ok_or(ContentGenerationError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ContentGenerationError::Timeout(REQUEST_TIMEOUT)
                } else {
                    ContentGenerationError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "content generator returned an error status");
            return Err(ContentGenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ContentGenerationError::EmptyResponse)?;

        tracing::debug!(response_len = content.len(), "content generated");
        Ok(content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> HttpContentGenerator {
        HttpContentGenerator::new(Some(ContentGeneratorConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: "test-key".into(),
            model: "test-model".into(),
        }))
        .expect("http client")
    }

    #[tokio::test]
    async fn returns_trimmed_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  {\"title\": \"Review\"}\n"}}]
            })))
            .mount(&server)
            .await;

        let content = generator(&server).generate("prompt").await.unwrap();
        assert_eq!(content, "{\"title\": \"Review\"}");
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = generator(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(
            err,
            ContentGenerationError::HttpStatus(status) if status.as_u16() == 500
        ));
    }

    #[tokio::test]
    async fn missing_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let err = generator(&server).generate("prompt").await.unwrap_err();
        assert!(matches!(err, ContentGenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn unconfigured_generator_is_disabled() {
        let generator = HttpContentGenerator::new(None).expect("http client");
        assert!(!generator.enabled());
        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, ContentGenerationError::Disabled));
    }
}

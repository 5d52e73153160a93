//! Azure OpenAI chat-completion client.
//!
//! Agents talk to the model through the [`ChatModel`] trait so the
//! pipeline can run against a stub. [`AzureClient`] is the real thing:
//! one deployment, one API key, one request per call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_AZURE_ENDPOINT: &str = "https://rstapestryopenai2.openai.azure.com/";
pub const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Where the chat deployment lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_AZURE_ENDPOINT.to_string(),
            deployment: DEFAULT_AZURE_DEPLOYMENT.to_string(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
        }
    }
}

impl AzureSettings {
    pub fn chat_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!(
            "{base}/openai/deployments/{}/chat/completions?api-version={}",
            self.deployment, self.api_version
        )
    }
}

/// A message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Anything that can answer a chat request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Minimal request that proves the endpoint and key work.
    async fn probe(&self) -> Result<(), LlmError> {
        let request = ChatRequest {
            messages: vec![ChatMessage::system("Test connection.")],
            temperature: None,
            max_tokens: Some(5),
        };
        self.chat(&request).await.map(|_| ())
    }
}

/// Builds a bound [`ChatModel`] from a user-supplied key. Must not do I/O.
pub trait ModelProvider: Send + Sync {
    fn connect(&self, api_key: &str, settings: &AzureSettings) -> Arc<dyn ChatModel>;
}

/// Provider for real Azure clients, sharing one connection pool.
#[derive(Debug, Clone, Default)]
pub struct AzureProvider {
    http: reqwest::Client,
}

impl ModelProvider for AzureProvider {
    fn connect(&self, api_key: &str, settings: &AzureSettings) -> Arc<dyn ChatModel> {
        Arc::new(AzureClient::with_http(
            api_key.to_string(),
            settings.clone(),
            self.http.clone(),
        ))
    }
}

/// Azure OpenAI client bound to one deployment.
pub struct AzureClient {
    api_key: String,
    settings: AzureSettings,
    http: reqwest::Client,
}

impl AzureClient {
    pub fn new(api_key: String, settings: AzureSettings) -> Self {
        Self::with_http(api_key, settings, reqwest::Client::new())
    }

    pub fn with_http(api_key: String, settings: AzureSettings, http: reqwest::Client) -> Self {
        Self {
            api_key,
            settings,
            http,
        }
    }

    pub fn settings(&self) -> &AzureSettings {
        &self.settings
    }
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatModel for AzureClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(self.settings.chat_url())
            .header("api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Malformed(e.to_string()))?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                deployment = %self.settings.deployment,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion"
            );
        }
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::Malformed("response has no choices".to_string()))
    }
}

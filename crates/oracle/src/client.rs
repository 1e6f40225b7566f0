// Chat-completions client and the Oracle implementation on top of it.
//
// Blocking: a merge resolves its two mappings one after the other and
// nothing else runs meanwhile.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use rosterlink_config::ai::{AIConfigStatus, ResolvedAIConfig};
use rosterlink_merge::model::MappingType;
use rosterlink_merge::Oracle;

use crate::prompt;

/// Error from the classification service
#[derive(Debug, Clone)]
pub enum OracleError {
    /// Provider disabled in settings
    NotConfigured(String),
    /// Provider needs an API key and none was found
    MissingKey(String),
    /// Connection, TLS or timeout failure
    Network(String),
    /// Non-2xx answer
    Api { status: u16, message: String },
    /// Body was not a chat-completions response
    Parse(String),
    /// The model answered with no text
    EmptyResponse,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            OracleError::MissingKey(msg) => write!(f, "API key missing: {}", msg),
            OracleError::Network(msg) => write!(f, "Network error: {}", msg),
            OracleError::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            OracleError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            OracleError::EmptyResponse => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for OracleError {}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

/// Minimal OpenAI-compatible chat-completions client.
pub struct ChatClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// `endpoint` is the API base, e.g. `https://api.openai.com/v1`.
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One system + one user message; returns the first choice's text.
    pub fn complete(&self, system: &str, user: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
        };

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status();
        log::debug!("chat completion: HTTP {} in {:.2?}", status.as_u16(), started.elapsed());

        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(content)
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// [`Oracle`] that asks a chat model using the fixed prompt templates.
pub struct ChatOracle {
    client: ChatClient,
    key_label: String,
}

impl ChatOracle {
    pub fn new(client: ChatClient, key_label: &str) -> Self {
        Self {
            client,
            key_label: key_label.to_string(),
        }
    }

    /// Build from resolved settings. Fails when the provider is disabled or
    /// its key is missing.
    pub fn from_config(config: &ResolvedAIConfig, key_label: &str) -> Result<Self, OracleError> {
        match config.status {
            AIConfigStatus::Disabled => {
                return Err(OracleError::NotConfigured(
                    config.blocking_reason.clone().unwrap_or_else(|| "AI is disabled".to_string()),
                ));
            }
            AIConfigStatus::MissingKey => {
                return Err(OracleError::MissingKey(
                    config.blocking_reason.clone().unwrap_or_default(),
                ));
            }
            AIConfigStatus::Ready => {}
        }

        let client = ChatClient::new(
            &config.endpoint,
            &config.model,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )?;
        Ok(Self::new(client, key_label))
    }
}

impl Oracle for ChatOracle {
    fn classify(&self, left: &[String], right: &[String], mapping_type: MappingType) -> Result<String, String> {
        log::info!("{mapping_type}: asking {} for column correspondences", self.client.model());
        let user = prompt::columns_prompt(left, right, mapping_type, &self.key_label);
        self.client
            .complete(prompt::COLUMNS_SYSTEM, &user)
            .map_err(|e| e.to_string())
    }

    fn normalize_dates(&self, values: &[String]) -> Result<String, String> {
        log::info!("asking {} to normalize {} date value(s)", self.client.model(), values.len());
        let user = prompt::dates_prompt(values);
        self.client
            .complete(prompt::DATES_SYSTEM, &user)
            .map_err(|e| e.to_string())
    }
}

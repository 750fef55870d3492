//! Classification oracle over an OpenAI-compatible `chat/completions` endpoint.

use crate::config::toml_config::OracleConfig;
use crate::domain::ports::{ClassificationOracle, OraclePrompt};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct HttpOracle {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    headers: HashMap<String, String>,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            headers: HashMap::new(),
        }
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        // 預設不設逾時，只有明確設定時才套用
        let client = match config.timeout_seconds {
            Some(seconds) => Client::builder()
                .timeout(Duration::from_secs(seconds))
                .build()?,
            None => Client::new(),
        };

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            headers: config.headers.clone().unwrap_or_default(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn user_content(prompt: &OraclePrompt) -> Value {
        match &prompt.image {
            Some(image) => json!([
                { "type": "text", "text": prompt.text },
                {
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.mime_type, image.base64_data)
                    }
                }
            ]),
            None => Value::String(prompt.text.clone()),
        }
    }
}

#[async_trait]
impl ClassificationOracle for HttpOracle {
    async fn complete(&self, prompt: &OraclePrompt) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(prompt.instructions.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_content(prompt),
                },
            ],
            temperature: 0.0,
        };

        tracing::debug!("Making oracle request to: {}", self.endpoint);
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Oracle response status: {}", status);

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(IngestError::ProcessingError {
                message: format!(
                    "oracle returned HTTP {}: {}",
                    status,
                    detail.chars().take(200).collect::<String>()
                ),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| IngestError::ProcessingError {
                message: "oracle reply had no message content".to_string(),
            })
    }
}

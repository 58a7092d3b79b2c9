//! Language model backends for the model resolver tier.

use crate::config::{ModelConfig, ModelProvider};
use crate::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

/// Instruction sent as the system turn where the provider supports one.
pub const SYSTEM_PROMPT: &str = "You turn spoken commands into JSON action plans for a desktop assistant. Return only one JSON object.";

const MAX_TOKENS: u32 = 600;

/// Text completion interface used by the model tier.
pub trait ModelClient: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Create the default HTTP-backed client.
pub fn create_model_client(config: &ModelConfig) -> Result<Box<dyn ModelClient>> {
    Ok(Box::new(HttpModelClient::new(config)?))
}

/// Blocking client over a private current-thread runtime.
pub struct HttpModelClient {
    model: String,
    provider: ModelProvider,
    endpoint: String,
    api_key: Option<String>,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelClient")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpModelClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = match config.provider.api_key_env() {
            None => None,
            Some(var) => config.api_key.clone().or_else(|| std::env::var(var).ok()),
        };

        if let (Some(var), None) = (config.provider.api_key_env(), &api_key) {
            return Err(Error::Config(format!(
                "model.api_key (or {var}) is required for {}",
                config.provider.as_str()
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Model(format!("failed to build tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Model(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            provider: config.provider,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            runtime,
            http,
        })
    }

    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    fn header(name: &str, value: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(value).map_err(|e| Error::Model(format!("invalid {name} header: {e}")))
    }

    /// URL, extra headers and body for one completion request.
    fn request(&self, prompt: &str) -> Result<(String, HeaderMap, Value)> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request = match self.provider {
            ModelProvider::Ollama => (
                format!("{}/api/generate", self.endpoint),
                headers,
                json!({
                    "model": self.model,
                    "prompt": format!("{SYSTEM_PROMPT}\n\n{prompt}"),
                    "stream": false,
                    "format": "json",
                }),
            ),
            ModelProvider::Claude => {
                headers.insert("x-api-key", Self::header("x-api-key", self.api_key())?);
                headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
                (
                    format!("{}/v1/messages", self.endpoint),
                    headers,
                    json!({
                        "model": self.model,
                        "max_tokens": MAX_TOKENS,
                        "temperature": 0,
                        "system": SYSTEM_PROMPT,
                        "messages": [{ "role": "user", "content": prompt }],
                    }),
                )
            }
            ModelProvider::OpenAI => {
                headers.insert(
                    AUTHORIZATION,
                    Self::header("authorization", &format!("Bearer {}", self.api_key()))?,
                );
                (
                    format!("{}/v1/chat/completions", self.endpoint),
                    headers,
                    json!({
                        "model": self.model,
                        "temperature": 0,
                        "messages": [
                            { "role": "system", "content": SYSTEM_PROMPT },
                            { "role": "user", "content": prompt }
                        ]
                    }),
                )
            }
            ModelProvider::Gemini => {
                headers.insert("x-goog-api-key", Self::header("x-goog-api-key", self.api_key())?);
                (
                    format!(
                        "{}/v1beta/models/{}:generateContent",
                        self.endpoint,
                        urlencoding::encode(&self.model)
                    ),
                    headers,
                    json!({
                        "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
                        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                        "generationConfig": { "temperature": 0, "maxOutputTokens": MAX_TOKENS },
                    }),
                )
            }
        };
        Ok(request)
    }
}

/// Pull the completion text out of a provider response body.
fn response_text(provider: ModelProvider, body: &Value) -> Option<String> {
    let text = match provider {
        ModelProvider::Ollama => body.get("response"),
        ModelProvider::Claude => body
            .get("content")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("text")),
        ModelProvider::OpenAI => body
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("message"))
            .and_then(|v| v.get("content")),
        ModelProvider::Gemini => body
            .get("candidates")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("content"))
            .and_then(|v| v.get("parts"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.get("text")),
    };
    text.and_then(|v| v.as_str()).map(ToString::to_string)
}

impl ModelClient for HttpModelClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let provider = self.provider.as_str();
        let (url, headers, body) = self.request(prompt)?;

        self.runtime.block_on(async {
            let resp = self
                .http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Model(format!("{provider} request failed: {e}")))?;
            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| Error::Model(format!("{provider} read body failed: {e}")))?;
            if !status.is_success() {
                return Err(Error::Model(format!(
                    "{provider} returned {}: {}",
                    status.as_u16(),
                    text
                )));
            }

            let json: Value = serde_json::from_str(&text)?;
            let completion = response_text(self.provider, &json).ok_or_else(|| {
                Error::Model(format!("{provider} response missing completion text"))
            })?;
            tracing::debug!(provider, chars = completion.len(), "Model completion received");
            Ok(completion)
        })
    }
}

/// Decode a JSON object from model output, tolerating surrounding prose or
/// code fences.
pub fn parse_json_object(raw: &str) -> Result<Value> {
    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(_) => {
            let extracted = extract_json_object(raw)?;
            serde_json::from_str::<Value>(extracted)?
        }
    };

    if !parsed.is_object() {
        return Err(Error::Model("model response must be a JSON object".to_string()));
    }
    Ok(parsed)
}

fn extract_json_object(raw: &str) -> Result<&str> {
    let missing = || Error::Model("model response did not contain a JSON object".to_string());
    let start = raw.find('{').ok_or_else(missing)?;
    let end = raw.rfind('}').ok_or_else(missing)?;
    if end <= start {
        return Err(Error::Model("model response JSON bounds are invalid".to_string()));
    }
    Ok(&raw[start..=end])
}

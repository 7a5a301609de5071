//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use super::{parse_response, VisionDiff, VisionDiffService, VisionRequest};
use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const SYSTEM_PROMPT: &str = "You are a document comparison assistant for product catalogs. \
You compare page images, ignore formatting differences and return only valid JSON.";

const INSTRUCTIONS: &str = r#"Compare document A (original) with document B (modified) and report only meaningful changes.

Return a JSON object with exactly these keys:
- "text": object mapping new text visible in B to the text of A it replaced, or to "NEW" when it did not exist in A.
- "missing": array of text visible in A that is completely absent from B.
- "move": array of text that moved to a different section or column. This should be rare.

Never list a text in "missing" if it appears anywhere in B. If {"NewText": "OldText"} is in "text", "OldText" must not be in "missing".
Ignore line wrapping, spacing, alignment, font and row-order differences, and generic words such as "de", "ml" or "Pot".
Return only JSON, without markdown."#;

/// Settings of an [`HttpVisionService`].
#[derive(Debug, Clone)]
pub struct VisionClientConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for VisionClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            api_key: None,
            max_tokens: 800,
            temperature: 0.1,
        }
    }
}

impl VisionClientConfig {
    /// Defaults with the API key taken from the environment.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Vision diff service reached over HTTP.
pub struct HttpVisionService {
    client: reqwest::blocking::Client,
    config: VisionClientConfig,
}

impl HttpVisionService {
    pub fn new(config: VisionClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ExternalService(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, request: &VisionRequest<'_>) -> Value {
        let mut content = vec![json!({
            "type": "text",
            "text": format!(
                "{}\n\nThe first {} image(s) are document A, the following {} image(s) are document B.",
                INSTRUCTIONS,
                request.source_images.len(),
                request.target_images.len()
            ),
        })];
        for image in request.source_images.iter().chain(request.target_images) {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", STANDARD.encode(image)),
                    "detail": "high",
                },
            }));
        }

        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": content },
            ],
        })
    }
}

impl VisionDiffService for HttpVisionService {
    fn diff(&self, request: &VisionRequest<'_>) -> Result<VisionDiff> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ExternalService(format!("{} is not set", API_KEY_VAR)))?;

        log::info!(
            "requesting vision diff {} from {} ({} + {} images)",
            request.direction,
            self.config.model,
            request.source_images.len(),
            request.target_images.len()
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(request))
            .send()
            .map_err(|e| Error::ExternalService(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ExternalService(format!(
                "service answered {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .map_err(|e| Error::ExternalService(e.to_string()))?;
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::ExternalService("response has no message content".to_string()))?;

        Ok(parse_response(text))
    }
}

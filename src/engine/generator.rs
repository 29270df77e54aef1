use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call knobs. The outcome probe runs cheap (low token cap); narrative
/// turns run warmer and longer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationOptions {
    pub fn narrative() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 1024,
        }
    }

    /// Short structured verdicts: outcome probe, tactic scores.
    pub fn assessment() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 256,
        }
    }
}

/// The external generative capability. The engine treats it as a black box
/// that may return clean JSON, fenced JSON, an enveloped payload, plain
/// prose, or an error; all are handled downstream.
pub trait ContentGenerator: Send + Sync {
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Best-effort illustration support. Failures are cosmetic; callers must
    /// never block a turn on this.
    fn generate_image(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("image generation not supported by this backend"))
    }
}

/* =========================
   OpenAI-compatible client
   ========================= */

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Serialize)]
struct ImageRequest {
    prompt: String,
    n: u32,
    size: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: String,
}

/// Blocking client for any OpenAI-compatible chat-completions server
/// (LM Studio, llama.cpp server, a hosted gateway). One instance per
/// session, shared with worker threads behind an `Arc`.
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn test_connection(&self) -> Result<String> {
        let resp: serde_json::Value = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(format!(
            "Connected ({} models available)",
            resp["data"].as_array().map(|a| a.len()).unwrap_or(0)
        ))
    }
}

impl ContentGenerator for ChatCompletionsClient {
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
            messages: vec![ChatMessage {
                role: "system".into(),
                content: prompt.to_string(),
            }],
        };

        log::debug!("generate: {} prompt chars", prompt.len());

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&req)
            .send()?
            .error_for_status()?
            .json::<ChatCompletionResponse>()?;

        let content = resp
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("completion response had no choices"))?;

        log::debug!("generate: {} reply chars", content.len());
        Ok(content)
    }

    fn generate_image(&self, prompt: &str) -> Result<String> {
        let req = ImageRequest {
            prompt: prompt.to_string(),
            n: 1,
            size: "512x512".into(),
        };

        let resp = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .json(&req)
            .send()?
            .error_for_status()?
            .json::<ImageResponse>()?;

        resp.data
            .first()
            .map(|d| d.url.clone())
            .ok_or_else(|| anyhow!("image response had no data"))
    }
}

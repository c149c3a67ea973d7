// src/services/assistant.rs

use crate::config::OpenAiConfig;
use crate::models::ServiceError;
use async_trait::async_trait;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const GENERATE_INSTRUCTIONS: &str = "Write a formal Standard Operating Procedure for the request below. \
Use these sections in order: Title, Purpose, Scope, Responsibilities, Definitions, Procedure, References. \
Number every step in the Procedure section and write in complete sentences, so that someone new to the \
process can follow it. Match terminology to the industry implied by the request.";

const SUMMARISE_INSTRUCTIONS: &str = "Summarise the following SOP as clearly and concisely as possible.";

const IMPROVE_INSTRUCTIONS: &str =
    "You improve Standard Operating Procedures for clarity, formality and tone. Return the full revised SOP.";

const GENERATE_MAX_TOKENS: u32 = 1000;
const SUMMARISE_MAX_TOKENS: u32 = 300;
const IMPROVE_MAX_TOKENS: u32 = 1500;

/// Text completion backend used by the assist endpoints.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn complete(&self, instructions: &str, prompt: &str, max_tokens: u32) -> Result<String, ServiceError>;
}

pub struct OpenAiAssistant {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiAssistant {
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            error!("❌ Failed to build OpenAI client: {:?}", e);
            ServiceError::InternalServerError
        })?;
        Ok(OpenAiAssistant {
            client,
            config: config.clone(),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl Assistant for OpenAiAssistant {
    async fn complete(&self, instructions: &str, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            error!("❌ OPENAI_API_KEY is not configured");
            ServiceError::InternalServerError
        })?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                ChatMessage { role: "system", content: instructions },
                ChatMessage { role: "user", content: prompt },
            ],
            "temperature": 0.7,
            "max_tokens": max_tokens,
        });

        let response: ChatResponse = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("❌ OpenAI request failed: {:?}", e);
                ServiceError::InternalServerError
            })?
            .json()
            .await
            .map_err(|e| {
                error!("❌ Unreadable OpenAI response: {:?}", e);
                ServiceError::InternalServerError
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                error!("❌ OpenAI returned no completion");
                ServiceError::InternalServerError
            })
    }
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ServiceError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::BadRequest(message.to_string()))
}

pub async fn generate_sop(assistant: &dyn Assistant, prompt: &Option<String>) -> Result<String, ServiceError> {
    let prompt = required(prompt, "Prompt is required.")?;
    info!("🤖 Generating SOP ({} chars of prompt)", prompt.len());
    assistant.complete(GENERATE_INSTRUCTIONS, prompt, GENERATE_MAX_TOKENS).await
}

pub async fn summarise_sop(assistant: &dyn Assistant, content: &Option<String>) -> Result<String, ServiceError> {
    let content = required(content, "No content provided.")?;
    info!("🤖 Summarising SOP ({} chars)", content.len());
    assistant.complete(SUMMARISE_INSTRUCTIONS, content, SUMMARISE_MAX_TOKENS).await
}

pub async fn improve_sop(assistant: &dyn Assistant, content: &Option<String>) -> Result<String, ServiceError> {
    let content = required(content, "No content provided.")?;
    info!("🤖 Improving SOP ({} chars)", content.len());
    let prompt = format!("Please improve this SOP:\n\n{}", content);
    assistant.complete(IMPROVE_INSTRUCTIONS, &prompt, IMPROVE_MAX_TOKENS).await
}

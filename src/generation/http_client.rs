//! OpenAI-compatible chat-completions backend.
use super::{GenerationError, GenerationRequest, Generator, Message};
use crate::util::truncate_string;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub struct HttpGenerator {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(api_base: &str, api_key: String) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
        }
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| GenerationError::Transport(format!("read response body: {err}")))?;

        tracing::info!(
            purpose = %request.purpose,
            model = %request.model,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = text.len(),
            "generation request complete"
        );

        if !(200..300).contains(&status) {
            return Err(GenerationError::Status {
                status,
                body: truncate_string(text.trim(), 500),
            });
        }
        parse_chat_response(&text)
    }
}

/// Pull the first choice's text out of a chat-completions body.
fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|err| GenerationError::Malformed(format!("{err}: {}", truncate_string(body, 200))))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response has no choices".to_string()))?;
    let content = choice.message.content.unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(content.to_string())
}

//! HTTP client for the chat-completions inference service that extracts
//! tariff facts from document text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tariffact_core::jurisdiction::Jurisdiction;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

const SYSTEM_PROMPT: &str = "You extract antidumping and countervailing duty facts from trade \
remedy notices. Return a single JSON object {\"items\": [...]} where each item has the fields: \
country, hs_code, tariff_type, tariff_rate, effective_date_from, effective_date_to, \
investigation_period_from, investigation_period_to, basis_law, company, case_number, \
product_description, note. Use null for anything the text does not state. Emit one item per \
(country, company, rate) ruling. No prose, no markdown fences.";

const MAX_ATTEMPTS: u32 = 3;

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// The raw assistant text is returned as-is; payload repair is the recovery
/// parser's job, so a syntactically broken response is not an error here.
/// Transient transport and 5xx failures are retried with a short backoff.
pub struct ExtractClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
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
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl ExtractClient {
    /// Create a client for the given inference base URL, e.g.
    /// `http://localhost:8000` (no trailing slash).
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    /// Extract tariff facts from one batch of document text, returning the
    /// raw payload text.
    pub async fn extract_batch(
        &self,
        jurisdiction: &dyn Jurisdiction,
        text: &str,
    ) -> Result<String, ExtractError> {
        let hint = jurisdiction.extraction_hint();
        let system = if hint.is_empty() {
            SYSTEM_PROMPT.to_string()
        } else {
            format!("{SYSTEM_PROMPT}\n\n{hint}")
        };
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
        };
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut last = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.send(&url, &request).await {
                Ok(content) => {
                    info!(
                        jurisdiction = jurisdiction.name(),
                        chars = content.len(),
                        "extraction batch complete"
                    );
                    return Ok(content);
                }
                // Client errors are not retryable; the request will not
                // get better.
                Err(ExtractError::Server { status, body }) if status < 500 => {
                    return Err(ExtractError::Server { status, body });
                }
                Err(err) => {
                    warn!(attempt, %err, "extraction attempt failed");
                    last = err.to_string();
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(ExtractError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last,
        })
    }

    async fn send(&self, url: &str, request: &ChatRequest<'_>) -> Result<String, ExtractError> {
        let resp = self.client.post(url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = serde_json::from_str(&resp.text().await?)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

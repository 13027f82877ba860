pub mod openai;
pub mod prompts;

use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRequest {
    pub system: String,
    pub prompt: String,
    /// Overrides the client's default model.
    #[serde(default)]
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiError(pub String);

impl std::fmt::Display for AiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Completer ─────────────────────────────────────────

/// A chat-completion backend. Calls block; run them off the async executor.
pub trait Completer: Send + Sync {
    fn complete(&self, req: &AiRequest) -> Result<AiResponse, AiError>;
}

/// Trimmed completion text, treating an empty reply as a failure.
pub fn complete_text(completer: &dyn Completer, req: &AiRequest) -> Result<String, AiError> {
    let resp = completer.complete(req)?;
    let text = resp.text.trim();
    if text.is_empty() {
        return Err(AiError(format!(
            "{} ({}) returned an empty completion",
            resp.provider, resp.model
        )));
    }
    Ok(text.to_string())
}

// ── Requests ──────────────────────────────────────────

/// Follow-up questions for a location, answered by the intro model.
pub fn intro_request(location: &str, intro_model: &str) -> AiRequest {
    AiRequest {
        system: prompts::intro_system(),
        prompt: prompts::intro_prompt(location),
        model: Some(intro_model.to_string()),
        max_tokens: None,
        temperature: Some(0.7),
    }
}

/// Full itinerary generation with the client's default model.
pub fn itinerary_request(prompt: String) -> AiRequest {
    AiRequest {
        system: prompts::trek_system(),
        prompt,
        model: None,
        max_tokens: Some(3000),
        temperature: Some(0.7),
    }
}

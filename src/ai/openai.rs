use serde_json::{json, Value};
use std::time::Duration;

use super::{AiError, AiRequest, AiResponse, Completer};
use crate::config::OpenAiConfig;

/// OpenAI chat-completions client, built once at boot.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, AiError> {
        if config.api_key.is_empty() {
            return Err(AiError("OpenAI API key not configured".into()));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError(format!("HTTP client error: {}", e)))?;
        Ok(OpenAiClient {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn body(&self, req: &AiRequest) -> (String, Value) {
        let model = req.model.clone().unwrap_or_else(|| self.model.clone());
        let mut body = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": req.system},
                {"role": "user", "content": req.prompt}
            ],
            "temperature": req.temperature.unwrap_or(0.7)
        });
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = json!(max);
        }
        (model, body)
    }
}

impl Completer for OpenAiClient {
    fn complete(&self, req: &AiRequest) -> Result<AiResponse, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let (model, body) = self.body(req);

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| AiError(format!("OpenAI request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(AiError(format!("OpenAI returned {}: {}", status, text)));
        }

        let json: Value = resp
            .json()
            .map_err(|e| AiError(format!("OpenAI JSON parse error: {}", e)))?;

        Ok(AiResponse {
            text: message_content(&json),
            provider: "openai".into(),
            model,
        })
    }
}

fn message_content(json: &Value) -> String {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: "sk-test".into(),
            model: "gpt-4".into(),
            intro_model: "gpt-3.5-turbo".into(),
            base_url: "https://api.example.com/v1/".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_key_is_rejected() {
        let mut cfg = config();
        cfg.api_key.clear();
        assert!(OpenAiClient::new(&cfg).is_err());
    }

    #[test]
    fn body_uses_default_model_unless_overridden() {
        let client = OpenAiClient::new(&config()).unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");

        let req = crate::ai::itinerary_request("prefs".into());
        let (model, body) = client.body(&req);
        assert_eq!(model, "gpt-4");
        assert_eq!(body["max_tokens"], 3000);
        assert_eq!(body["messages"][1]["content"], "prefs");

        let intro = crate::ai::intro_request("Nepal", "gpt-3.5-turbo");
        let (model, body) = client.body(&intro);
        assert_eq!(model, "gpt-3.5-turbo");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn content_is_read_from_first_choice() {
        let json = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(message_content(&json), "hello");
        assert_eq!(message_content(&json!({"choices": []})), "");
    }
}

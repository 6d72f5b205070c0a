//! Language-model client seam.
//!
//! The router only depends on [`LanguageModel`]; the concrete client talks
//! to a local completion endpoint over blocking HTTP. Prompt content is the
//! caller's concern.

use serde_json::{json, Value};

use crate::{CoreError, Result};

/// Minimal completion contract the router routes free text through.
pub trait LanguageModel: Send {
    fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;
}

/// Blocking HTTP client for an OpenAI- or Ollama-style completion endpoint.
pub struct HttpLlmClient {
    endpoint: String,
    model: String,
    agent: ureq::Agent,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(60))
                .build(),
        }
    }
}

impl LanguageModel for HttpLlmClient {
    fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "stream": false,
        });

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(body)
            .map_err(|e| CoreError::LanguageModel(e.to_string()))?;
        let payload: Value = response
            .into_json()
            .map_err(|e| CoreError::LanguageModel(format!("invalid completion payload: {e}")))?;

        extract_completion(&payload).ok_or_else(|| {
            CoreError::LanguageModel("completion payload carried no text".to_string())
        })
    }
}

/// Pull the completion text out of the common response shapes.
fn extract_completion(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("response").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let choice = payload.get("choices")?.get(0)?;
    if let Some(text) = choice.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    choice
        .get("message")?
        .get("content")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion_shapes() {
        let ollama = json!({"response": "hello"});
        assert_eq!(extract_completion(&ollama).as_deref(), Some("hello"));

        let completions = json!({"choices": [{"text": "hi"}]});
        assert_eq!(extract_completion(&completions).as_deref(), Some("hi"));

        let chat = json!({"choices": [{"message": {"content": "hey"}}]});
        assert_eq!(extract_completion(&chat).as_deref(), Some("hey"));

        assert_eq!(extract_completion(&json!({"other": 1})), None);
    }
}

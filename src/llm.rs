//! OpenAI chat-completions client backing the engagement composer.
//!
//! Uses blocking reqwest with Bearer token auth. The pipeline treats this
//! service as unreliable: any error here is absorbed upstream by the
//! engagement fallback, so this module only reports, never retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engage::{TextGenError, TextGenerator};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
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
    content: Option<String>,
}

/// Generative-text collaborator speaking the OpenAI chat-completions API.
pub struct OpenAiGenerator {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Result<Self, TextGenError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(OpenAiGenerator {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

impl TextGenerator for OpenAiGenerator {
    fn generate(&self, context: &str, offer: &str) -> Result<String, TextGenError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a retention marketing copywriter. Write one short, \
                              friendly outreach message of at most two sentences. Reply \
                              with the message text only."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Customer segment: {}. Promote this retention offer: {}.",
                        context, offer
                    ),
                },
            ],
            temperature: 0.7,
            max_tokens: 120,
        };

        let response: ChatResponse = self
            .client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TextGenError::Malformed("response carried no choices".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_to_chat_payload() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "Customer segment: persona_1. Promote this retention offer: A."
                    .to_string(),
            }],
            temperature: 0.7,
            max_tokens: 120,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parses_first_choice() {
        let raw = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "We miss you!"}}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("We miss you!")
        );
    }

    #[test]
    fn test_generator_builds() {
        assert!(OpenAiGenerator::new("sk-test", "gpt-3.5-turbo").is_ok());
    }
}

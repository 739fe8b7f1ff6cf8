// Google Gemini adapter
// API Reference: https://ai.google.dev/api/generate-content

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

// Request types for the generateContent endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Response types
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}

impl GoogleAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    /// Point the adapter at a different host (proxies, tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Accepts both `gemini-x` and `models/gemini-x`.
    fn model_path(model: &str) -> String {
        let name = model.strip_prefix("models/").unwrap_or(model);
        format!("models/{}", name)
    }

    fn convert_request(request: &LLMRequest) -> GeminiRequest {
        let mut system_text: Vec<String> = request.system_instruction.iter().cloned().collect();
        let mut contents = Vec::new();
        for msg in &request.messages {
            let role = match msg.role.as_str() {
                "system" => {
                    system_text.push(msg.content.clone());
                    continue;
                }
                "assistant" | "model" => "model",
                _ => "user",
            };
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            });
        }

        let generation_config = if request.max_tokens.is_some() || request.temperature.is_some() {
            Some(GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            })
        } else {
            None
        };

        GeminiRequest {
            contents,
            system_instruction: (!system_text.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system_text.join("\n\n"),
                }],
            }),
            generation_config,
        }
    }
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let url = format!(
            "{}/v1beta/{}:generateContent",
            self.base_url,
            Self::model_path(&request.model)
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::convert_request(request))
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Gemini request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(AppError::ServiceUnavailable(format!(
                    "Gemini API error ({}): {} (status: {:?})",
                    status, error_response.error.message, error_response.error.status
                )));
            }

            return Err(AppError::ServiceUnavailable(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            AppError::ServiceUnavailable(format!("Failed to parse Gemini response: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .first()
            .ok_or_else(|| AppError::ServiceUnavailable("Gemini returned no candidates".to_string()))?;

        let finish_reason = candidate
            .finish_reason
            .clone()
            .unwrap_or_else(|| "STOP".to_string());

        // Blocked candidates (SAFETY, RECITATION, ...) arrive without parts.
        let content = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AppError::ServiceUnavailable(format!(
                "Gemini returned no text (finish reason: {})",
                finish_reason
            )));
        }

        let usage = gemini_response
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMMessage;

    fn request(model: &str) -> LLMRequest {
        LLMRequest {
            provider: "google".to_string(),
            model: model.to_string(),
            messages: vec![LLMMessage::user("Summarize the data")],
            max_tokens: Some(256),
            temperature: Some(0.2),
            system_instruction: None,
        }
    }

    #[test]
    fn test_model_path() {
        assert_eq!(GoogleAdapter::model_path("gemini-2.0-flash-lite"), "models/gemini-2.0-flash-lite");
        assert_eq!(
            GoogleAdapter::model_path("models/gemini-2.0-flash-lite"),
            "models/gemini-2.0-flash-lite"
        );
    }

    #[test]
    fn test_assistant_role_maps_to_model() {
        let mut req = request("m");
        req.messages.push(LLMMessage::assistant("ok"));
        req.messages.push(LLMMessage::system("be brief"));
        let converted = GoogleAdapter::convert_request(&req);
        assert_eq!(converted.contents.len(), 2);
        assert_eq!(converted.contents[1].role.as_deref(), Some("model"));
        assert_eq!(converted.system_instruction.unwrap().parts[0].text, "be brief");
    }

    #[tokio::test]
    async fn test_generate_content_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash-lite:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "- Sales "}, {"text": "rose"}]},
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 3, "totalTokenCount": 13}
                }"#,
            )
            .create_async()
            .await;

        let adapter = GoogleAdapter::with_base_url("test-key", &server.url());
        let response = adapter
            .create_chat_completion(&request("models/gemini-2.0-flash-lite"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "- Sales rose");
        assert_eq!(response.finish_reason, "STOP");
        assert_eq!(response.usage.total_tokens, 13);
    }

    #[tokio::test]
    async fn test_blocked_candidate_is_service_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash-lite:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)
            .create_async()
            .await;

        let adapter = GoogleAdapter::with_base_url("test-key", &server.url());
        let err = adapter
            .create_chat_completion(&request(DEFAULT_MODEL))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_api_error_is_service_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash-lite:generateContent")
            .with_status(429)
            .with_body(r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let adapter = GoogleAdapter::with_base_url("test-key", &server.url());
        let err = adapter
            .create_chat_completion(&request(DEFAULT_MODEL))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(err.to_string().contains("Quota exceeded"));
    }
}

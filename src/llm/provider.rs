use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMMessage, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Everything needed to build an [`LLM`].
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LLMProviderConfig {
    /// Combine the configured provider settings with a credential.
    pub fn from_config(config: &LLMConfig, api_key: impl Into<String>) -> Self {
        Self {
            name: config.provider.clone(),
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        }
    }
}

pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    provider_name: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        if provider.api_key.trim().is_empty() {
            return Err(AppError::InvalidInput("API key must not be empty".to_string()));
        }
        let kind = LLMProvider::parse(&provider.name).ok_or_else(|| {
            AppError::InvalidInput(format!("Unsupported provider: {}", provider.name))
        })?;

        let adapter: Arc<dyn LLMAdapter> = match (kind, provider.base_url.as_deref()) {
            (LLMProvider::Google, Some(url)) => Arc::new(
                crate::llm::google::GoogleAdapter::with_base_url(&provider.api_key, url),
            ),
            (LLMProvider::Google, None) => {
                Arc::new(crate::llm::google::GoogleAdapter::new(&provider.api_key))
            }
            (LLMProvider::OpenAI, Some(url)) => Arc::new(
                crate::llm::openai::OpenAIAdapter::with_base_url(&provider.api_key, url),
            ),
            (LLMProvider::OpenAI, None) => {
                Arc::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key))
            }
        };

        info!(provider = %kind, model = %provider.model, "LLM configured");
        Ok(Self {
            adapter,
            provider_name: kind.to_string(),
            model: provider.model,
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
        })
    }

    /// Wrap an already constructed adapter.
    pub fn from_adapter(adapter: Arc<dyn LLMAdapter>, provider_name: &str, model: &str) -> Self {
        Self {
            adapter,
            provider_name: provider_name.to_string(),
            model: model.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Send `prompt` as a single user message and return the generated text.
    pub async fn generate_text(&self, prompt: &str) -> AppResult<String> {
        let request = LLMRequest {
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system_instruction: None,
        };
        debug!(prompt_len = prompt.len(), model = %self.model, "Sending prompt");
        let response = self.create_chat_completion(&request).await?;
        debug!(
            response_len = response.content.len(),
            total_tokens = response.usage.total_tokens,
            "Received completion"
        );
        Ok(response.content)
    }
}

impl std::fmt::Debug for LLM {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLM")
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockAdapter;

    fn provider(name: &str, key: &str) -> LLMProviderConfig {
        LLMProviderConfig {
            name: name.to_string(),
            api_key: key.to_string(),
            model: "m".to_string(),
            base_url: None,
            max_tokens: Some(64),
            temperature: None,
        }
    }

    #[test]
    fn test_unsupported_provider_is_an_error() {
        let err = LLM::new(provider("bedrock", "k")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_blank_key_is_rejected() {
        assert!(LLM::new(provider("google", "  ")).is_err());
        assert!(LLM::new(provider("gemini", "key")).is_ok());
    }

    #[tokio::test]
    async fn test_generate_text_sends_single_user_message() {
        let mock = Arc::new(MockAdapter::replying("insights"));
        let llm = LLM::from_adapter(mock.clone(), "google", "gemini-test");
        let text = llm.generate_text("hello").await.unwrap();
        assert_eq!(text, "insights");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gemini-test");
        assert_eq!(requests[0].messages, vec![LLMMessage::user("hello")]);
    }
}

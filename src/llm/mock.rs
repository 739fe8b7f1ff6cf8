//! In-memory adapter used by tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};

pub struct MockAdapter {
    reply: Result<String, String>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl MockAdapter {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Text of the last user prompt received.
    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.messages.last())
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl LLMAdapter for MockAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(LLMResponse {
                content: text.clone(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            }),
            Err(message) => Err(AppError::ServiceUnavailable(message.clone())),
        }
    }
}

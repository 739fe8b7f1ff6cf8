use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::dataset::DatasetPreview;
use crate::llm::{LLMProviderConfig, LLM};
use crate::plot::ChartKind;
use crate::session::{ChatTurn, ReplySource, Session, SessionRegistry};
use crate::types::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    /// Model built from the startup credential; `None` when no valid key
    /// was configured.
    pub llm: Option<Arc<LLM>>,
}

impl AppState {
    pub fn new(config: Config, llm: Option<Arc<LLM>>) -> Self {
        Self {
            config,
            sessions: SessionRegistry::default(),
            llm,
        }
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.llm.clone()).with_sample_rows(self.config.session.sample_rows)
    }

    /// Build a model for a user-supplied key with the configured provider.
    pub fn llm_for_key(&self, api_key: &str) -> AppResult<Arc<LLM>> {
        let provider = LLMProviderConfig::from_config(&self.config.llm, api_key.trim());
        Ok(Arc::new(LLM::new(provider)?))
    }
}

// Request and response payloads

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadResponse {
    pub status: String,
    pub filename: Option<String>,
    pub preview: DatasetPreview,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AnalysisToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub llm_configured: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub source: ReplySource,
    pub template: Option<&'static str>,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChartSuggestionsResponse {
    pub suggestions: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PlotQuery {
    pub column: String,
    pub chart_type: String,
}

impl PlotQuery {
    pub fn kind(&self) -> AppResult<ChartKind> {
        self.chart_type.parse()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub llm_configured: bool,
    pub sessions: usize,
}

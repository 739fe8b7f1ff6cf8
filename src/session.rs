//! Session Controller
//!
//! A [`Session`] owns the state of one interactive user: the chat
//! transcript, the primary dataset, the optional data dictionary, the
//! "analyze with AI" toggle and the LLM handle used for that user. Every
//! external input maps to one method here and is handled to completion
//! before the next; errors are returned to the caller and never leave the
//! session half-updated.
//!
//! [`SessionRegistry`] keeps many sessions isolated from each other for the
//! HTTP server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset::{Dataset, DatasetPreview};
use crate::llm::LLM;
use crate::plot::{build_chart, ChartKind, ChartSpec};
use crate::prompt::{PromptBuilder, PromptTemplate, DEFAULT_SAMPLE_ROWS};
use crate::types::{AppError, AppResult};

pub const ENABLE_ANALYSIS_REPLY: &str =
    "📌 Please enable 'Analyze CSV with AI' to allow me to help with data insights.";
pub const UPLOAD_FIRST_REPLY: &str = "⚠️ Please upload a CSV file first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where an assistant reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Model,
    AnalysisDisabled,
    DatasetMissing,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub content: String,
    pub source: ReplySource,
    /// Set when the reply came from the model.
    pub template: Option<&'static str>,
}

/// Read-only view used to redraw the page.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub analysis_enabled: bool,
    pub llm_configured: bool,
    pub dataset_columns: Option<Vec<String>>,
    pub dictionary_columns: Option<Vec<String>>,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    chat_history: Vec<ChatTurn>,
    primary_dataset: Option<Dataset>,
    data_dictionary: Option<Dataset>,
    analysis_enabled: bool,
    sample_rows: usize,
    llm: Option<Arc<LLM>>,
}

impl Session {
    pub fn new(llm: Option<Arc<LLM>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            chat_history: Vec::new(),
            primary_dataset: None,
            data_dictionary: None,
            analysis_enabled: false,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            llm,
        }
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows.max(1);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chat_history(&self) -> &[ChatTurn] {
        &self.chat_history
    }

    pub fn primary_dataset(&self) -> Option<&Dataset> {
        self.primary_dataset.as_ref()
    }

    pub fn data_dictionary(&self) -> Option<&Dataset> {
        self.data_dictionary.as_ref()
    }

    pub fn analysis_enabled(&self) -> bool {
        self.analysis_enabled
    }

    pub fn llm_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Replace the primary dataset. A parse failure leaves the previous
    /// dataset in place.
    pub fn load_primary_dataset(&mut self, bytes: &[u8]) -> AppResult<DatasetPreview> {
        let dataset = Dataset::from_csv_bytes(bytes).map_err(|e| {
            warn!(session_id = %self.id, error = %e, "Rejected dataset upload");
            e
        })?;
        let preview = dataset.preview(self.sample_rows, true);
        info!(
            session_id = %self.id,
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "Primary dataset loaded"
        );
        self.primary_dataset = Some(dataset);
        Ok(preview)
    }

    /// Replace the data dictionary; the preview shows every row.
    pub fn load_data_dictionary(&mut self, bytes: &[u8]) -> AppResult<DatasetPreview> {
        let dictionary = Dataset::from_csv_bytes(bytes).map_err(|e| {
            warn!(session_id = %self.id, error = %e, "Rejected data dictionary upload");
            e
        })?;
        let preview = dictionary.preview(dictionary.row_count(), false);
        info!(session_id = %self.id, rows = dictionary.row_count(), "Data dictionary loaded");
        self.data_dictionary = Some(dictionary);
        Ok(preview)
    }

    pub fn set_analysis_enabled(&mut self, enabled: bool) {
        self.analysis_enabled = enabled;
    }

    /// Swap the LLM handle, e.g. after the user entered their own key.
    /// `None` disables every model-backed feature for this session.
    pub fn set_llm(&mut self, llm: Option<Arc<LLM>>) {
        info!(session_id = %self.id, configured = llm.is_some(), "Session LLM updated");
        self.llm = llm;
    }

    /// Record the user's message and answer it.
    ///
    /// The user turn is always kept once `text` passes validation. An
    /// assistant turn is only appended when a reply is produced; a failed
    /// or unavailable model call returns an error and adds nothing more.
    pub async fn submit_chat_message(&mut self, text: &str) -> AppResult<ChatReply> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("Chat message must not be empty".to_string()));
        }
        self.chat_history.push(ChatTurn::new(Role::User, text));

        let reply = match (&self.primary_dataset, self.analysis_enabled) {
            (Some(dataset), true) => {
                let llm = self.llm.as_ref().ok_or_else(|| {
                    AppError::ServiceUnavailable("The model is not configured yet".to_string())
                })?;
                let builder = PromptBuilder::new(dataset)
                    .with_dictionary(self.data_dictionary.as_ref())
                    .with_sample_rows(self.sample_rows);
                let template = builder.template();
                let prompt = builder.analysis_prompt(text);
                info!(
                    session_id = %self.id,
                    template = ?template,
                    prompt_len = prompt.len(),
                    "Requesting dataset analysis"
                );
                let content = llm.generate_text(&prompt).await.map_err(|e| {
                    warn!(session_id = %self.id, error = %e, "Error generating AI response");
                    e
                })?;
                ChatReply {
                    content,
                    source: ReplySource::Model,
                    template: Some(template_name(template)),
                }
            }
            (_, false) => ChatReply {
                content: ENABLE_ANALYSIS_REPLY.to_string(),
                source: ReplySource::AnalysisDisabled,
                template: None,
            },
            (None, true) => ChatReply {
                content: UPLOAD_FIRST_REPLY.to_string(),
                source: ReplySource::DatasetMissing,
                template: None,
            },
        };

        self.chat_history
            .push(ChatTurn::new(Role::Assistant, reply.content.clone()));
        Ok(reply)
    }

    /// Ask the model which charts suit the loaded dataset. The answer is
    /// returned for display only and never enters the transcript.
    pub async fn chart_suggestions(&self) -> AppResult<String> {
        let dataset = self.require_dataset()?;
        let llm = self.llm.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("The model is not configured yet".to_string())
        })?;
        let prompt = PromptBuilder::new(dataset)
            .with_sample_rows(self.sample_rows)
            .chart_suggestion_prompt();
        info!(session_id = %self.id, "Requesting chart recommendations");
        llm.generate_text(&prompt).await.map_err(|e| {
            warn!(session_id = %self.id, error = %e, "Error while generating chart recommendations");
            e
        })
    }

    pub fn render_auto_plot(&self, column: &str, kind: ChartKind) -> AppResult<ChartSpec> {
        build_chart(self.require_dataset()?, column, kind)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            analysis_enabled: self.analysis_enabled,
            llm_configured: self.llm.is_some(),
            dataset_columns: self.primary_dataset.as_ref().map(Dataset::column_names),
            dictionary_columns: self.data_dictionary.as_ref().map(Dataset::column_names),
            chat_history: self.chat_history.clone(),
        }
    }

    fn require_dataset(&self) -> AppResult<&Dataset> {
        self.primary_dataset
            .as_ref()
            .ok_or_else(|| AppError::InvalidInput(UPLOAD_FIRST_REPLY.to_string()))
    }
}

fn template_name(template: PromptTemplate) -> &'static str {
    match template {
        PromptTemplate::WithDictionary => "with_dictionary",
        PromptTemplate::WithoutDictionary => "without_dictionary",
    }
}

/// All live sessions of the server, each behind its own lock so one user's
/// slow model call never blocks another.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<Uuid, RegistryEntry>>>,
}

struct RegistryEntry {
    session: Arc<Mutex<Session>>,
    last_active: Instant,
}

impl SessionRegistry {
    pub async fn insert(&self, session: Session) -> Uuid {
        let id = session.id();
        let mut guard = self.inner.write().await;
        guard.insert(
            id,
            RegistryEntry {
                session: Arc::new(Mutex::new(session)),
                last_active: Instant::now(),
            },
        );
        id
    }

    /// Look a session up and mark it as active.
    pub async fn get(&self, id: &Uuid) -> AppResult<Arc<Mutex<Session>>> {
        let mut guard = self.inner.write().await;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))?;
        entry.last_active = Instant::now();
        Ok(entry.session.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(id).is_some()
    }

    /// Drop sessions untouched for longer than `idle`. Sessions still held
    /// by an in-flight request are kept.
    pub async fn reap_idle(&self, idle: Duration) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|id, entry| {
            let keep = entry.last_active.elapsed() <= idle || Arc::strong_count(&entry.session) > 1;
            if !keep {
                debug!(session_id = %id, "Session expired");
            }
            keep
        });
        before - guard.len()
    }

    /// Periodically expire idle sessions in the background.
    pub fn spawn_reaper(&self, idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let period = idle.min(Duration::from_secs(60)).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = registry.reap_idle(idle).await;
                if removed > 0 {
                    let remaining = registry.len().await;
                    info!(removed, remaining, "Expired idle sessions");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::google::GoogleAdapter;
    use crate::llm::mock::MockAdapter;
    use crate::stats::describe;

    const DATA: &[u8] = b"name,age,score\nann,31,88.5\nbob,45,72.0\ncy,29,91.0\ndee,52,65.5\neve,38,79.0\nfay,41,84.0\n";
    const DICT: &[u8] = b"column,description\nname,First name\nage,Age in years\nscore,Test score\n";

    fn session_with(mock: &Arc<MockAdapter>) -> Session {
        let llm = LLM::from_adapter(mock.clone(), "google", "gemini-test");
        Session::new(Some(Arc::new(llm)))
    }

    #[tokio::test]
    async fn test_analysis_disabled_reply_skips_model() {
        let mock = Arc::new(MockAdapter::replying("unused"));
        let mut session = session_with(&mock);
        session.load_primary_dataset(DATA).unwrap();

        let reply = session.submit_chat_message("anything").await.unwrap();

        assert_eq!(reply.content, ENABLE_ANALYSIS_REPLY);
        assert_eq!(reply.source, ReplySource::AnalysisDisabled);
        assert!(mock.requests().is_empty());
        assert_eq!(session.chat_history().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_dataset_reply() {
        let mock = Arc::new(MockAdapter::replying("unused"));
        let mut session = session_with(&mock);
        session.set_analysis_enabled(true);

        let reply = session.submit_chat_message("analyze please").await.unwrap();

        assert_eq!(reply.content, UPLOAD_FIRST_REPLY);
        assert_eq!(reply.source, ReplySource::DatasetMissing);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_without_dictionary() {
        let mock = Arc::new(MockAdapter::replying("- ages range 29-52"));
        let mut session = session_with(&mock);
        session.load_primary_dataset(DATA).unwrap();
        session.set_analysis_enabled(true);

        let reply = session.submit_chat_message("summarize").await.unwrap();
        assert_eq!(reply.content, "- ages range 29-52");
        assert_eq!(reply.template, Some("without_dictionary"));

        let ds = session.primary_dataset().unwrap();
        let expected = PromptBuilder::new(ds).analysis_prompt("summarize");
        let prompt = mock.last_prompt().unwrap();
        assert_eq!(prompt, expected);
        assert!(prompt.contains(&describe(ds).to_text()));
        assert!(prompt.contains(&ds.head(5).to_text(true)));
        assert!(!prompt.contains("fay"));
        assert!(!prompt.contains("data dictionary"));

        let history = session.chat_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "- ages range 29-52");
    }

    #[tokio::test]
    async fn test_prompt_with_dictionary() {
        let mock = Arc::new(MockAdapter::replying("ok"));
        let mut session = session_with(&mock);
        session.load_primary_dataset(DATA).unwrap();
        session.load_data_dictionary(DICT).unwrap();
        session.set_analysis_enabled(true);

        let reply = session.submit_chat_message("insights?").await.unwrap();
        assert_eq!(reply.template, Some("with_dictionary"));

        let dict_text = session.data_dictionary().unwrap().to_text(false);
        let prompt = mock.last_prompt().unwrap();
        assert_eq!(prompt.matches(&dict_text).count(), 1);
        assert!(prompt.contains("Column descriptions from the data dictionary"));
    }

    #[tokio::test]
    async fn test_model_failure_keeps_only_user_turn() {
        let mock = Arc::new(MockAdapter::failing("quota exceeded"));
        let mut session = session_with(&mock);
        session.load_primary_dataset(DATA).unwrap();
        session.set_analysis_enabled(true);

        let err = session.submit_chat_message("hello").await.unwrap_err();

        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert_eq!(session.chat_history().len(), 1);
        assert_eq!(session.chat_history()[0].content, "hello");
        assert!(session.primary_dataset().is_some());
    }

    #[tokio::test]
    async fn test_blocked_model_reply_adds_no_assistant_turn() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)
            .create_async()
            .await;
        let adapter = Arc::new(GoogleAdapter::with_base_url("key", &server.url()));
        let llm = LLM::from_adapter(adapter, "google", "gemini-2.0-flash-lite");
        let mut session = Session::new(Some(Arc::new(llm)));
        session.load_primary_dataset(DATA).unwrap();
        session.set_analysis_enabled(true);

        let err = session.submit_chat_message("hi").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(session.chat_history().len(), 1);
        assert_eq!(session.chat_history()[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_unconfigured_model_records_user_turn() {
        let mut session = Session::new(None);
        session.load_primary_dataset(DATA).unwrap();
        session.set_analysis_enabled(true);

        let err = session.submit_chat_message("hello").await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        assert_eq!(session.chat_history().len(), 1);

        // fixed replies still work without a model
        session.set_analysis_enabled(false);
        let reply = session.submit_chat_message("hello again").await.unwrap();
        assert_eq!(reply.content, ENABLE_ANALYSIS_REPLY);
        assert_eq!(session.chat_history().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let mut session = Session::new(None);
        let err = session.submit_chat_message("   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(session.chat_history().is_empty());
    }

    #[test]
    fn test_failed_upload_keeps_previous_dataset() {
        let mut session = Session::new(None);
        assert!(session.load_primary_dataset(b"").is_err());
        assert!(session.primary_dataset().is_none());

        session.load_primary_dataset(DATA).unwrap();
        assert!(session.load_primary_dataset(b"a,b\n1,2,3\n").is_err());
        assert_eq!(session.primary_dataset().unwrap().column_names(), vec!["name", "age", "score"]);

        session.load_primary_dataset(b"x\n1\n").unwrap();
        assert_eq!(session.primary_dataset().unwrap().column_names(), vec!["x"]);
    }

    #[test]
    fn test_dictionary_is_independent() {
        let mut session = Session::new(None);
        let preview = session.load_data_dictionary(DICT).unwrap();
        assert_eq!(preview.rows.len(), 3);
        assert!(session.primary_dataset().is_none());
        assert!(session.load_data_dictionary(b"").is_err());
        assert!(session.data_dictionary().is_some());
    }

    #[tokio::test]
    async fn test_chart_suggestions_do_not_touch_history() {
        let mock = Arc::new(MockAdapter::replying("- histogram of age"));
        let mut session = session_with(&mock);
        assert!(matches!(
            session.chart_suggestions().await,
            Err(AppError::InvalidInput(_))
        ));

        session.load_primary_dataset(DATA).unwrap();
        let text = session.chart_suggestions().await.unwrap();
        assert_eq!(text, "- histogram of age");
        assert!(session.chat_history().is_empty());
        assert!(mock.last_prompt().unwrap().contains("age      int64"));
    }

    #[test]
    fn test_auto_plot_requires_dataset() {
        let mut session = Session::new(None);
        assert!(session.render_auto_plot("age", ChartKind::Histogram).is_err());
        session.load_primary_dataset(DATA).unwrap();
        let spec = session.render_auto_plot("age", ChartKind::LineChart).unwrap();
        assert_eq!(spec.points.len(), 6);
    }

    #[tokio::test]
    async fn test_registry_isolates_sessions() {
        let registry = SessionRegistry::default();
        let a = registry.insert(Session::new(None)).await;
        let b = registry.insert(Session::new(None)).await;
        assert_ne!(a, b);

        registry.get(&a).await.unwrap().lock().await.set_analysis_enabled(true);
        assert!(!registry.get(&b).await.unwrap().lock().await.analysis_enabled());

        assert!(registry.remove(&a).await);
        assert!(matches!(registry.get(&a).await, Err(AppError::NotFound(_))));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_reaped() {
        let registry = SessionRegistry::default();
        let stale = registry.insert(Session::new(None)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let fresh = registry.insert(Session::new(None)).await;

        assert_eq!(registry.reap_idle(Duration::from_millis(40)).await, 1);
        assert!(matches!(registry.get(&stale).await, Err(AppError::NotFound(_))));
        assert!(registry.get(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_held_session_survives_reaping() {
        let registry = SessionRegistry::default();
        let id = registry.insert(Session::new(None)).await;
        let held = registry.get(&id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(registry.reap_idle(Duration::from_millis(1)).await, 0);
        drop(held);
        assert_eq!(registry.reap_idle(Duration::from_millis(1)).await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_reaper_task_expires_sessions() {
        let registry = SessionRegistry::default();
        registry.insert(Session::new(None)).await;
        let handle = registry.spawn_reaper(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(registry.is_empty().await);
        handle.abort();
    }
}

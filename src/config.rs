use anyhow::{bail, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::prompt::DEFAULT_SAMPLE_ROWS;
use crate::types::LLMProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Rows shown in previews and sent as the prompt sample. At least 1.
    pub sample_rows: usize,
    /// Seconds of inactivity before a session is dropped; 0 keeps sessions
    /// until they are deleted.
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<String>,
}

impl LLMConfig {
    /// The configured credential, ignoring blank values.
    pub fn active_api_key(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["http://localhost:3000".to_string()],
                max_upload_bytes: 50 * 1024 * 1024,
            },
            llm: LLMConfig {
                provider: "google".to_string(),
                model: crate::llm::google::DEFAULT_MODEL.to_string(),
                api_key: None,
                base_url: None,
                max_tokens: 2048,
                temperature: 0.7,
            },
            session: SessionConfig {
                sample_rows: DEFAULT_SAMPLE_ROWS,
                idle_timeout_secs: 3600,
            },
            logging: LoggingConfig { log_dir: None },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let provider = env::var("LLM_PROVIDER").unwrap_or_else(|_| "google".to_string());
        let api_key = match LLMProvider::parse(&provider) {
            Some(LLMProvider::Google) => env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("GOOGLE_API_KEY"))
                .ok(),
            _ => env::var("OPENAI_API_KEY").ok(),
        };
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| default_model(&provider).to_string());

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| (50 * 1024 * 1024).to_string())
                    .parse()?,
            },
            llm: LLMConfig {
                provider,
                model,
                api_key,
                base_url: env::var("LLM_BASE_URL").ok().filter(|u| !u.is_empty()),
                max_tokens: env::var("LLM_MAX_TOKENS")
                    .unwrap_or_else(|_| "2048".to_string())
                    .parse()?,
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
            },
            session: SessionConfig {
                sample_rows: parse_sample_rows(
                    &env::var("SAMPLE_ROWS").unwrap_or_else(|_| DEFAULT_SAMPLE_ROWS.to_string()),
                )?,
                idle_timeout_secs: env::var("SESSION_IDLE_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            },
        })
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Default model for a provider name; unknown names get the Gemini default
/// and fail later when the model is built.
pub fn default_model(provider: &str) -> &'static str {
    match LLMProvider::parse(provider) {
        Some(LLMProvider::OpenAI) => crate::llm::openai::DEFAULT_MODEL,
        _ => crate::llm::google::DEFAULT_MODEL,
    }
}

fn parse_sample_rows(raw: &str) -> Result<usize> {
    let rows: usize = raw.trim().parse()?;
    if rows == 0 {
        bail!("SAMPLE_ROWS must be at least 1");
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_api_key_is_inactive() {
        let mut config = Config::default();
        assert_eq!(config.llm.active_api_key(), None);

        config.llm.api_key = Some("   ".to_string());
        assert_eq!(config.llm.active_api_key(), None);

        config.llm.api_key = Some(" key-123 ".to_string());
        assert_eq!(config.llm.active_api_key(), Some("key-123".to_string()));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.sample_rows, 5);
        assert_eq!(config.llm.model, "gemini-2.0-flash-lite");
    }

    #[test]
    fn test_default_model_follows_provider_family() {
        assert_eq!(default_model("gemini"), crate::llm::google::DEFAULT_MODEL);
        assert_eq!(default_model("OpenRouter"), crate::llm::openai::DEFAULT_MODEL);
        assert_eq!(default_model("groq"), crate::llm::openai::DEFAULT_MODEL);
        assert_eq!(default_model("glm"), crate::llm::openai::DEFAULT_MODEL);
    }

    #[test]
    fn test_sample_rows_must_be_positive() {
        assert_eq!(parse_sample_rows("5").unwrap(), 5);
        assert_eq!(parse_sample_rows(" 12 ").unwrap(), 12);
        assert!(parse_sample_rows("0").is_err());
        assert!(parse_sample_rows("many").is_err());
    }

    #[test]
    fn test_idle_timeout_zero_disables_expiry() {
        let mut config = Config::default();
        assert_eq!(config.session.idle_timeout(), Some(Duration::from_secs(3600)));
        config.session.idle_timeout_secs = 0;
        assert_eq!(config.session.idle_timeout(), None);
    }
}

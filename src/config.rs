use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use log::{info, warn};

use crate::error::AppError;

const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    pub frontend_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub llm_timeout_secs: u64,
    pub database_dir: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u32,
    pub session_hours: u64,
    pub completion_webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            bind_addr: "0.0.0.0".to_string(),
            frontend_url: None,
            gemini_api_key: None,
            gemini_model: "gemini-3-flash-preview".to_string(),
            gemini_endpoint: "https://generativelanguage.googleapis.com".to_string(),
            llm_timeout_secs: 30,
            database_dir: PathBuf::from("database"),
            catalog_path: None,
            static_dir: PathBuf::from("static"),
            rate_limit_window_secs: 15 * 60,
            rate_limit_max: 100,
            session_hours: 24,
            completion_webhook_url: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let defaults = Self::default();

        Ok(Self {
            port: try_load("PORT", defaults.port)?,
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr)?,
            frontend_url: optional("FRONTEND_URL"),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: try_load("GEMINI_MODEL", defaults.gemini_model)?,
            gemini_endpoint: try_load("GEMINI_ENDPOINT", defaults.gemini_endpoint)?,
            llm_timeout_secs: try_load("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            database_dir: optional("DATABASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_dir),
            catalog_path: optional("CATALOG_PATH").map(PathBuf::from),
            static_dir: optional("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            rate_limit_window_secs: try_load(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            )?,
            rate_limit_max: try_load("RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            session_hours: try_load("SESSION_HOURS", defaults.session_hours)?,
            completion_webhook_url: optional("COMPLETION_WEBHOOK_URL"),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Origins allowed to call the API with credentials.
    pub fn allowed_origins(&self) -> Vec<String> {
        DEV_ORIGINS
            .iter()
            .map(|origin| origin.to_string())
            .chain(self.frontend_url.clone())
            .collect()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_hours * 60 * 60)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw.parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::Internal(format!("Environment misconfigured: {key}={raw} ({e})"))
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

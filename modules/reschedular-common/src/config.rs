use std::env;

use crate::error::ConfigError;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Secrets and environment-specific values, loaded from environment variables.
/// Tunables live in the TOML `FileConfig`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Postgres connection string. Unset means the in-memory store.
    pub database_url: Option<String>,

    /// Endpoint that outbound events are POSTed to. Unset means log-only delivery.
    pub broker_url: Option<String>,
    pub broker_token: Option<String>,

    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let log_format = match optional_env("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnv {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            database_url: optional_env("DATABASE_URL"),
            broker_url: optional_env("BROKER_URL"),
            broker_token: optional_env("BROKER_TOKEN"),
            log_format,
        })
    }

    /// Log which settings are present without leaking their values.
    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) => {
                    let head: String = v.chars().take(5).collect();
                    format!("{head}...({} chars)", v.chars().count())
                }
                None => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview_opt(&self.database_url));
        tracing::info!("  BROKER_URL: {}", preview_opt(&self.broker_url));
        tracing::info!("  BROKER_TOKEN: {}", preview_opt(&self.broker_token));
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

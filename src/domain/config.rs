use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Language;

/// Network-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// When true, all network requests are blocked.
    pub local_only: bool,
    /// Allowed domains when local_only is false. Subdomains are allowed too.
    pub allowed_domains: Vec<String>,
    /// Upper bound for a single model download.
    pub download_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_only: false,
            allowed_domains: Self::default_allowed_domains(),
            download_timeout_secs: 3600,
        }
    }
}

impl NetworkConfig {
    /// Default allowed domains for model downloads and the responder API.
    pub fn default_allowed_domains() -> Vec<String> {
        vec![
            "huggingface.co".to_string(),
            "hf.co".to_string(),
            "api.siliconflow.cn".to_string(),
        ]
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Model library configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModelsConfig {
    /// Override for the model directory. Defaults to `<data dir>/models`.
    pub models_dir: Option<PathBuf>,
    /// Filename of a downloaded model to load at startup.
    pub auto_load: Option<String>,
}

/// Push-to-talk configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Language used for new turns until the user picks another.
    pub default_language: Language,
}

/// Chat-completions responder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.siliconflow.cn/v1/chat/completions".to_string(),
            model: "Qwen/Qwen2.5-7B-Instruct".to_string(),
            api_key_env: "SILICONFLOW_API_KEY".to_string(),
            temperature: 0.3,
            max_tokens: 150,
        }
    }
}

/// Simulator telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Interval between flight data polls.
    pub poll_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub network: NetworkConfig,
    pub models: ModelsConfig,
    pub session: SessionConfig,
    pub responder: ResponderConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

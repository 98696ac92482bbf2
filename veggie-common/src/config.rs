//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (both handled by the binary's `clap` parser and
//!    passed in as [`ConfigOverrides`])
//! 3. TOML config file
//! 4. Built-in default (optional settings only)
//!
//! Broker address/port/topic, HTTP host/port and the reasoning-service API
//! key are required. Any of them missing is a startup error, never a
//! runtime one.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default reasoning-service base URL (OpenAI-compatible)
pub const DEFAULT_REASONING_BASE_URL: &str = "https://api.openai.com/v1";
/// Default reasoning model
pub const DEFAULT_REASONING_MODEL: &str = "gpt-3.5-turbo";
/// Default maximum accepted upload size (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// TOML file schema
// ============================================================================

/// Configuration file contents
///
/// Every field is optional; required values may instead come from the
/// command line or environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub broker: BrokerSection,
    pub http: HttpSection,
    pub reasoning: ReasoningSection,
    pub analysis: AnalysisSection,
    pub logging: LoggingConfig,
}

/// `[broker]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub topic: Option<String>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub reconnect_min_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
}

/// `[http]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_bytes: Option<usize>,
}

/// `[reasoning]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReasoningSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// `[analysis]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub classifier_timeout_secs: Option<u64>,
    pub event_capacity: Option<usize>,
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load the TOML configuration file
///
/// An explicitly given path must exist and parse. Without one, the
/// platform config file (`<config_dir>/veggie-vision/config.toml`) is used
/// when present; otherwise an empty configuration is returned.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => {
                info!("No config file found, using command line and environment only");
                return Ok(TomlConfig::default());
            }
        },
    };

    info!("Loading config file: {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    parse_toml_config(&content)
}

/// Parse configuration file contents
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    Ok(toml::from_str(content)?)
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("veggie-vision").join("config.toml"))
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub broker_host: Option<String>,
    pub broker_port: Option<u16>,
    pub broker_topic: Option<String>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
    pub reasoning_api_key: Option<String>,
    pub reasoning_base_url: Option<String>,
    pub reasoning_model: Option<String>,
    pub log_level: Option<String>,
}

/// MQTT broker connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl HttpConfig {
    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reasoning-service client settings
#[derive(Clone, PartialEq)]
pub struct ReasoningConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

// Keep the API key out of logs
impl std::fmt::Debug for ReasoningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Analysis pipeline settings
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub classifier_timeout: Duration,
    pub event_capacity: usize,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub broker: BrokerConfig,
    pub http: HttpConfig,
    pub reasoning: ReasoningConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Merge overrides over the TOML file and validate required settings
    ///
    /// Reports every missing required key at once.
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let mut missing = Vec::new();

        let broker_host = non_empty(overrides.broker_host.or(toml.broker.host));
        let broker_port = overrides.broker_port.or(toml.broker.port);
        let broker_topic = non_empty(overrides.broker_topic.or(toml.broker.topic));
        let http_host = non_empty(overrides.http_host.or(toml.http.host));
        let http_port = overrides.http_port.or(toml.http.port);
        let api_key = non_empty(overrides.reasoning_api_key.or(toml.reasoning.api_key));

        if broker_host.is_none() {
            missing.push("broker host (MQTT_BROKER / [broker].host)");
        }
        if broker_port.is_none() {
            missing.push("broker port (MQTT_PORT / [broker].port)");
        }
        if broker_topic.is_none() {
            missing.push("broker topic (MQTT_TOPIC / [broker].topic)");
        }
        if http_host.is_none() {
            missing.push("HTTP host (API_HOST / [http].host)");
        }
        if http_port.is_none() {
            missing.push("HTTP port (API_PORT / [http].port)");
        }
        if api_key.is_none() {
            missing.push("reasoning API key (OPENAI_API_KEY / [reasoning].api_key)");
        }

        let (
            Some(broker_host),
            Some(broker_port),
            Some(broker_topic),
            Some(http_host),
            Some(http_port),
            Some(api_key),
        ) = (broker_host, broker_port, broker_topic, http_host, http_port, api_key)
        else {
            return Err(Error::Config(format!(
                "Missing required settings:\n  - {}",
                missing.join("\n  - ")
            )));
        };

        let reconnect_min = Duration::from_millis(toml.broker.reconnect_min_ms.unwrap_or(500));
        let reconnect_max = Duration::from_millis(toml.broker.reconnect_max_ms.unwrap_or(30_000));
        if reconnect_min > reconnect_max {
            return Err(Error::InvalidInput(format!(
                "reconnect_min_ms ({:?}) exceeds reconnect_max_ms ({:?})",
                reconnect_min, reconnect_max
            )));
        }

        let event_capacity = toml.analysis.event_capacity.unwrap_or(100);
        if event_capacity == 0 {
            return Err(Error::InvalidInput("event_capacity must be at least 1".to_string()));
        }

        let logging = match overrides.log_level {
            Some(level) => LoggingConfig { level },
            None => toml.logging,
        };

        Ok(Self {
            broker: BrokerConfig {
                host: broker_host,
                port: broker_port,
                topic: broker_topic,
                client_id: toml
                    .broker
                    .client_id
                    .unwrap_or_else(|| format!("veggie-vision-{}", std::process::id())),
                keep_alive: Duration::from_secs(toml.broker.keep_alive_secs.unwrap_or(30)),
                connect_timeout: Duration::from_secs(toml.broker.connect_timeout_secs.unwrap_or(10)),
                reconnect_min,
                reconnect_max,
            },
            http: HttpConfig {
                host: http_host,
                port: http_port,
                max_upload_bytes: toml.http.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            reasoning: ReasoningConfig {
                api_key,
                base_url: non_empty(overrides.reasoning_base_url.or(toml.reasoning.base_url))
                    .unwrap_or_else(|| DEFAULT_REASONING_BASE_URL.to_string()),
                model: non_empty(overrides.reasoning_model.or(toml.reasoning.model))
                    .unwrap_or_else(|| DEFAULT_REASONING_MODEL.to_string()),
                timeout: Duration::from_secs(toml.reasoning.timeout_secs.unwrap_or(15)),
                temperature: toml.reasoning.temperature.unwrap_or(0.7),
                max_tokens: toml.reasoning.max_tokens.unwrap_or(150),
            },
            analysis: AnalysisConfig {
                classifier_timeout: Duration::from_secs(
                    toml.analysis.classifier_timeout_secs.unwrap_or(10),
                ),
                event_capacity,
            },
            logging,
        })
    }
}

/// Treat empty or whitespace-only values as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

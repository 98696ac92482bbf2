//! Command-line arguments for veggie-api
//!
//! Every flag also reads an environment variable; values given here win
//! over the TOML file.

use clap::Parser;
use std::path::PathBuf;
use veggie_common::config::{ConfigOverrides, LoggingConfig};

/// Command-line arguments for veggie-api
#[derive(Parser, Debug)]
#[command(name = "veggie-api")]
#[command(about = "Produce ripeness analysis service with live ambient telemetry")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VEGGIE_CONFIG")]
    pub config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER")]
    pub mqtt_broker: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT")]
    pub mqtt_port: Option<u16>,

    /// MQTT topic carrying ambient telemetry
    #[arg(long, env = "MQTT_TOPIC")]
    pub mqtt_topic: Option<String>,

    /// HTTP bind host
    #[arg(long, env = "API_HOST")]
    pub api_host: Option<String>,

    /// HTTP bind port
    #[arg(long, env = "API_PORT")]
    pub api_port: Option<u16>,

    /// Reasoning service API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Reasoning service base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Reasoning model name
    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Log level used before the config file has been read
    pub fn startup_log_level(&self) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| LoggingConfig::default().level)
    }

    /// Overrides applied on top of the TOML file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            broker_host: self.mqtt_broker.clone(),
            broker_port: self.mqtt_port,
            broker_topic: self.mqtt_topic.clone(),
            http_host: self.api_host.clone(),
            http_port: self.api_port,
            reasoning_api_key: self.openai_api_key.clone(),
            reasoning_base_url: self.openai_base_url.clone(),
            reasoning_model: self.openai_model.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

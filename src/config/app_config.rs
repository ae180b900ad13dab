use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Knobs supplied to the engine at construction
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between scheduled evaluations of one experiment
    pub check_interval_secs: u64,
    pub enable_auto_end: bool,
    /// Confidence used when a significance condition omits its own target
    pub default_confidence_threshold: f64,
    /// Per-variant sample size below which results are flagged as low
    pub minimum_sample_size: u64,
    /// Runtime after which an experiment is flagged as long running
    pub maximum_duration_days: f64,
    pub notification_timeout_secs: u64,
    pub export_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 3600,
            enable_auto_end: true,
            default_confidence_threshold: 0.95,
            minimum_sample_size: 100,
            maximum_duration_days: 30.0,
            notification_timeout_secs: 10,
            export_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Webhook delivery of auto-end notifications; disabled without a URL
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    /// HMAC-SHA256 signing secret
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory written by the file export destination
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

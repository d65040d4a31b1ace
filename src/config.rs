use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct IntentGroup {
    pub label: String,
    pub sentences: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    pub target_count: usize,
    pub max_attempts: u32,
    pub per_request_timeout_ms: u64,
    #[serde(default)]
    pub require_source_url: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
    /// Self-hosted Bot API server; defaults to api.telegram.org.
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngagementConfig {
    pub threshold: f64,
    pub cap: usize,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    pub item: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Paginated HTML feed; `url_template` carries `{query}` and `{page}` placeholders.
    Html {
        url_template: String,
        #[serde(default = "default_user_agent")]
        user_agent: String,
        selectors: SelectorConfig,
    },
    Simulated {
        posts: Vec<String>,
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_step")]
        step: usize,
        #[serde(default)]
        duplicate_rate: f64,
        #[serde(default)]
        seed: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub csv_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            csv_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub queries: Vec<String>,
    pub collector: CollectorConfig,
    pub engagement: EngagementConfig,
    pub intents: Vec<IntentGroup>,
    pub feed: FeedConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub check_interval_seconds: Option<u64>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) IntentSniperBot/0.1".to_string()
}

fn default_window() -> usize {
    10
}

fn default_step() -> usize {
    5
}

fn default_database() -> String {
    "data.db".to_string()
}

impl AppConfig {
    /// Checks the ranges the collector and ranker rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queries.is_empty() {
            return invalid("at least one query is required");
        }
        if self.collector.target_count == 0 {
            return invalid("collector.target_count must be > 0");
        }
        if self.collector.max_attempts == 0 {
            return invalid("collector.max_attempts must be > 0");
        }
        if self.collector.per_request_timeout_ms == 0 {
            return invalid("collector.per_request_timeout_ms must be > 0");
        }
        if !(0.0..=1.0).contains(&self.engagement.threshold) {
            return invalid("engagement.threshold must lie in [0, 1]");
        }
        if self.intents.iter().all(|g| g.sentences.is_empty()) {
            return invalid("intents must contain at least one sentence");
        }
        if let FeedConfig::Simulated { window, step, duplicate_rate, .. } = &self.feed {
            if *window == 0 || *step == 0 {
                return invalid("feed.window and feed.step must be > 0");
            }
            if !(0.0..=1.0).contains(duplicate_rate) {
                return invalid("feed.duplicate_rate must lie in [0, 1]");
            }
        }
        Ok(())
    }

    pub fn intent_groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.intents
            .iter()
            .map(|g| (g.label.as_str(), g.sentences.as_slice()))
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

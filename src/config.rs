//! Runtime configuration for the chart analysis bot
//!
//! Loaded once from environment variables (plus `.env` via dotenvy) and
//! passed to constructors as an immutable struct. Missing credentials abort
//! startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::formatter::Style;
use crate::prompts::TimeframeProfile;
use crate::{Error, Result};

/// Known-good general-purpose vision model used for fallback and for the
/// credential connectivity check.
pub const STANDARD_MODEL: &str = "gpt-4o";

/// Prefix that marks a custom GPT deployment id.
pub const CUSTOM_MODEL_PREFIX: &str = "g-";

pub const DEFAULT_USERS_FILE: &str = "config/users.json";
const DEFAULT_TEMP_DIR: &str = "temp";
const DEFAULT_BOT_NAME: &str = "ChartWatch AI";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Main configuration struct.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub openai_api_key: String,
    /// Custom GPT deployment id (`g-...`), empty when unset.
    pub chart_model: String,
    /// Model used when no custom deployment is configured.
    pub default_model: String,
    /// Retry a failed custom-model call against [`STANDARD_MODEL`].
    pub use_fallback: bool,
    pub users_file: PathBuf,
    pub default_admin_ids: Vec<i64>,
    pub temp_dir: PathBuf,
    pub bot_name: String,
    pub profile: TimeframeProfile,
    pub response_style: Style,
    pub request_timeout: Duration,
    pub max_tokens: u32,
}

impl Config {
    /// Build configuration from the environment. Fails fast when a required
    /// credential is missing.
    pub fn from_env() -> Result<Self> {
        let telegram_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| Error::InvalidArgument("TELEGRAM_BOT_TOKEN not set".to_string()))?;
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| Error::InvalidArgument("OPENAI_API_KEY not set".to_string()))?;

        let profile = match env::var("TIMEFRAME_PROFILE") {
            Ok(value) => TimeframeProfile::parse(&value)?,
            Err(_) => TimeframeProfile::M15,
        };

        let timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let max_tokens = env::var("OPENAI_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Ok(Self {
            telegram_token,
            openai_api_key,
            chart_model: env::var("CHART_MODEL_ID").unwrap_or_default(),
            default_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| STANDARD_MODEL.to_string()),
            use_fallback: parse_bool(env::var("USE_FALLBACK").as_deref().unwrap_or("true")),
            users_file: PathBuf::from(
                env::var("USERS_FILE").unwrap_or_else(|_| DEFAULT_USERS_FILE.to_string()),
            ),
            default_admin_ids: parse_admin_ids(env::var("DEFAULT_ADMIN_IDS").as_deref().unwrap_or("")),
            temp_dir: PathBuf::from(
                env::var("TEMP_DIR").unwrap_or_else(|_| DEFAULT_TEMP_DIR.to_string()),
            ),
            bot_name: env::var("BOT_NAME").unwrap_or_else(|_| DEFAULT_BOT_NAME.to_string()),
            profile,
            response_style: parse_style(env::var("RESPONSE_STYLE").as_deref().unwrap_or("")),
            request_timeout: Duration::from_secs(timeout_secs),
            max_tokens,
        })
    }

    /// Whether a custom GPT deployment is configured.
    pub fn has_custom_model(&self) -> bool {
        crate::router::is_custom_model(&self.chart_model)
    }
}

/// Parse a boolean env value ("true"/"1"/"yes", case-insensitive).
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse the reply style; anything but "simple" means the detailed layout.
pub fn parse_style(value: &str) -> Style {
    if value.trim().eq_ignore_ascii_case("simple") {
        Style::Simple
    } else {
        Style::Detailed
    }
}

/// Parse a comma-separated admin id list, skipping malformed entries.
pub fn parse_admin_ids(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

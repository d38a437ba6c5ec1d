// src/config/app.rs
use std::env;
use std::path::PathBuf;

use crate::domain::PlausibleBand;

const TELEGRAM_PLACEHOLDER: &str = "your_telegram_bot_token_here";

/// Runtime settings, read from the environment (`.env` is loaded by the binary).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub fetch_timeout_secs: u64,
    pub scrape_concurrency: usize,
    pub notify_concurrency: usize,
    pub scrape_interval_secs: u64,
    pub target_currency: String,
    /// Enables threshold alerts when set.
    pub threshold_percent: Option<f64>,
    pub alert_cooldown_secs: i64,
    /// Global band for single-number quotes; sources may override it.
    pub parser_band: Option<PlausibleBand>,
    pub state_dir: PathBuf,
    pub telegram_token: Option<String>,
    pub telegram_api_base: String,
    pub enable_telegram_bot: bool,
    pub vapid_private_key_path: Option<PathBuf>,
    pub vapid_subject: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            scrape_concurrency: 4,
            notify_concurrency: 8,
            scrape_interval_secs: 2 * 3600,
            target_currency: "BOB".to_string(),
            threshold_percent: None,
            alert_cooldown_secs: 3600,
            parser_band: None,
            state_dir: PathBuf::from("state"),
            telegram_token: None,
            telegram_api_base: "https://api.telegram.org".to_string(),
            enable_telegram_bot: false,
            vapid_private_key_path: None,
            vapid_subject: "mailto:contact@dollaralert.bo".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();

        let parser_band = match (env_parse::<f64>("PARSER_MIN_RATE"), env_parse::<f64>("PARSER_MAX_RATE")) {
            (Some(lo), Some(hi)) => Some(PlausibleBand::new(lo, hi)),
            (Some(lo), None) => Some(PlausibleBand::new(lo, f64::MAX)),
            (None, Some(hi)) => Some(PlausibleBand::new(f64::MIN_POSITIVE, hi)),
            (None, None) => None,
        };

        let telegram_token = env_string("TELEGRAM_TOKEN").filter(|t| t != TELEGRAM_PLACEHOLDER);

        Self {
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS").unwrap_or(d.fetch_timeout_secs),
            scrape_concurrency: env_parse("SCRAPE_CONCURRENCY")
                .unwrap_or(d.scrape_concurrency)
                .max(1),
            notify_concurrency: env_parse("NOTIFY_CONCURRENCY")
                .unwrap_or(d.notify_concurrency)
                .max(1),
            scrape_interval_secs: env_parse("SCRAPE_INTERVAL_SECS")
                .unwrap_or(d.scrape_interval_secs)
                .max(1),
            target_currency: env_string("TARGET_CURRENCY")
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or(d.target_currency),
            threshold_percent: env_parse::<f64>("THRESHOLD_PERCENT")
                .filter(|t| t.is_finite() && *t > 0.0),
            alert_cooldown_secs: env_parse("ALERT_COOLDOWN_SECS").unwrap_or(d.alert_cooldown_secs),
            parser_band,
            state_dir: env_string("STATE_DIR").map(PathBuf::from).unwrap_or(d.state_dir),
            enable_telegram_bot: env_flag("ENABLE_TELEGRAM_BOT") && telegram_token.is_some(),
            telegram_token,
            telegram_api_base: env_string("TELEGRAM_API_BASE").unwrap_or(d.telegram_api_base),
            vapid_private_key_path: env_string("VAPID_PRIVATE_KEY_PATH").map(PathBuf::from),
            vapid_subject: env_string("VAPID_SUBJECT").unwrap_or(d.vapid_subject),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    env_string(key).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

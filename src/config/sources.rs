// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{NotificationSubscriber, RateCategory, ScrapingSource};

pub const ENV_SOURCES_PATH: &str = "SCRAPING_SOURCES_PATH";
pub const ENV_SUBSCRIBERS_PATH: &str = "SUBSCRIBERS_PATH";

/// Load sources from an explicit path. Supports TOML (`[[sources]]`) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<ScrapingSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading scraping sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing scraping sources in {}", path.display()))
}

/// Load sources using env var + fallbacks:
/// 1) $SCRAPING_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in defaults
pub fn load_sources_default() -> Result<Vec<ScrapingSource>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    tracing::info!("no sources file found, using built-in sources");
    Ok(default_sources())
}

/// Subscribers seeded at startup: $SUBSCRIBERS_PATH, else config/subscribers.json, else none.
pub fn load_subscribers_default() -> Result<Vec<NotificationSubscriber>> {
    let path = match std::env::var(ENV_SUBSCRIBERS_PATH) {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("config/subscribers.json"),
    };
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("reading subscribers from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing subscribers in {}", path.display()))
}

pub fn default_sources() -> Vec<ScrapingSource> {
    vec![
        ScrapingSource {
            id: "1".into(),
            name: "Banco Central de Bolivia".into(),
            url: "https://www.bcb.gob.bo/".into(),
            selector: ".tipo-cambio .valor".into(),
            currency: "USD".into(),
            frequency: Some("0 */6 * * *".into()),
            is_active: true,
            rate_type: RateCategory::Official,
            plausible_range: Some([5.0, 10.0]),
        },
        ScrapingSource {
            id: "2".into(),
            name: "Dolar Bolivia".into(),
            url: "https://dolarbolivia.com/".into(),
            selector: ".col-md-6 .card .card-body .h3".into(),
            currency: "USD".into(),
            frequency: Some("0 */2 * * *".into()),
            is_active: true,
            rate_type: RateCategory::Parallel,
            plausible_range: Some([5.0, 30.0]),
        },
    ]
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<ScrapingSource>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported scraping sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<ScrapingSource>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<ScrapingSource>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<ScrapingSource>> {
    let v: Vec<ScrapingSource> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim text fields, drop entries without url or selector, keep the first of duplicate ids.
fn clean_list(items: Vec<ScrapingSource>) -> Vec<ScrapingSource> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        it.url = it.url.trim().to_string();
        it.selector = it.selector.trim().to_string();
        it.currency = it.currency.trim().to_ascii_uppercase();
        if it.url.is_empty() || it.selector.is_empty() {
            tracing::warn!(source = %it.name, "source without url or selector dropped");
            continue;
        }
        if seen.insert(it.id.clone()) {
            out.push(it);
        }
    }
    out
}

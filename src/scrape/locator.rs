// src/scrape/locator.rs
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ExtractError;

/// Collapse whitespace (including NBSP) and trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).replace('\u{00A0}', " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Text of the first element matching the CSS `locator`, normalized.
///
/// The parsed document is not `Send`; callers must not hold it across an await.
pub fn extract_text(html: &str, locator: &str) -> Result<String, ExtractError> {
    let selector = Selector::parse(locator).map_err(|e| ExtractError::InvalidLocator {
        locator: locator.to_string(),
        reason: e.to_string(),
    })?;

    let doc = Html::parse_document(html);
    let el = doc
        .select(&selector)
        .next()
        .ok_or_else(|| ExtractError::NoMatch(locator.to_string()))?;

    let text = normalize_text(&el.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        return Err(ExtractError::EmptyText(locator.to_string()));
    }
    Ok(text)
}

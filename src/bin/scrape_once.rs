//! Scrape every configured source once and print the parsed quotes as JSON.
//! Nothing is stored and nobody is notified; useful for checking locators.

use std::sync::Arc;

use fx_rate_alerts::config::sources::load_sources_default;
use fx_rate_alerts::config::AppConfig;
use fx_rate_alerts::scrape::fetcher::HttpFetcher;
use fx_rate_alerts::scrape::parser::RateParser;
use fx_rate_alerts::scrape::ScraperEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    fx_rate_alerts::init_tracing();

    let cfg = AppConfig::from_env();
    let sources = load_sources_default()?;
    let fetcher = Arc::new(HttpFetcher::new(cfg.fetch_timeout_secs)?);
    let engine = ScraperEngine::new(fetcher, cfg.target_currency)
        .with_parser(RateParser::new().with_band(cfg.parser_band))
        .with_concurrency(cfg.scrape_concurrency);

    let results = engine.scrape_all(&sources).await;
    println!("{}", serde_json::to_string_pretty(&results)?);
    eprintln!("scraped {} of {} sources", results.len(), sources.len());
    Ok(())
}

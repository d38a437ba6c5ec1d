// src/scrape/mod.rs
pub mod fetcher;
pub mod locator;
pub mod parser;

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

use crate::domain::{RawScrapeResult, ScrapingSource};
use crate::error::ScrapeError;
use fetcher::PageFetcher;
use parser::RateParser;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_sources_total", "Sources attempted by the scraper.");
        describe_counter!(
            "scrape_failures_total",
            "Sources skipped, labelled by failing stage."
        );
        describe_histogram!("scrape_duration_ms", "Per-source scrape time in milliseconds.");
    });
}

/// Fetch, locate and parse every active source, skipping the ones that fail.
pub struct ScraperEngine {
    fetcher: Arc<dyn PageFetcher>,
    parser: RateParser,
    target_currency: String,
    concurrency: usize,
}

impl ScraperEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, target_currency: impl Into<String>) -> Self {
        Self {
            fetcher,
            parser: RateParser::default(),
            target_currency: target_currency.into(),
            concurrency: 4,
        }
    }

    /// Parser used for sources without their own `plausible_range`.
    pub fn with_parser(mut self, parser: RateParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Best-effort batch: results keep source order, failed sources are absent.
    pub async fn scrape_all(&self, sources: &[ScrapingSource]) -> Vec<RawScrapeResult> {
        ensure_metrics_described();

        let active: Vec<&ScrapingSource> = sources.iter().filter(|s| s.is_active).collect();
        if active.is_empty() {
            tracing::info!("no active scraping sources");
            return Vec::new();
        }

        // Build the futures eagerly; a lazy `map` on the stream makes the batch non-`Send`.
        let jobs: Vec<_> = active
            .into_iter()
            .map(|src| async move { (src, self.scrape_source(src).await) })
            .collect();
        let outcomes: Vec<(&ScrapingSource, Result<RawScrapeResult, ScrapeError>)> =
            stream::iter(jobs).buffered(self.concurrency).collect().await;

        let mut out = Vec::with_capacity(outcomes.len());
        for (src, res) in outcomes {
            match res {
                Ok(r) => out.push(r),
                Err(e) => {
                    tracing::warn!(
                        source = %src.name,
                        url = %src.url,
                        stage = e.stage(),
                        error = %e,
                        "source skipped"
                    );
                    counter!("scrape_failures_total", "stage" => e.stage()).increment(1);
                }
            }
        }

        tracing::info!(ok = out.len(), total = sources.len(), "scrape batch done");
        out
    }

    pub async fn scrape_source(&self, source: &ScrapingSource) -> Result<RawScrapeResult, ScrapeError> {
        let t0 = std::time::Instant::now();
        counter!("scrape_sources_total").increment(1);

        let html = self.fetcher.fetch(source).await?;
        let text = locator::extract_text(&html, &source.selector)?;

        let parser = match source.plausible_band() {
            Some(band) => self.parser.with_band(Some(band)),
            None => self.parser,
        };
        let quote = parser.parse(&text).inspect_err(|e| {
            tracing::debug!(source = %source.name, text = %text, error = %e, "unparseable rate text");
        })?;

        histogram!("scrape_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        Ok(RawScrapeResult {
            category: source.rate_type,
            base_currency: source.currency.clone(),
            target_currency: self.target_currency.clone(),
            buy_price: quote.buy,
            sell_price: quote.sell,
            source: source.name.clone(),
            captured_at: Utc::now(),
        })
    }
}

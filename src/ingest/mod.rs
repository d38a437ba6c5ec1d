// src/ingest/mod.rs
//! Raw scrape results → canonical current rates + historical snapshots.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::domain::{ExchangeRate, HistoricalRate, RateKey, RawScrapeResult};
use crate::error::PersistenceError;
use crate::store::RateRepository;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_rates_total", "Rates written as current + historical.");
        describe_counter!(
            "ingest_failures_total",
            "Rates dropped because the store failed."
        );
        describe_counter!(
            "ingest_stale_total",
            "Observations older than the current record, kept as history only."
        );
    });
}

pub struct RateIngestor {
    rates: Arc<dyn RateRepository>,
}

impl RateIngestor {
    pub fn new(rates: Arc<dyn RateRepository>) -> Self {
        Self { rates }
    }

    /// Persist each result and return the rates that became current.
    ///
    /// Results are applied in capture order so that, within a batch, the
    /// latest observation of a key ends up as its current record. A store
    /// failure drops that rate only. An observation older than the stored
    /// current record is kept as history but not returned.
    pub async fn ingest(&self, mut raw: Vec<RawScrapeResult>) -> Vec<ExchangeRate> {
        ensure_metrics_described();
        raw.sort_by_key(|r| r.captured_at);

        let mut out = Vec::with_capacity(raw.len());
        for r in &raw {
            match self.ingest_one(r).await {
                Ok(Some(rate)) => {
                    counter!("ingest_rates_total").increment(1);
                    out.push(rate);
                }
                Ok(None) => {
                    counter!("ingest_stale_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %r.source,
                        category = r.category.as_str(),
                        base = %r.base_currency,
                        error = %e,
                        "rate not persisted"
                    );
                    counter!("ingest_failures_total").increment(1);
                }
            }
        }
        out
    }

    /// History is written before the current record: a failed upsert leaves an
    /// extra history row, never a current record that was not announced.
    async fn ingest_one(&self, raw: &RawScrapeResult) -> Result<Option<ExchangeRate>, PersistenceError> {
        let key = RateKey {
            category: raw.category,
            base_currency: raw.base_currency.clone(),
            target_currency: raw.target_currency.clone(),
        };
        let previous = self.rates.current_rate(&key).await?;
        let rate = ExchangeRate::derive(raw, previous.as_ref(), Utc::now());

        self.rates
            .append_historical_rate(HistoricalRate::from(&rate))
            .await?;

        let current = self.rates.upsert_current_rate(rate.clone()).await?;
        if current.id != rate.id {
            tracing::debug!(key = %key, "newer observation already current; kept as history only");
            return Ok(None);
        }

        tracing::debug!(
            key = %key,
            avg = rate.average_price,
            change_pct = rate.change_percentage_24h,
            "rate ingested"
        );
        Ok(Some(rate))
    }
}

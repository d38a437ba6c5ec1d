// src/pipeline/mod.rs
//! One scrape → ingest → notify cycle.

pub mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use metrics::{describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;

use crate::error::{NotifyError, PersistenceError};
use crate::ingest::RateIngestor;
use crate::notify::antiflutter::AntiFlutter;
use crate::notify::{FanOutReport, NotificationService};
use crate::scrape::ScraperEngine;
use crate::store::SourceRepository;

pub use scheduler::spawn_scheduler;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub sources: usize,
    pub scraped: usize,
    pub ingested: usize,
    pub notified: FanOutReport,
    pub threshold_alerts: usize,
}

pub struct Pipeline {
    sources: Arc<dyn SourceRepository>,
    scraper: ScraperEngine,
    ingestor: RateIngestor,
    notifier: NotificationService,
    threshold_percent: Option<f64>,
    cooldown: Mutex<AntiFlutter>,
}

impl Pipeline {
    pub fn new(
        sources: Arc<dyn SourceRepository>,
        scraper: ScraperEngine,
        ingestor: RateIngestor,
        notifier: NotificationService,
    ) -> Self {
        Self {
            sources,
            scraper,
            ingestor,
            notifier,
            threshold_percent: None,
            cooldown: Mutex::new(AntiFlutter::new(0)),
        }
    }

    /// Alert when |change %| reaches `percent`, at most once per rate per `cooldown_secs`.
    pub fn with_threshold(mut self, percent: Option<f64>, cooldown_secs: i64) -> Self {
        self.threshold_percent = percent;
        self.cooldown = Mutex::new(AntiFlutter::new(cooldown_secs));
        self
    }

    /// Fails only when the source list cannot be read; everything downstream is best-effort.
    pub async fn run_cycle(&self) -> Result<CycleReport, PersistenceError> {
        ensure_metrics_described();

        let sources = self.sources.active_sources().await?;
        let raw = self.scraper.scrape_all(&sources).await;
        let scraped = raw.len();
        let rates = self.ingestor.ingest(raw).await;

        let notified = match self.notifier.notify_price_change(&rates).await {
            Ok(r) => r,
            Err(NotifyError::Partial { report, last }) => {
                tracing::warn!(failed = report.failed, last = %last, "price-change fan-out incomplete");
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "price-change fan-out skipped");
                FanOutReport::default()
            }
        };

        let mut threshold_alerts = 0;
        if let Some(threshold) = self.threshold_percent {
            let now = Utc::now();
            for rate in rates
                .iter()
                .filter(|r| r.change_percentage_24h.abs() >= threshold)
            {
                let key = rate.key();
                if !self.cooldown.lock().await.should_alert(&key, now) {
                    tracing::debug!(key = %key, "threshold alert suppressed by cooldown");
                    continue;
                }
                if let Err(e) = self.notifier.notify_threshold_alert(rate, threshold).await {
                    tracing::warn!(key = %key, error = %e, "threshold fan-out incomplete");
                }
                self.cooldown.lock().await.record_alert(key, now);
                threshold_alerts += 1;
            }
        }

        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp() as f64);

        let report = CycleReport {
            sources: sources.len(),
            scraped,
            ingested: rates.len(),
            notified,
            threshold_alerts,
        };
        tracing::info!(
            target: "pipeline",
            sources = report.sources,
            scraped = report.scraped,
            ingested = report.ingested,
            delivered = report.notified.delivered,
            threshold_alerts = report.threshold_alerts,
            "cycle done"
        );
        Ok(report)
    }
}

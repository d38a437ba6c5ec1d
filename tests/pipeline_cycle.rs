// tests/pipeline_cycle.rs
//
// Whole cycles over in-memory parts: scrape → ingest → notify, with the
// threshold alert cooldown in play.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fx_rate_alerts::domain::{
    AlertKind, DeliveryTarget, NotificationSubscriber, Platform, RateCategory, ScrapingSource,
};
use fx_rate_alerts::error::{DeliveryError, FetchError};
use fx_rate_alerts::ingest::RateIngestor;
use fx_rate_alerts::notify::{ChannelRegistry, NotificationService, Notifier};
use fx_rate_alerts::pipeline::{spawn_scheduler, Pipeline};
use fx_rate_alerts::scrape::fetcher::PageFetcher;
use fx_rate_alerts::scrape::ScraperEngine;
use fx_rate_alerts::store::MemoryStore;
use tokio::sync::watch;

/// Serves one quote for every source; the test moves the market.
struct Market(Mutex<f64>);

impl Market {
    fn set(&self, v: f64) {
        *self.0.lock().unwrap() = v;
    }
}

#[async_trait]
impl PageFetcher for Market {
    async fn fetch(&self, _source: &ScrapingSource) -> Result<String, FetchError> {
        let v = *self.0.lock().unwrap();
        Ok(format!("<div><b class=\"q\">{v:.2}</b></div>"))
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<String>>);

#[async_trait]
impl Notifier for Inbox {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn deliver(&self, _target: DeliveryTarget<'_>, message: &str) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

fn parallel_source() -> ScrapingSource {
    ScrapingSource {
        id: "p".into(),
        name: "Paralelo".into(),
        url: "https://p.example/".into(),
        selector: ".q".into(),
        currency: "USD".into(),
        frequency: None,
        is_active: true,
        rate_type: RateCategory::Parallel,
        plausible_range: Some([5.0, 30.0]),
    }
}

async fn build(market: Arc<Market>, inbox: Arc<Inbox>) -> (Pipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.set_sources(vec![parallel_source()]).await;
    store
        .set_subscribers(vec![NotificationSubscriber {
            id: "s1".into(),
            user_identifier: "42".into(),
            platform: Platform::Telegram,
            push_subscription_data: None,
            is_active: true,
        }])
        .await;

    let pipeline = Pipeline::new(
        store.clone(),
        ScraperEngine::new(market, "BOB"),
        RateIngestor::new(store.clone()),
        NotificationService::new(store.clone(), store.clone(), ChannelRegistry::new().with(inbox)),
    )
    .with_threshold(Some(2.5), 3600);
    (pipeline, store)
}

#[tokio::test]
async fn threshold_alert_fires_once_per_cooldown() {
    let market = Arc::new(Market(Mutex::new(7.00)));
    let inbox = Arc::new(Inbox::default());
    let (pipeline, store) = build(market.clone(), inbox.clone()).await;

    let first = pipeline.run_cycle().await.unwrap();
    assert_eq!((first.sources, first.scraped, first.ingested), (1, 1, 1));
    assert_eq!(first.notified.delivered, 1);
    assert_eq!(first.threshold_alerts, 0);

    market.set(7.50);
    let second = pipeline.run_cycle().await.unwrap();
    assert_eq!(second.threshold_alerts, 1);

    market.set(8.10);
    let third = pipeline.run_cycle().await.unwrap();
    assert_eq!(third.threshold_alerts, 0, "cooldown should suppress");
    assert_eq!(third.notified.delivered, 1);

    let rows = store.notifications().await;
    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows.iter().filter(|n| n.kind == AlertKind::ThresholdAlert).count(),
        1
    );
    assert_eq!(store.historical_rates().await.len(), 3);
    assert_eq!(store.current_rates().await.len(), 1);

    let msgs = inbox.0.lock().unwrap().clone();
    assert!(msgs.iter().any(|m| m.contains("ALERTA DE UMBRAL")));
    assert!(msgs.iter().any(|m| m.starts_with("📈 Dólar Paralelo subió")));
}

#[tokio::test]
async fn cycle_without_sources_does_nothing() {
    let market = Arc::new(Market(Mutex::new(7.00)));
    let inbox = Arc::new(Inbox::default());
    let (pipeline, store) = build(market, inbox.clone()).await;
    store.set_sources(Vec::new()).await;

    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.scraped, 0);
    assert_eq!(report.notified.attempted, 0);
    assert!(inbox.0.lock().unwrap().is_empty());
}

fn assert_send<T: Send>(_: &T) {}

#[tokio::test]
async fn cycle_future_can_be_spawned() {
    let market = Arc::new(Market(Mutex::new(7.00)));
    let inbox = Arc::new(Inbox::default());
    let (pipeline, _store) = build(market, inbox).await;
    let pipeline = Arc::new(pipeline);

    let fut = pipeline.run_cycle();
    assert_send(&fut);
    drop(fut);

    let report = tokio::spawn(async move { pipeline.run_cycle().await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.ingested, 1);
}

#[tokio::test]
async fn scheduler_runs_immediately_and_stops_on_signal() {
    let market = Arc::new(Market(Mutex::new(7.00)));
    let inbox = Arc::new(Inbox::default());
    let (pipeline, store) = build(market, inbox).await;

    let (tx, rx) = watch::channel(false);
    let handle = spawn_scheduler(Arc::new(pipeline), Duration::from_secs(3600), rx);

    for _ in 0..50 {
        if !store.current_rates().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(store.current_rates().await.len(), 1);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler stops")
        .unwrap();
}

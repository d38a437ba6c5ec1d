// tests/notify_fanout.rs
//
// Fan-out over mock channels: every subscriber with a usable target gets one
// attempt and one log row, failures included.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use fx_rate_alerts::domain::{
    AlertKind, DeliveryTarget, ExchangeRate, NotificationSubscriber, Platform, PushKeys,
    PushSubscription, RateCategory, RawScrapeResult,
};
use fx_rate_alerts::error::{DeliveryError, NotifyError, PersistenceError};
use fx_rate_alerts::notify::{ChannelRegistry, FanOutReport, NotificationService, Notifier};
use fx_rate_alerts::store::{MemoryStore, SubscriberRepository};

/// Records every delivery; fails for addresses listed in `fail_for`.
struct Recorder {
    platform: Platform,
    fail_for: Vec<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl Recorder {
    fn new(platform: Platform, fail_for: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            platform,
            fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for Recorder {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn deliver(&self, target: DeliveryTarget<'_>, message: &str) -> Result<(), DeliveryError> {
        let addr = match target {
            DeliveryTarget::Address(a) => a.to_string(),
            DeliveryTarget::Push(p) => p.endpoint.clone(),
        };
        self.sent
            .lock()
            .unwrap()
            .push((addr.clone(), message.to_string()));
        if self.fail_for.contains(&addr) {
            return Err(DeliveryError::Rejected {
                status: 403,
                body: "blocked by user".into(),
            });
        }
        Ok(())
    }
}

fn telegram(id: &str, chat: &str) -> NotificationSubscriber {
    NotificationSubscriber {
        id: id.into(),
        user_identifier: chat.into(),
        platform: Platform::Telegram,
        push_subscription_data: None,
        is_active: true,
    }
}

fn push(id: &str, endpoint: Option<&str>) -> NotificationSubscriber {
    NotificationSubscriber {
        id: id.into(),
        user_identifier: String::new(),
        platform: Platform::WebPush,
        push_subscription_data: endpoint.map(|e| PushSubscription {
            endpoint: e.into(),
            keys: PushKeys {
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }),
        is_active: true,
    }
}

fn rate(kind: RateCategory, prev_avg: f64, buy: f64, sell: f64) -> ExchangeRate {
    let raw = |b: f64, s: f64| RawScrapeResult {
        category: kind,
        base_currency: "USD".into(),
        target_currency: "BOB".into(),
        buy_price: b,
        sell_price: s,
        source: "test".into(),
        captured_at: Utc::now(),
    };
    let prev = ExchangeRate::derive(&raw(prev_avg, prev_avg), None, Utc::now());
    ExchangeRate::derive(&raw(buy, sell), Some(&prev), Utc::now())
}

#[tokio::test]
async fn every_reachable_subscriber_gets_one_attempt_and_one_row() {
    let store = Arc::new(MemoryStore::new());
    let mut inactive = telegram("s-off", "999");
    inactive.is_active = false;
    store
        .set_subscribers(vec![
            telegram("s1", "111"),
            telegram("s2", "222"),
            push("s3", Some("https://push.example/abc")),
            inactive,
        ])
        .await;

    let tg = Recorder::new(Platform::Telegram, &["222"]);
    let wp = Recorder::new(Platform::WebPush, &[]);
    let channels = ChannelRegistry::new().with(tg.clone()).with(wp.clone());
    let service = NotificationService::new(store.clone(), store.clone(), channels);

    let rates = vec![
        rate(RateCategory::Parallel, 7.0, 7.10, 7.14),
        rate(RateCategory::Official, 6.91, 6.86, 6.96),
    ];
    let err = service.notify_price_change(&rates).await.unwrap_err();
    let NotifyError::Partial { report, last } = err else {
        panic!("expected partial failure");
    };
    assert_eq!(
        report,
        FanOutReport {
            attempted: 6,
            delivered: 4,
            failed: 2,
            skipped: 0,
            logged: 6,
        }
    );
    assert!(last.contains("telegram"), "{last}");

    assert_eq!(tg.sent().len(), 4);
    assert_eq!(wp.sent().len(), 2);
    assert!(tg.sent().iter().all(|(addr, _)| addr != "999"));

    let rows = store.notifications().await;
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|n| n.kind == AlertKind::PriceChange && !n.is_read));
    assert_eq!(rows.iter().filter(|n| n.subscriber_id == "s2").count(), 2);
    assert!(rows.iter().any(|n| n.message.contains("subió")));
}

#[tokio::test]
async fn subscribers_without_target_or_channel_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let mut unknown = telegram("s-x", "333");
    unknown.platform = Platform::Unknown;
    store
        .set_subscribers(vec![
            telegram("s1", "111"),
            telegram("s-blank", "  "),
            push("s-nopush", None),
            push("s-nochannel", Some("https://push.example/x")),
            unknown,
        ])
        .await;

    let tg = Recorder::new(Platform::Telegram, &[]);
    let service = NotificationService::new(
        store.clone(),
        store.clone(),
        ChannelRegistry::new().with(tg.clone()),
    );

    let report = service
        .notify_threshold_alert(&rate(RateCategory::Parallel, 7.0, 7.2, 7.3), 2.5)
        .await
        .unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped, 4);

    let rows = store.notifications().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, AlertKind::ThresholdAlert);
    assert!(rows[0].message.contains("ALERTA DE UMBRAL"));
    assert!(tg.sent()[0].1.contains("2.5%"));
}

/// Counts lookups so the empty-input short circuit is observable.
#[derive(Default)]
struct CountingSubscribers(AtomicUsize);

#[async_trait]
impl SubscriberRepository for CountingSubscribers {
    async fn active_subscribers(&self) -> Result<Vec<NotificationSubscriber>, PersistenceError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::Unavailable("should not be read".into()))
    }
}

#[tokio::test]
async fn empty_rate_list_is_a_no_op() {
    let subs = Arc::new(CountingSubscribers::default());
    let log = Arc::new(MemoryStore::new());
    let service = NotificationService::new(subs.clone(), log.clone(), ChannelRegistry::new());

    let report = service.notify_price_change(&[]).await.unwrap();
    assert_eq!(report, FanOutReport::default());
    assert_eq!(subs.0.load(Ordering::SeqCst), 0);
    assert!(log.notifications().await.is_empty());

    // With rates present the lookup happens and its failure surfaces.
    let err = service
        .notify_price_change(&[rate(RateCategory::Parallel, 7.0, 7.0, 7.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Subscribers(_)));
    assert_eq!(subs.0.load(Ordering::SeqCst), 1);
}

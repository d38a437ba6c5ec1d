// src/notify/fanout.rs
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use super::{format, ChannelRegistry};
use crate::domain::{AlertKind, AlertNotification, ExchangeRate, NotificationSubscriber};
use crate::error::NotifyError;
use crate::store::{NotificationLog, SubscriberRepository};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("notify_attempts_total", "Channel deliveries attempted.");
        describe_counter!(
            "notify_failures_total",
            "Channel deliveries that failed, by platform."
        );
        describe_counter!(
            "notify_skipped_total",
            "Subscribers skipped for missing target or channel."
        );
    });
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
    pub logged: usize,
}

enum Outcome {
    Skipped,
    Attempted {
        delivery: Result<(), String>,
        logged: Result<(), String>,
    },
}

/// Fans one event out to every active subscriber. Each subscriber is isolated:
/// a failed delivery or log write never stops the others.
pub struct NotificationService {
    subscribers: Arc<dyn SubscriberRepository>,
    log: Arc<dyn NotificationLog>,
    channels: ChannelRegistry,
    concurrency: usize,
}

impl NotificationService {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        log: Arc<dyn NotificationLog>,
        channels: ChannelRegistry,
    ) -> Self {
        Self {
            subscribers,
            log,
            channels,
            concurrency: 8,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// One price-change message per rate per subscriber.
    ///
    /// Returns `Err(NotifyError::Partial)` after all attempts if any delivery or
    /// log write failed; the report inside tells how far it got.
    pub async fn notify_price_change(&self, rates: &[ExchangeRate]) -> Result<FanOutReport, NotifyError> {
        if rates.is_empty() {
            return Ok(FanOutReport::default());
        }
        let subscribers = self.load_subscribers().await?;

        let messages: Vec<String> = rates.iter().map(format::price_change_message).collect();
        let jobs: Vec<(&NotificationSubscriber, &str)> = messages
            .iter()
            .flat_map(|m| subscribers.iter().map(move |s| (s, m.as_str())))
            .collect();

        self.dispatch(AlertKind::PriceChange, jobs).await
    }

    pub async fn notify_threshold_alert(
        &self,
        rate: &ExchangeRate,
        threshold_percent: f64,
    ) -> Result<FanOutReport, NotifyError> {
        let subscribers = self.load_subscribers().await?;
        let message = format::threshold_message(rate, threshold_percent);
        let jobs = subscribers.iter().map(|s| (s, message.as_str())).collect();
        self.dispatch(AlertKind::ThresholdAlert, jobs).await
    }

    async fn load_subscribers(&self) -> Result<Vec<NotificationSubscriber>, NotifyError> {
        let subs = self
            .subscribers
            .active_subscribers()
            .await
            .map_err(NotifyError::Subscribers)?;
        if subs.is_empty() {
            tracing::info!("no active subscribers");
        }
        Ok(subs)
    }

    async fn dispatch(
        &self,
        kind: AlertKind,
        jobs: Vec<(&NotificationSubscriber, &str)>,
    ) -> Result<FanOutReport, NotifyError> {
        ensure_metrics_described();

        // Eager, as in the scraper: keeps the fan-out future `Send`.
        let deliveries: Vec<_> = jobs
            .into_iter()
            .map(|(sub, msg)| self.deliver_one(kind, sub, msg))
            .collect();
        let outcomes: Vec<Outcome> = stream::iter(deliveries)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = FanOutReport::default();
        let mut last_error = None;
        for o in outcomes {
            match o {
                Outcome::Skipped => report.skipped += 1,
                Outcome::Attempted { delivery, logged } => {
                    report.attempted += 1;
                    match delivery {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            report.failed += 1;
                            last_error = Some(e);
                        }
                    }
                    match logged {
                        Ok(()) => report.logged += 1,
                        Err(e) => last_error = Some(e),
                    }
                }
            }
        }

        tracing::info!(
            kind = kind.as_str(),
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "fan-out done"
        );

        match last_error {
            None => Ok(report),
            Some(last) => Err(NotifyError::Partial { report, last }),
        }
    }

    async fn deliver_one(&self, kind: AlertKind, sub: &NotificationSubscriber, message: &str) -> Outcome {
        let Some(target) = sub.delivery_target() else {
            tracing::debug!(subscriber = %sub.id, platform = sub.platform.as_str(), "no delivery target");
            counter!("notify_skipped_total").increment(1);
            return Outcome::Skipped;
        };
        let Some(channel) = self.channels.get(sub.platform) else {
            tracing::warn!(subscriber = %sub.id, platform = sub.platform.as_str(), "no channel for platform");
            counter!("notify_skipped_total").increment(1);
            return Outcome::Skipped;
        };

        counter!("notify_attempts_total").increment(1);
        let delivery = channel.deliver(target, message).await.map_err(|e| {
            tracing::warn!(
                subscriber = %sub.id,
                platform = sub.platform.as_str(),
                error = %e,
                "delivery failed"
            );
            counter!("notify_failures_total", "platform" => sub.platform.as_str()).increment(1);
            format!("{}: {e}", sub.platform.as_str())
        });

        let logged = self
            .log
            .append_notification(AlertNotification::new(&sub.id, kind, message.to_string()))
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::warn!(subscriber = %sub.id, error = %e, "notification not recorded");
                format!("log: {e}")
            });

        Outcome::Attempted { delivery, logged }
    }
}

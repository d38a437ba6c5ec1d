// src/store/memory.rs
use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    should_replace, NotificationLog, RateRepository, SourceRepository, SubscriberRepository,
};
use crate::domain::{
    AlertNotification, ExchangeRate, HistoricalRate, NotificationSubscriber, RateKey,
    ScrapingSource,
};
use crate::error::PersistenceError;

/// In-process store backing every repository contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RwLock<BTreeMap<RateKey, ExchangeRate>>,
    history: RwLock<Vec<HistoricalRate>>,
    sources: RwLock<Vec<ScrapingSource>>,
    subscribers: RwLock<Vec<NotificationSubscriber>>,
    notifications: RwLock<Vec<AlertNotification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_sources(&self, sources: Vec<ScrapingSource>) {
        *self.sources.write().await = sources;
    }

    pub async fn set_subscribers(&self, subs: Vec<NotificationSubscriber>) {
        *self.subscribers.write().await = subs;
    }

    pub async fn current_rates(&self) -> Vec<ExchangeRate> {
        self.current.read().await.values().cloned().collect()
    }

    pub async fn historical_rates(&self) -> Vec<HistoricalRate> {
        self.history.read().await.clone()
    }

    pub async fn notifications(&self) -> Vec<AlertNotification> {
        self.notifications.read().await.clone()
    }

    /// Put back `rate` (or nothing) as the current record for `key`.
    pub(crate) async fn reset_current(&self, key: RateKey, rate: Option<ExchangeRate>) {
        let mut map = self.current.write().await;
        match rate {
            Some(r) => map.insert(key, r),
            None => map.remove(&key),
        };
    }

    pub(crate) async fn restore(
        &self,
        current: Vec<ExchangeRate>,
        history: Vec<HistoricalRate>,
        notifications: Vec<AlertNotification>,
    ) {
        *self.current.write().await = current.into_iter().map(|r| (r.key(), r)).collect();
        *self.history.write().await = history;
        *self.notifications.write().await = notifications;
    }
}

#[async_trait]
impl RateRepository for MemoryStore {
    async fn current_rate(&self, key: &RateKey) -> Result<Option<ExchangeRate>, PersistenceError> {
        Ok(self.current.read().await.get(key).cloned())
    }

    async fn upsert_current_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate, PersistenceError> {
        let mut map = self.current.write().await;
        let key = rate.key();
        match map.get(&key) {
            Some(stored) if !should_replace(stored, &rate) => {
                tracing::debug!(key = %key, "stale current-rate write ignored");
                Ok(stored.clone())
            }
            _ => {
                map.insert(key, rate.clone());
                Ok(rate)
            }
        }
    }

    async fn append_historical_rate(
        &self,
        rate: HistoricalRate,
    ) -> Result<HistoricalRate, PersistenceError> {
        self.history.write().await.push(rate.clone());
        Ok(rate)
    }
}

#[async_trait]
impl SourceRepository for MemoryStore {
    async fn active_sources(&self) -> Result<Vec<ScrapingSource>, PersistenceError> {
        Ok(self
            .sources
            .read()
            .await
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SubscriberRepository for MemoryStore {
    async fn active_subscribers(&self) -> Result<Vec<NotificationSubscriber>, PersistenceError> {
        Ok(self
            .subscribers
            .read()
            .await
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn append_notification(
        &self,
        n: AlertNotification,
    ) -> Result<AlertNotification, PersistenceError> {
        self.notifications.write().await.push(n.clone());
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RateCategory, RawScrapeResult};
    use chrono::{Duration, Utc};

    fn rate_at(avg: f64, offset_secs: i64) -> ExchangeRate {
        let raw = RawScrapeResult {
            category: RateCategory::Official,
            base_currency: "USD".into(),
            target_currency: "BOB".into(),
            buy_price: avg,
            sell_price: avg,
            source: "BCB".into(),
            captured_at: Utc::now() + Duration::seconds(offset_secs),
        };
        ExchangeRate::derive(&raw, None, Utc::now())
    }

    #[tokio::test]
    async fn older_observation_does_not_clobber_newer() {
        let store = MemoryStore::new();
        let newer = rate_at(6.96, 10);
        let older = rate_at(6.86, 0);

        store.upsert_current_rate(newer.clone()).await.unwrap();
        let kept = store.upsert_current_rate(older).await.unwrap();

        assert_eq!(kept.id, newer.id);
        let cur = store.current_rate(&newer.key()).await.unwrap().unwrap();
        assert_eq!(cur.average_price, 6.96);
    }

    #[tokio::test]
    async fn inactive_rows_are_filtered() {
        let store = MemoryStore::new();
        store
            .set_subscribers(vec![NotificationSubscriber {
                id: "a".into(),
                user_identifier: "1".into(),
                platform: crate::domain::Platform::Telegram,
                push_subscription_data: None,
                is_active: false,
            }])
            .await;
        assert!(store.active_subscribers().await.unwrap().is_empty());
    }
}

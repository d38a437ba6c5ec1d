// src/store/mod.rs
//! Repository contracts the pipeline reads and writes through.

pub mod json_file;
pub mod memory;

use async_trait::async_trait;

use crate::domain::{
    AlertNotification, ExchangeRate, HistoricalRate, NotificationSubscriber, RateKey,
    ScrapingSource,
};
use crate::error::PersistenceError;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn current_rate(&self, key: &RateKey) -> Result<Option<ExchangeRate>, PersistenceError>;

    /// Replace the current record for the rate's key unless the stored one was
    /// observed later; returns whichever record is current afterwards.
    async fn upsert_current_rate(&self, rate: ExchangeRate) -> Result<ExchangeRate, PersistenceError>;

    async fn append_historical_rate(
        &self,
        rate: HistoricalRate,
    ) -> Result<HistoricalRate, PersistenceError>;
}

#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn active_sources(&self) -> Result<Vec<ScrapingSource>, PersistenceError>;
}

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn active_subscribers(&self) -> Result<Vec<NotificationSubscriber>, PersistenceError>;
}

#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn append_notification(
        &self,
        n: AlertNotification,
    ) -> Result<AlertNotification, PersistenceError>;
}

/// Last-writer-wins on observation time. Ties go to the incoming write.
pub(crate) fn should_replace(stored: &ExchangeRate, incoming: &ExchangeRate) -> bool {
    incoming.observed_at >= stored.observed_at
}

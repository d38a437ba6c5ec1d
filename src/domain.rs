// src/domain.rs
//! Rate, source and subscriber records shared by the scrape → ingest → notify pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Market the quote belongs to. The same currency pair is tracked once per category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    Official,
    Parallel,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Official => "official",
            RateCategory::Parallel => "parallel",
        }
    }

    /// Label used in subscriber-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            RateCategory::Official => "Oficial",
            RateCategory::Parallel => "Paralelo",
        }
    }
}

/// Inclusive sanity bounds for a single-number quote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlausibleBand {
    pub min: f64,
    pub max: f64,
}

impl PlausibleBand {
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapingSource {
    pub id: String,
    pub name: String,
    pub url: String,
    /// CSS selector locating the rate text in the page.
    pub selector: String,
    /// Base currency of the quote, e.g. "USD".
    pub currency: String,
    /// Cron-like cadence. Advisory only; the scheduler uses its own interval.
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub rate_type: RateCategory,
    /// Per-source override of the parser's single-number band, `[min, max]`.
    #[serde(default)]
    pub plausible_range: Option<[f64; 2]>,
}

fn default_true() -> bool {
    true
}

impl ScrapingSource {
    pub fn plausible_band(&self) -> Option<PlausibleBand> {
        self.plausible_range.map(|[lo, hi]| PlausibleBand::new(lo, hi))
    }
}

/// One successful scrape, before normalization. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawScrapeResult {
    pub category: RateCategory,
    pub base_currency: String,
    pub target_currency: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub source: String,
    pub captured_at: DateTime<Utc>,
}

/// Identity of a "current" record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RateKey {
    pub category: RateCategory,
    pub base_currency: String,
    pub target_currency: String,
}

impl std::fmt::Display for RateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.category.as_str(),
            self.base_currency,
            self.target_currency
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExchangeRate {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub category: RateCategory,
    pub base_currency: String,
    pub target_currency: String,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Always `(buy + sell) / 2`; set only by [`ExchangeRate::derive`].
    pub average_price: f64,
    /// Always `sell - buy`; set only by [`ExchangeRate::derive`].
    pub spread_amount: f64,
    pub change_24h: f64,
    pub change_percentage_24h: f64,
    /// When the quote was captured from the source page.
    pub observed_at: DateTime<Utc>,
    /// When this record was written.
    pub last_updated: DateTime<Utc>,
    pub source: Option<String>,
}

impl ExchangeRate {
    /// Build the canonical record for `raw`, computing average, spread and the
    /// change versus `previous` (the current record for the same key, if any).
    pub fn derive(raw: &RawScrapeResult, previous: Option<&ExchangeRate>, now: DateTime<Utc>) -> Self {
        let average_price = (raw.buy_price + raw.sell_price) / 2.0;
        let spread_amount = raw.sell_price - raw.buy_price;

        let (change_24h, change_percentage_24h) = match previous {
            Some(prev) => {
                let delta = average_price - prev.average_price;
                let pct = if prev.average_price != 0.0 {
                    delta / prev.average_price * 100.0
                } else {
                    0.0
                };
                (delta, pct)
            }
            None => (0.0, 0.0),
        };

        Self {
            id: Uuid::new_v4(),
            category: raw.category,
            base_currency: raw.base_currency.clone(),
            target_currency: raw.target_currency.clone(),
            buy_price: raw.buy_price,
            sell_price: raw.sell_price,
            average_price,
            spread_amount,
            change_24h,
            change_percentage_24h,
            observed_at: raw.captured_at,
            last_updated: now,
            source: Some(raw.source.clone()),
        }
    }

    pub fn key(&self) -> RateKey {
        RateKey {
            category: self.category,
            base_currency: self.base_currency.clone(),
            target_currency: self.target_currency.clone(),
        }
    }
}

/// Append-only snapshot of an observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalRate {
    pub id: Uuid,
    pub rate_type: RateCategory,
    pub base_currency: String,
    pub target_currency: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub average_price: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<&ExchangeRate> for HistoricalRate {
    fn from(r: &ExchangeRate) -> Self {
        Self {
            id: Uuid::new_v4(),
            rate_type: r.category,
            base_currency: r.base_currency.clone(),
            target_currency: r.target_currency.clone(),
            buy_price: r.buy_price,
            sell_price: r.sell_price,
            average_price: r.average_price,
            recorded_at: r.observed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Telegram,
    WebPush,
    /// Anything the registration flow stored that this build has no channel for.
    #[serde(other)]
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::WebPush => "web_push",
            Platform::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Browser push subscription as produced by `PushManager.subscribe()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSubscriber {
    pub id: String,
    /// Channel address, e.g. a Telegram chat id.
    pub user_identifier: String,
    pub platform: Platform,
    #[serde(default)]
    pub push_subscription_data: Option<PushSubscription>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Where a message goes, resolved from a subscriber by platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget<'a> {
    Address(&'a str),
    Push(&'a PushSubscription),
}

impl NotificationSubscriber {
    /// `None` when the subscriber lacks what its platform needs.
    pub fn delivery_target(&self) -> Option<DeliveryTarget<'_>> {
        match self.platform {
            Platform::Telegram => {
                let addr = self.user_identifier.trim();
                (!addr.is_empty()).then_some(DeliveryTarget::Address(addr))
            }
            Platform::WebPush => self
                .push_subscription_data
                .as_ref()
                .map(DeliveryTarget::Push),
            Platform::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceChange,
    ThresholdAlert,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceChange => "price_change",
            AlertKind::ThresholdAlert => "threshold_alert",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertNotification {
    pub id: Uuid,
    pub subscriber_id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl AlertNotification {
    pub fn new(subscriber_id: &str, kind: AlertKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_id: subscriber_id.to_string(),
            kind,
            message,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

// src/notify/mod.rs
pub mod antiflutter;
pub mod bot;
pub mod fanout;
pub mod format;
pub mod telegram;
pub mod web_push;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DeliveryTarget, Platform};
use crate::error::DeliveryError;

pub use fanout::{FanOutReport, NotificationService};

/// A delivery channel. Implementations only see the resolved target and the text.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn platform(&self) -> Platform;

    async fn deliver(&self, target: DeliveryTarget<'_>, message: &str) -> Result<(), DeliveryError>;
}

/// Dispatch table from subscriber platform to channel.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: HashMap<Platform, Arc<dyn Notifier>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.register(channel);
        self
    }

    pub fn register(&mut self, channel: Arc<dyn Notifier>) {
        self.channels.insert(channel.platform(), channel);
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn Notifier>> {
        self.channels.get(&platform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.channels.keys().copied().collect()
    }
}

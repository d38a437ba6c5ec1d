// src/notify/telegram.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Notifier;
use crate::domain::{DeliveryTarget, Platform};
use crate::error::DeliveryError;

/// Minimal Telegram Bot API client: `sendMessage` and `getUpdates`.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base: String,
    token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreview,
}

#[derive(Serialize)]
struct LinkPreview {
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramApi {
    /// `base` is normally `https://api.telegram.org`.
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base, self.token, method)
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            link_preview_options: LinkPreview { is_disabled: true },
        };
        let rsp = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> anyhow::Result<Vec<Update>> {
        let rsp: ApiResponse<Vec<Update>> = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset), ("timeout", poll_secs as i64)])
            .timeout(Duration::from_secs(poll_secs + 10))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("getUpdates request: {}", e.without_url()))?
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("getUpdates body: {}", e.without_url()))?;

        if !rsp.ok {
            anyhow::bail!(
                "getUpdates not ok: {}",
                rsp.description.unwrap_or_default()
            );
        }
        Ok(rsp.result.unwrap_or_default())
    }
}

#[derive(Clone)]
pub struct TelegramNotifier {
    api: TelegramApi,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(api: TelegramApi) -> Self {
        Self {
            api,
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

/// Client errors other than rate limiting will not get better on retry.
fn is_retryable(e: &DeliveryError) -> bool {
    match e {
        DeliveryError::Transport(_) => true,
        DeliveryError::Rejected { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn deliver(&self, target: DeliveryTarget<'_>, message: &str) -> Result<(), DeliveryError> {
        let DeliveryTarget::Address(chat_id) = target else {
            return Err(DeliveryError::MissingTarget("telegram"));
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.api.send_message(chat_id, message, self.timeout).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    tracing::debug!(attempt, error = %e, "telegram send retry");
                    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

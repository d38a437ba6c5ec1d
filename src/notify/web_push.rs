// src/notify/web_push.rs
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use super::Notifier;
use crate::domain::{DeliveryTarget, Platform};
use crate::error::DeliveryError;

const DEFAULT_TTL_SECS: u32 = 24 * 60 * 60;

#[derive(Serialize)]
struct PushAction {
    action: &'static str,
    title: &'static str,
}

/// JSON body the service worker renders.
#[derive(Serialize)]
struct PushPayload<'a> {
    title: &'static str,
    body: &'a str,
    icon: &'static str,
    badge: &'static str,
    tag: &'static str,
    #[serde(rename = "requireInteraction")]
    require_interaction: bool,
    actions: [PushAction; 2],
}

impl<'a> PushPayload<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            title: "DollarAlert 🇧🇴",
            body,
            icon: "/icon-192x192.png",
            badge: "/badge-72x72.png",
            tag: "dollar-alert",
            require_interaction: true,
            actions: [
                PushAction {
                    action: "view",
                    title: "Ver tasas",
                },
                PushAction {
                    action: "dismiss",
                    title: "Cerrar",
                },
            ],
        }
    }
}

pub struct WebPushNotifier {
    client: IsahcWebPushClient,
    vapid_pem: Vec<u8>,
    subject: String,
    ttl: u32,
}

impl WebPushNotifier {
    /// `vapid_pem` is the VAPID private key in PEM form; `subject` a `mailto:` or https URL.
    pub fn new(vapid_pem: Vec<u8>, subject: impl Into<String>) -> anyhow::Result<Self> {
        let client = IsahcWebPushClient::new().context("building web push client")?;
        Ok(Self {
            client,
            vapid_pem,
            subject: subject.into(),
            ttl: DEFAULT_TTL_SECS,
        })
    }

    pub fn from_pem_file(path: &Path, subject: impl Into<String>) -> anyhow::Result<Self> {
        let pem = std::fs::read(path)
            .with_context(|| format!("reading VAPID key {}", path.display()))?;
        Self::new(pem, subject)
    }

    pub fn with_ttl(mut self, secs: u32) -> Self {
        self.ttl = secs;
        self
    }
}

fn map_push_error(e: WebPushError) -> DeliveryError {
    DeliveryError::Transport(e.to_string())
}

#[async_trait]
impl Notifier for WebPushNotifier {
    fn platform(&self) -> Platform {
        Platform::WebPush
    }

    async fn deliver(&self, target: DeliveryTarget<'_>, message: &str) -> Result<(), DeliveryError> {
        let DeliveryTarget::Push(sub) = target else {
            return Err(DeliveryError::MissingTarget("web_push"));
        };

        let info = SubscriptionInfo::new(
            sub.endpoint.as_str(),
            sub.keys.p256dh.as_str(),
            sub.keys.auth.as_str(),
        );
        let payload = serde_json::to_vec(&PushPayload::new(message))
            .map_err(|e| DeliveryError::Encoding(e.to_string()))?;

        let push = {
            let mut sig = VapidSignatureBuilder::from_pem(self.vapid_pem.as_slice(), &info)
                .map_err(|e| DeliveryError::Encoding(e.to_string()))?;
            sig.add_claim("sub", self.subject.as_str());
            let signature = sig
                .build()
                .map_err(|e| DeliveryError::Encoding(e.to_string()))?;

            let mut builder = WebPushMessageBuilder::new(&info);
            builder.set_payload(ContentEncoding::Aes128Gcm, &payload);
            builder.set_ttl(self.ttl);
            builder.set_vapid_signature(signature);
            builder
                .build()
                .map_err(|e| DeliveryError::Encoding(e.to_string()))?
        };

        self.client.send(push).await.map_err(map_push_error)
    }
}

// src/scrape/fetcher.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::domain::ScrapingSource;
use crate::error::FetchError;

pub const MIN_TIMEOUT_SECS: u64 = 10;
pub const MAX_TIMEOUT_SECS: u64 = 20;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Retrieves raw markup for one source. One attempt, no retries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, source: &ScrapingSource) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// `timeout_secs` is clamped to 10..=20.
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let timeout_secs = timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        Self::build(Duration::from_secs(timeout_secs))
    }

    fn build(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(browser_headers())
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

fn browser_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    h.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    h.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("es-BO,es;q=0.8,en-US;q=0.5,en;q=0.3"),
    );
    h.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    h
}

fn classify_status(status: StatusCode) -> FetchError {
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::UNAUTHORIZED => {
            FetchError::Blocked(status.as_u16())
        }
        other => FetchError::Status(other.as_u16()),
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, source: &ScrapingSource) -> Result<String, FetchError> {
        let url = reqwest::Url::parse(&source.url)
            .map_err(|_| FetchError::InvalidUrl(source.url.clone()))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout_secs))
    }
}

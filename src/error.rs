// src/error.rs
//! Failure taxonomy for each pipeline stage. Per-item errors are logged and skipped
//! by the stage that owns the loop; only batch-level failures reach callers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid source url {0}")]
    InvalidUrl(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("blocked by remote (HTTP {0})")]
    Blocked(u16),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("reading body: {0}")]
    Body(String),
    #[error("http client: {0}")]
    Client(String),
}

impl FetchError {
    pub fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout_secs)
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else {
            FetchError::Client(e.to_string())
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ExtractError {
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },
    #[error("locator {0:?} matched nothing")]
    NoMatch(String),
    #[error("locator {0:?} matched an element without text")]
    EmptyText(String),
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("no numeric content in {0:?}")]
    NoNumbers(String),
    #[error("token {0:?} is not a number")]
    NotNumeric(String),
    #[error("parsed value is not finite")]
    NotFinite,
    #[error("non-positive price {0}")]
    NonPositive(f64),
    #[error("single value {0} and no plausibility band to check it against")]
    Unbounded(f64),
    #[error("single value {value} outside plausible band [{min}, {max}]")]
    OutOfBand { value: f64, min: f64, max: f64 },
    #[error("sell {sell} below buy {buy}")]
    Inverted { buy: f64, sell: f64 },
}

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

impl ScrapeError {
    /// Short stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            ScrapeError::Fetch(_) => "fetch",
            ScrapeError::Extract(_) => "extract",
            ScrapeError::Parse(_) => "parse",
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding {path}: {source}")]
    Encoding {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("subscriber target does not fit the {0} channel")]
    MissingTarget(&'static str),
    #[error("transport: {0}")]
    Transport(String),
    #[error("rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("payload: {0}")]
    Encoding(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    /// The subscriber list could not be loaded; nothing was attempted.
    #[error("loading subscribers: {0}")]
    Subscribers(#[source] PersistenceError),
    /// Every subscriber was tried, but some deliveries or log writes failed.
    #[error("{} of {} deliveries failed; last: {last}", .report.failed, .report.attempted)]
    Partial {
        report: crate::notify::FanOutReport,
        last: String,
    },
}

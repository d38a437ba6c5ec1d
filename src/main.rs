//! FX Rate Alerts service entrypoint.
//! Wires the store, scraper, notifiers and scheduler, then serves `/health` and `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::watch;

use fx_rate_alerts::config::sources::{load_sources_default, load_subscribers_default};
use fx_rate_alerts::config::AppConfig;
use fx_rate_alerts::ingest::RateIngestor;
use fx_rate_alerts::metrics::Metrics;
use fx_rate_alerts::notify::bot::TelegramBot;
use fx_rate_alerts::notify::telegram::{TelegramApi, TelegramNotifier};
use fx_rate_alerts::notify::web_push::WebPushNotifier;
use fx_rate_alerts::notify::{ChannelRegistry, NotificationService};
use fx_rate_alerts::pipeline::{spawn_scheduler, Pipeline};
use fx_rate_alerts::scrape::fetcher::HttpFetcher;
use fx_rate_alerts::scrape::parser::RateParser;
use fx_rate_alerts::scrape::ScraperEngine;
use fx_rate_alerts::store::JsonFileStore;

struct FxService {
    router: axum::Router,
    pipeline: Arc<Pipeline>,
    interval: Duration,
    bot: Option<TelegramBot>,
}

#[async_trait]
impl shuttle_runtime::Service for FxService {
    async fn bind(self, addr: SocketAddr) -> Result<(), shuttle_runtime::Error> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let scheduler = spawn_scheduler(self.pipeline, self.interval, stop_rx);
        let bot = self.bot.map(TelegramBot::start);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "http listening");
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;

        let _ = stop_tx.send(true);
        if let Some(bot) = bot {
            bot.shutdown().await;
        }
        if let Err(e) = scheduler.await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
        served.context("http server")?;
        Ok(())
    }
}

#[shuttle_runtime::main]
async fn main() -> Result<FxService, shuttle_runtime::Error> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    fx_rate_alerts::init_tracing();

    let cfg = AppConfig::from_env();

    let store = Arc::new(JsonFileStore::open(&cfg.state_dir).await.context("opening state dir")?);
    let sources = load_sources_default()?;
    let subscribers = load_subscribers_default()?;
    tracing::info!(sources = sources.len(), subscribers = subscribers.len(), "configuration loaded");
    store.memory().set_sources(sources).await;
    store.memory().set_subscribers(subscribers).await;

    let fetcher = Arc::new(HttpFetcher::new(cfg.fetch_timeout_secs).context("building http client")?);
    let scraper = ScraperEngine::new(fetcher, cfg.target_currency.clone())
        .with_parser(RateParser::new().with_band(cfg.parser_band))
        .with_concurrency(cfg.scrape_concurrency);
    let ingestor = RateIngestor::new(store.clone());

    let mut channels = ChannelRegistry::new();
    let mut bot = None;
    if let Some(token) = cfg.telegram_token.as_deref() {
        let api = TelegramApi::new(cfg.telegram_api_base.clone(), token);
        channels.register(Arc::new(TelegramNotifier::new(api.clone())));
        if cfg.enable_telegram_bot {
            bot = Some(TelegramBot::new(api));
        }
    } else {
        tracing::info!("TELEGRAM_TOKEN not set; telegram channel disabled");
    }
    if let Some(path) = cfg.vapid_private_key_path.as_deref() {
        match WebPushNotifier::from_pem_file(path, cfg.vapid_subject.clone()) {
            Ok(n) => channels.register(Arc::new(n)),
            Err(e) => tracing::warn!(error = %e, "web push channel disabled"),
        }
    }
    tracing::info!(channels = ?channels.platforms(), "notification channels ready");

    let notifier = NotificationService::new(store.clone(), store.clone(), channels)
        .with_concurrency(cfg.notify_concurrency);
    let pipeline = Pipeline::new(store.clone(), scraper, ingestor, notifier)
        .with_threshold(cfg.threshold_percent, cfg.alert_cooldown_secs);

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = %e, "metrics exporter unavailable");
            None
        }
    };
    let router = fx_rate_alerts::create_router(metrics.as_ref());

    Ok(FxService {
        router,
        pipeline: Arc::new(pipeline),
        interval: Duration::from_secs(cfg.scrape_interval_secs.max(1)),
        bot,
    })
}

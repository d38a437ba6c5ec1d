// tests/http_fetcher.rs
//
// HttpFetcher against a throwaway local axum server.

use axum::{http::StatusCode, routing::get, Router};
use fx_rate_alerts::domain::{RateCategory, ScrapingSource};
use fx_rate_alerts::error::FetchError;
use fx_rate_alerts::scrape::fetcher::{HttpFetcher, PageFetcher};

async fn spawn_site() -> String {
    let app = Router::new()
        .route(
            "/ok",
            get(|| async { "<html><body><b class=\"usd\">6.96 - 6.98</b></body></html>" }),
        )
        .route("/blocked", get(|| async { StatusCode::FORBIDDEN }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn source_at(url: String) -> ScrapingSource {
    ScrapingSource {
        id: "local".into(),
        name: "Local".into(),
        url,
        selector: ".usd".into(),
        currency: "USD".into(),
        frequency: None,
        is_active: true,
        rate_type: RateCategory::Parallel,
        plausible_range: None,
    }
}

#[tokio::test]
async fn fetches_body_and_classifies_statuses() {
    let base = spawn_site().await;
    let fetcher = HttpFetcher::new(10).unwrap();

    let html = fetcher.fetch(&source_at(format!("{base}/ok"))).await.unwrap();
    assert!(html.contains("6.96 - 6.98"));

    let blocked = fetcher.fetch(&source_at(format!("{base}/blocked"))).await;
    assert!(matches!(blocked, Err(FetchError::Blocked(403))), "{blocked:?}");

    let broken = fetcher.fetch(&source_at(format!("{base}/broken"))).await;
    assert!(matches!(broken, Err(FetchError::Status(500))), "{broken:?}");
}

#[tokio::test]
async fn refused_connection_and_bad_url_are_fetch_errors() {
    // Grab a free port, then close it.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let fetcher = HttpFetcher::new(10).unwrap();

    let refused = fetcher
        .fetch(&source_at(format!("http://127.0.0.1:{port}/")))
        .await;
    assert!(matches!(refused, Err(FetchError::Connect(_))), "{refused:?}");

    let bad = fetcher.fetch(&source_at("not a url".into())).await;
    assert!(matches!(bad, Err(FetchError::InvalidUrl(_))), "{bad:?}");
}

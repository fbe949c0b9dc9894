use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ScrapeSettings;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    /// Timeouts, connection errors, 429 and 5xx are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Client(_) => false,
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

/// One year's page, or why it could not be fetched.
#[derive(Debug)]
pub struct FetchedPage {
    pub year: i32,
    pub url: String,
    pub body: Result<String, FetchError>,
}

/// Fetch one page per year, one request at a time with `delay_ms` between
/// requests. A failing year is retried with backoff and then reported in
/// its `FetchedPage`; it never aborts the run.
pub async fn fetch_years(years: &[i32], settings: &ScrapeSettings) -> Result<Vec<FetchedPage>, FetchError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(FetchError::Client)?;

    let pb = crate::progress_bar(years.len() as u64);
    let mut pages = Vec::with_capacity(years.len());
    let mut ok = 0usize;

    for (i, &year) in years.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(settings.delay_ms)).await;
        }

        let url = settings.url_for(year);
        let start = Instant::now();
        let body = fetch_with_retry(&client, &url, settings).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match &body {
            Ok(html) => {
                ok += 1;
                info!(year, bytes = html.len(), latency_ms, "fetched");
            }
            Err(e) => warn!(year, error = %e, "fetch failed"),
        }

        pages.push(FetchedPage { year, url, body });
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(total = years.len(), ok, errors = years.len() - ok, "fetch finished");
    Ok(pages)
}

async fn fetch_with_retry(client: &Client, url: &str, settings: &ScrapeSettings) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_one(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt < settings.retries => {
                let backoff = Duration::from_millis(settings.backoff_ms * 2u64.pow(attempt));
                warn!(
                    url,
                    attempt = attempt + 1,
                    retries = settings.retries,
                    error = %e,
                    "backing off {:.1}s",
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_one(client: &Client, url: &str) -> Result<String, FetchError> {
    let request_error = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };
    let response = client.get(url).send().await.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    response.text().await.map_err(request_error)
}

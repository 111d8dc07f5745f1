use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Credentials;
use crate::error::{PipelineDashError, Result};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(10);
const MAX_CONCURRENT_REQUESTS: usize = 64;

pub struct JenkinsClient {
    client: Client,
    credentials: Option<Credentials>,
    semaphore: Arc<Semaphore>,
}

impl JenkinsClient {
    pub fn new(credentials: Option<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipeline-dash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineDashError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    pub fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(credentials) = &self.credentials {
            request.basic_auth(&credentials.user, Some(&credentials.token))
        } else {
            request
        }
    }

    /// GET `{url}/api/json?tree={tree}`, retrying network errors, rate limits
    /// and server errors with exponential backoff.
    ///
    /// A body that is not the expected JSON is logged and yields `Ok(None)`.
    pub(super) async fn api_json<T>(&self, url: &str, tree: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let api_url = api_url(url, tree)?;

        let _permit = self.semaphore.acquire().await.map_err(|_| PipelineDashError::Api {
            status: 0,
            message: "Request limiter closed".to_string(),
        })?;

        let started = Instant::now();
        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(api_url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    let Some(delay) = next_delay(started, retry_count) else {
                        return Err(e.into());
                    };
                    warn!(
                        "Network error ({e}), retrying {api_url} in {}ms ({})...",
                        delay.as_millis(),
                        retry_count + 1
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                let Some(delay) = next_delay(started, retry_count) else {
                    return Err(PipelineDashError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: retry_count,
                    });
                };

                warn!(
                    "Jenkins API error (status {status}) for {api_url}. Waiting {}ms before retry {}...",
                    delay.as_millis(),
                    retry_count + 1
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(PipelineDashError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            let body = response.text().await?;
            return match serde_json::from_str(&body) {
                Ok(value) => {
                    debug!("Fetched {api_url}");
                    Ok(Some(value))
                }
                Err(e) => {
                    warn!("Unexpected response from {api_url}: {e}");
                    Ok(None)
                }
            };
        }
    }
}

fn api_url(url: &str, tree: &str) -> Result<Url> {
    let mut api_url = Url::parse(&format!("{}/api/json", url.trim_end_matches('/')))
        .map_err(|e| PipelineDashError::Config(format!("Invalid Jenkins URL '{url}': {e}")))?;
    api_url.query_pairs_mut().append_pair("tree", tree);
    Ok(api_url)
}

/// Delay before retry number `retry_count + 1`, or `None` once the retry
/// budget is spent.
fn next_delay(started: Instant, retry_count: u32) -> Option<Duration> {
    let delay = INITIAL_RETRY_DELAY
        .saturating_mul(2u32.saturating_pow(retry_count))
        .min(MAX_RETRY_DELAY);
    (started.elapsed() + delay < MAX_RETRY_ELAPSED).then_some(delay)
}

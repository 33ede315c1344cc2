use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::config::RegistryConfig;
use super::error::{FilingKitError, Result};
use super::rate_limit::SlidingWindowLimiter;

/// Longest single wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// HTTP client for the filing registry with shared rate limiting and retry logic.
///
/// Every request, whether for a submission index, a primary document or an
/// embedded asset, first claims a slot from one [`SlidingWindowLimiter`]. Clones
/// of a `Registry` share that limiter, so the aggregate request rate stays under
/// the registry's ceiling no matter how many downloads run concurrently.
///
/// # Retry Behavior
///
/// - **429 and 5xx responses**: retried up to `max_retries` times with exponential
///   backoff (1s, 2s, 4s by default, ±10% jitter), honoring `Retry-After` up to
///   the last backoff step
/// - **Network errors**: retried under the same budget
/// - **Other 4xx responses**: returned immediately
///
/// Once the budget is spent the failure surfaces as
/// [`FilingKitError::RegistryUnavailable`].
///
/// # Examples
///
/// ```rust
/// # use filingkit::Registry;
/// let registry = Registry::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), filingkit::FilingKitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    /// HTTP client carrying the client-identification header
    pub(crate) client: reqwest::Client,

    /// Process-wide request window
    pub(crate) rate_limiter: Arc<SlidingWindowLimiter>,

    /// Base URL for filing archives
    pub(crate) archives_url: String,

    /// Base URL for the data API
    pub(crate) data_url: String,

    pub(crate) max_retries: u32,
    pub(crate) initial_backoff: Duration,
}

impl Registry {
    /// Creates a client with the default configuration and the given user agent.
    ///
    /// The registry requires every automated client to identify itself with an
    /// application name and a contact address, e.g. `"AppName contact@example.com"`.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_config(&RegistryConfig::new(user_agent))
    }

    /// Creates a client from a full [`RegistryConfig`].
    ///
    /// # Errors
    ///
    /// Returns `FilingKitError::ConfigError` if the user agent is empty or not a
    /// valid header value, the rate limit is zero, or the HTTP client cannot be built.
    pub fn with_config(config: &RegistryConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(FilingKitError::ConfigError(
                "A client-identification user agent is required".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| FilingKitError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                FilingKitError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        let rate_limiter = Arc::new(SlidingWindowLimiter::new(
            config.rate_limit,
            config.rate_window,
        )?);

        Ok(Registry {
            client,
            rate_limiter,
            archives_url: config.base_urls.archives.trim_end_matches('/').to_string(),
            data_url: config.base_urls.data.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
        })
    }

    /// Exponential backoff with ±10% jitter: `initial × 2^retry`, capped at
    /// [`MAX_BACKOFF`].
    fn calculate_backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.checked_pow(retry).unwrap_or(u32::MAX);
        let backoff_ms = self
            .initial_backoff
            .saturating_mul(factor)
            .min(MAX_BACKOFF)
            .as_millis() as i64;
        let jitter = (backoff_ms as f64 * 0.2 * (fastrand::f64() - 0.5)) as i64;
        Duration::from_millis((backoff_ms + jitter).max(0) as u64).min(MAX_BACKOFF)
    }

    /// Wait before the next attempt. A `Retry-After` in seconds is honored up to
    /// the last step of the backoff schedule.
    fn retry_delay(&self, retry_after: Option<&HeaderValue>, retry: u32) -> Duration {
        let requested = retry_after
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        match requested {
            Some(wait) => wait.min(self.calculate_backoff(self.max_retries)),
            None => self.calculate_backoff(retry),
        }
    }

    fn is_transient(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Fetches a URL as raw bytes, rate limited and retried.
    ///
    /// # Errors
    ///
    /// * `FilingKitError::RegistryUnavailable` - non-success status (immediately for
    ///   non-transient 4xx, after the retry budget for 429/5xx and network failures)
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut retries = 0;

        loop {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.bytes().await.map(|b| b.to_vec()).map_err(|e| {
                            FilingKitError::RegistryUnavailable {
                                url: url.to_string(),
                                reason: format!("Failed to read body: {}", e),
                            }
                        });
                    }

                    if !Self::is_transient(status) || retries >= self.max_retries {
                        return Err(FilingKitError::RegistryUnavailable {
                            url: url.to_string(),
                            reason: format!("HTTP {}", status),
                        });
                    }

                    let retry_after =
                        self.retry_delay(response.headers().get(RETRY_AFTER), retries);

                    tracing::warn!(
                        "Transient status {} for {}. Attempt {}/{}. Waiting for {:?} before retry.",
                        status,
                        url,
                        retries + 1,
                        self.max_retries + 1,
                        retry_after
                    );
                    sleep(retry_after).await;
                    retries += 1;
                }
                Err(e) => {
                    if retries >= self.max_retries {
                        return Err(FilingKitError::RegistryUnavailable {
                            url: url.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    let backoff = self.calculate_backoff(retries);
                    tracing::warn!(
                        "Request failed for {}: {}. Attempt {}/{}. Retrying in {:?}.",
                        url,
                        e,
                        retries + 1,
                        self.max_retries + 1,
                        backoff
                    );
                    sleep(backoff).await;
                    retries += 1;
                }
            }
        }
    }

    /// Fetches a URL and decodes it as UTF-8 text (lossily).
    pub async fn get(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetches a JSON endpoint and deserializes it.
    ///
    /// The registry occasionally answers a JSON URL with an HTML error page and a
    /// 200 status; that is reported as `RegistryUnavailable` with a preview of the body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get(url).await?;
        let trimmed = body.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return Err(FilingKitError::RegistryUnavailable {
                url: url.to_string(),
                reason: format!(
                    "Expected JSON, got: {}",
                    trimmed.chars().take(200).collect::<String>()
                ),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Returns the base URL for filing archives.
    pub fn archives_url(&self) -> &str {
        &self.archives_url
    }

    /// Returns the base URL for the data API.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

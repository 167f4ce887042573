//! Rate-limited request client with bounded retry.
//!
//! Rate-limit responses sleep until the server's reset time plus a grace
//! period and are retried without consuming an attempt. Every other failure
//! consumes one attempt and waits a fixed delay before the next.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::{create_async_client, header_number};

/// Raw response as seen by the retry loop.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// `x-ratelimit-remaining`
    pub rate_limit_remaining: Option<u64>,
    /// `x-ratelimit-reset`, epoch seconds
    pub rate_limit_reset: Option<i64>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the server refused the call because the quota is spent.
    pub fn is_rate_limited(&self) -> bool {
        let exhausted =
            matches!(self.status, 403 | 429) && self.rate_limit_remaining == Some(0);
        let message = self.status == 403
            && self.body.to_lowercase().contains("rate limit exceeded");
        exhausted || message
    }
}

/// Performs one GET request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Transport backed by reqwest with bearer authentication.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    token: Option<String>,
}

impl ReqwestTransport {
    pub fn new(config: &CrawlerConfig, token: Option<String>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let rate_limit_remaining = header_number(response.headers(), "x-ratelimit-remaining");
        let rate_limit_reset = header_number(response.headers(), "x-ratelimit-reset");
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            rate_limit_remaining,
            rate_limit_reset,
            body,
        })
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url).await
    }
}

/// Notified before every rate-limit sleep.
#[async_trait]
pub trait RateLimitObserver: Send + Sync {
    async fn before_sleep(&self, delay: Duration);
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl RateLimitObserver for NoopObserver {
    async fn before_sleep(&self, _delay: Duration) {}
}

/// Time to wait for a rate-limit window: `max(reset - now, 0) + grace`.
///
/// A missing reset header falls back to the grace period alone.
pub fn rate_limit_delay(reset: Option<i64>, now: i64, grace: Duration) -> Duration {
    let remaining = reset.map_or(0, |reset| reset.saturating_sub(now).max(0));
    Duration::from_secs(remaining.unsigned_abs()) + grace
}

/// Attempt budget for non-rate-limit failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

/// JSON client enforcing rate-limit backoff and bounded retry.
#[derive(Debug, Clone)]
pub struct RateLimitedClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RateLimitedClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetch `url` and decode the JSON body.
    ///
    /// Returns `Value::Null` for 204 responses.
    pub async fn request(
        &self,
        url: &str,
        grace: Duration,
        observer: &dyn RateLimitObserver,
    ) -> Result<Value> {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            log::debug!("GET {url} (attempt {attempt}/{max_attempts})");

            let failure = match self.transport.get(url).await {
                Ok(response) if response.is_rate_limited() => {
                    let now = chrono::Utc::now().timestamp();
                    let delay = rate_limit_delay(response.rate_limit_reset, now, grace);
                    log::warn!(
                        "Rate limit exceeded for {url}. Sleeping for {}s",
                        delay.as_secs()
                    );
                    observer.before_sleep(delay).await;
                    tokio::time::sleep(delay).await;
                    attempt -= 1;
                    continue;
                }
                Ok(response) if response.status == 200 => {
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(value) => return Ok(value),
                        Err(e) => format!("invalid JSON body: {e}"),
                    }
                }
                Ok(response) if response.status == 204 => return Ok(Value::Null),
                Ok(response) => AppError::Upstream {
                    status: response.status,
                    url: url.to_string(),
                }
                .to_string(),
                Err(e) => e.to_string(),
            };

            log::warn!("Request failed ({attempt}/{max_attempts}): {failure}");
            if attempt >= max_attempts {
                return Err(AppError::retries_exhausted(url, attempt, failure));
            }

            log::info!(
                "Retrying {url} in {}s",
                self.policy.retry_delay.as_secs()
            );
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::*;
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
        }
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 5
    }

    #[derive(Default)]
    struct CountingObserver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateLimitObserver for CountingObserver {
        async fn before_sleep(&self, _delay: Duration) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn delay_is_reset_minus_now_plus_grace() {
        let grace = Duration::from_secs(1);
        assert_eq!(rate_limit_delay(Some(105), 100, grace), Duration::from_secs(6));
        assert_eq!(rate_limit_delay(Some(90), 100, grace), Duration::from_secs(1));
        assert_eq!(rate_limit_delay(None, 100, grace), Duration::from_secs(1));
    }

    #[test]
    fn rate_limit_detection() {
        assert!(rate_limited(0).is_rate_limited());
        assert!(
            HttpResponse {
                status: 429,
                rate_limit_remaining: Some(0),
                ..HttpResponse::default()
            }
            .is_rate_limited()
        );
        assert!(
            HttpResponse {
                status: 403,
                body: "You have exceeded a secondary RATE LIMIT EXCEEDED".into(),
                ..HttpResponse::default()
            }
            .is_rate_limited()
        );
        assert!(!status(403).is_rate_limited());
        assert!(!status(500).is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_do_not_consume_attempts() {
        let reset = far_future();
        let transport = Arc::new(ScriptedTransport::new([
            rate_limited(reset),
            rate_limited(reset),
            rate_limited(reset),
            rate_limited(reset),
            status(500),
            status(502),
            ok(r#"{"id": 1}"#),
        ]));
        let client = RateLimitedClient::new(Arc::clone(&transport), policy());
        let observer = CountingObserver::default();

        let value = client
            .request("https://api/x", Duration::from_secs(1), &observer)
            .await
            .unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(transport.call_count(), 7);
        assert_eq!(observer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_sleeps_until_reset() {
        let reset = far_future();
        let grace = Duration::from_secs(3);
        let transport = ScriptedTransport::new([rate_limited(reset), ok("[]")]);
        let client = RateLimitedClient::new(transport, policy());

        let started = tokio::time::Instant::now();
        client
            .request("https://api/x", grace, &NoopObserver)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        // the wall clock may tick a second between scripting and sleeping
        let remaining = (reset - chrono::Utc::now().timestamp()).max(0) as u64;
        assert!(elapsed >= Duration::from_secs(remaining) + grace);
        assert!(elapsed >= Duration::from_secs(4) + grace);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new([
            status(500),
            status(500),
            status(500),
            ok("{}"),
        ]));
        let client = RateLimitedClient::new(Arc::clone(&transport), policy());

        let started = tokio::time::Instant::now();
        let err = client
            .request("https://api/x", Duration::from_secs(1), &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(transport.call_count(), 3);
        // two sleeps between three attempts
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_json_counts_as_attempt() {
        let transport = Arc::new(ScriptedTransport::new([ok("not json"), ok(r#"[1,2]"#)]));
        let client = RateLimitedClient::new(Arc::clone(&transport), policy());

        let value = client
            .request("https://api/x", Duration::from_secs(1), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!([1, 2]));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_content_is_null() {
        let client = RateLimitedClient::new(ScriptedTransport::new([status(204)]), policy());
        let value = client
            .request("https://api/x", Duration::from_secs(1), &NoopObserver)
            .await
            .unwrap();
        assert!(value.is_null());
    }
}

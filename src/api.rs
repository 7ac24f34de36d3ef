//! HTTP calls with exponential backoff retry logic.
//!
//! Every network call in the pipeline (page scraping, the hosted model, the
//! local model) goes through this module. It follows a decorator design:
//!
//! - [`Transport`]: core trait performing one HTTP exchange
//! - [`ReqwestTransport`]: the real implementation on top of `reqwest`
//! - [`RetryingCaller`]: decorator that adds retry logic to any `Transport`
//!
//! # Retry Strategy
//!
//! Only transient failures are retried: connection errors, timeouts and the
//! statuses 429/500/502/503/504. Anything else fails on the first attempt.
//!
//! ```text
//! delay(retry) = min(base_delay * 2^retry, max_delay) + random_jitter(0..=jitter)
//! ```
//!
//! With the defaults (3 retries, 2 s base) a permanently failing endpoint is
//! called four times with pauses of 2 s, 4 s and 8 s.

use crate::error::CallFailure;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// A fully described HTTP request, independent of the client library.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value, timeout: Duration) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// One HTTP exchange. Non-2xx statuses are reported as [`CallFailure::Status`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CallFailure>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CallFailure> {
        (**self).execute(request).await
    }
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("prensai/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, CallFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CallFailure::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }
        debug!(status = status.as_u16(), bytes = body.len(), "HTTP exchange completed");
        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Backoff parameters for [`RetryingCaller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles with each retry.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay(&self, retry: usize) -> Duration {
        let delay = self.backoff(retry);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Transport`].
pub struct RetryingCaller<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingCaller<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Perform `request`, retrying transient failures.
    ///
    /// Exhausting every attempt returns the last failure; callers treat that
    /// as "backend unavailable", never as a crash.
    #[instrument(level = "info", skip_all, fields(url = %request.url))]
    pub async fn call(&self, request: &HttpRequest) -> Result<HttpResponse, CallFailure> {
        let total_t0 = Instant::now();
        let mut retry = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.execute(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_transient() => {
                    warn!(
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "call failed with non-retryable error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    if retry >= self.policy.max_retries {
                        error!(
                            attempts = retry + 1,
                            max_retries = self.policy.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "call exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay(retry);
                    retry += 1;
                    warn!(
                        retry,
                        max_retries = self.policy.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "call attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryingCaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingCaller")
            .field("policy", &self.policy)
            .finish()
    }
}

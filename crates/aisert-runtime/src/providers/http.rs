//! Shared HTTP settings and the retrying JSON POST used by the count-tokens
//! providers.
//!
//! Requests never outlive the caller's [`ValidationContext`]: each attempt's
//! timeout is clamped to the time left, and no retry starts once the context
//! is cancelled or expired.

use aisert_core::{BackendError, ValidationContext};
use std::time::Duration;

/// Environment variable holding the request timeout, e.g. `30s` or `1m 30s`.
pub const HTTP_TIMEOUT_ENV: &str = "AISERT_HTTP_TIMEOUT";

/// Environment variable holding the retry count for transient failures.
pub const HTTP_RETRIES_ENV: &str = "AISERT_HTTP_RETRIES";

/// Timeout and retry policy for provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Per-attempt request timeout.
    pub timeout: Duration,

    /// Retries after the first attempt for retryable failures.
    pub max_retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl HttpSettings {
    /// Read [`HTTP_TIMEOUT_ENV`] and [`HTTP_RETRIES_ENV`]. Unset or invalid
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(HTTP_TIMEOUT_ENV).ok().as_deref(),
            std::env::var(HTTP_RETRIES_ENV).ok().as_deref(),
        )
    }

    fn from_values(timeout: Option<&str>, retries: Option<&str>) -> Self {
        let mut settings = Self::default();

        if let Some(raw) = timeout {
            match humantime::parse_duration(raw.trim()) {
                Ok(timeout) if !timeout.is_zero() => settings.timeout = timeout,
                Ok(_) => tracing::warn!(value = %raw, "zero HTTP timeout ignored"),
                Err(e) => tracing::warn!(value = %raw, error = %e, "invalid HTTP timeout ignored"),
            }
        }

        if let Some(raw) = retries {
            match raw.trim().parse::<usize>() {
                Ok(retries) => settings.max_retries = retries,
                Err(e) => tracing::warn!(value = %raw, error = %e, "invalid retry count ignored"),
            }
        }

        settings
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Timeout for the next attempt: the configured timeout, cut down to
    /// whatever the context has left.
    pub fn attempt_timeout(&self, ctx: &ValidationContext) -> Result<Duration, BackendError> {
        if let Some(reason) = ctx.interruption() {
            return Err(BackendError::Interrupted(reason.to_string()));
        }
        match ctx.remaining() {
            Some(left) if left.is_zero() => Err(BackendError::Interrupted(
                "validation deadline exceeded".to_string(),
            )),
            Some(left) => Ok(left.min(self.timeout)),
            None => Ok(self.timeout),
        }
    }
}

#[cfg(any(feature = "anthropic", feature = "google"))]
pub(crate) use client::{build_client, post_json};

#[cfg(any(feature = "anthropic", feature = "google"))]
mod client {
    use aisert_core::{BackendError, ValidationContext};
    use backon::{BlockingRetryable, ExponentialBuilder};
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use std::time::Duration;

    use super::HttpSettings;

    const MAX_ERROR_BODY_CHARS: usize = 300;

    pub(crate) fn build_client(
        settings: &HttpSettings,
    ) -> Result<reqwest::blocking::Client, BackendError> {
        reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| BackendError::Http(format!("Failed to build HTTP client: {e}")))
    }

    /// POST `body` as JSON and decode the JSON response, retrying transient
    /// failures with exponential backoff while `ctx` allows.
    pub(crate) fn post_json<B, R>(
        client: &reqwest::blocking::Client,
        settings: &HttpSettings,
        ctx: &ValidationContext,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let attempt = || {
            let timeout = settings.attempt_timeout(ctx)?;
            send_once(client, timeout, url, headers, body)
        };
        let backoff_ctx = ctx.clone();

        attempt
            .retry(ExponentialBuilder::default().with_max_times(settings.max_retries))
            .sleep(move |delay: Duration| {
                let delay = backoff_ctx.remaining().map_or(delay, |left| left.min(delay));
                std::thread::sleep(delay)
            })
            .when(|error: &BackendError| error.is_retryable() && ctx.interruption().is_none())
            .notify(|error: &BackendError, delay: Duration| {
                tracing::warn!(error = %error, retry_in = ?delay, "retrying provider request");
            })
            .call()
    }

    fn send_once<B, R>(
        client: &reqwest::blocking::Client,
        timeout: Duration,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = client
            .post(url)
            .timeout(timeout)
            .header("content-type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(timeout)
            } else {
                BackendError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(BackendError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let message = error_message(&response.text().unwrap_or_default());
            return Err(match status.as_u16() {
                401 | 403 => BackendError::Auth(message),
                code => BackendError::Api {
                    status: code,
                    message,
                },
            });
        }

        response
            .json::<R>()
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// Pull `error.message` out of a provider error body, or fall back to a
    /// truncated copy of the raw body.
    pub(super) fn error_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect())
    }
}

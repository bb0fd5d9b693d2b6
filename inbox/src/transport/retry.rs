//! Retries for idempotent reads (list, unread-count). Mutations never go
//! through here.
//!
//! Every wait, including one requested by a `Retry-After` header, is capped
//! at `max_backoff_ms`, so a read can never sleep longer than
//! `max_retries * max_backoff_ms` on top of its request timeouts.

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    /// Upper bound for any single wait, hinted or computed.
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
    pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 250,
            max_backoff_ms: 5_000,
            jitter_ms: 100,
            status_codes: vec![429, 500, 502, 503],
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    fn retries_status(&self, status: StatusCode) -> bool {
        self.status_codes.contains(&status.as_u16())
    }

    /// Computed wait before retry number `retry` (1-based): doubles from
    /// `base_backoff_ms`, never above the ceiling, plus jitter.
    fn backoff(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(32);
        let delay = self
            .base_backoff_ms
            .saturating_mul(1u64 << doublings)
            .min(self.max_backoff_ms);
        let jitter = match self.jitter_ms {
            0 => 0,
            j => rand::thread_rng().gen_range(0..=j),
        };
        Duration::from_millis(delay.saturating_add(jitter))
    }

    /// Wait before retry number `retry`, preferring the server's hint.
    fn delay(&self, retry: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hinted) => hinted.min(self.ceiling()),
            None => self.backoff(retry),
        }
    }
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn retry_after(response: &Response) -> Option<Duration> {
    let raw = response.headers().get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

fn transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Send a bodiless read, retrying retryable statuses and connect/timeout
/// errors. When retries run out the last response or error is returned
/// untouched; the caller decides what a non-2xx means.
pub async fn send_read(
    op: &'static str,
    request: RequestBuilder,
    config: &RetryConfig,
) -> reqwest::Result<Response> {
    let mut retry = 0u32;

    loop {
        let Some(attempt) = request.try_clone() else {
            return request.send().await;
        };
        let result = attempt.send().await;
        let may_retry = retry < config.max_retries;

        let (wait, cause) = match result {
            Ok(resp) if may_retry && config.retries_status(resp.status()) => {
                let wait = config.delay(retry + 1, retry_after(&resp));
                (wait, resp.status().to_string())
            }
            Err(e) if may_retry && transient(&e) => (config.backoff(retry + 1), e.to_string()),
            done => {
                if retry > 0 {
                    debug!(op, retries = retry, ok = done.is_ok(), "read settled after retries");
                }
                return done;
            }
        };

        retry += 1;
        warn!(
            op,
            attempt = retry,
            max_attempts = config.max_retries + 1,
            cause = %cause,
            wait_ms = wait.as_millis() as u64,
            "read failed, retrying"
        );
        sleep(wait).await;
    }
}

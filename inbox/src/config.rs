use std::time::Duration;

use crate::sync::MutationPolicy;
use crate::transport::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the notification store, e.g. `https://alumni.example.edu/api`.
    pub api_url: String,
    /// Bearer token of the signed-in user.
    pub api_token: Option<String>,
    /// Unread-count polling period. Set via INBOX_POLL_INTERVAL_SECS. Default: 30.
    pub poll_interval: Duration,
    /// Per-request timeout. Set via INBOX_REQUEST_TIMEOUT_SECS. Default: 10.
    pub request_timeout: Duration,
    /// Retries for list and count fetches. Set via INBOX_READ_RETRIES. Default: 2.
    pub read_retries: u32,
    /// Revert optimistic reads the store rejected.
    /// Set via INBOX_ROLLBACK_ON_FAILURE. Default: false.
    pub rollback_on_failure: bool,
}

impl Config {
    pub fn mutation_policy(&self) -> MutationPolicy {
        if self.rollback_on_failure {
            MutationPolicy::Rollback
        } else {
            MutationPolicy::Lenient
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.read_retries,
            ..RetryConfig::default()
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an optional numeric setting. Unset or blank means `default`;
/// anything else must parse.
fn number<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not a valid number: {}", key, v, e)),
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup; `load` passes the process env.
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let api_url = get("INBOX_API_URL").unwrap_or_else(|| "http://localhost:5000/api".into());
    if let Err(e) = url::Url::parse(&api_url) {
        anyhow::bail!("INBOX_API_URL '{}' is not a valid URL: {}", api_url, e);
    }

    let poll_secs: u64 = number(
        "INBOX_POLL_INTERVAL_SECS",
        get("INBOX_POLL_INTERVAL_SECS"),
        30,
    )?;
    if poll_secs == 0 {
        anyhow::bail!("INBOX_POLL_INTERVAL_SECS must be greater than zero");
    }
    let timeout_secs: u64 = number(
        "INBOX_REQUEST_TIMEOUT_SECS",
        get("INBOX_REQUEST_TIMEOUT_SECS"),
        10,
    )?;
    let read_retries: u32 = number("INBOX_READ_RETRIES", get("INBOX_READ_RETRIES"), 2)?;

    let rollback_on_failure = match get("INBOX_ROLLBACK_ON_FAILURE") {
        None => false,
        Some(raw) => match parse_bool(&raw) {
            Some(flag) => flag,
            None => anyhow::bail!(
                "INBOX_ROLLBACK_ON_FAILURE '{}' is not a boolean (use true/false)",
                raw
            ),
        },
    };

    Ok(Config {
        api_url,
        api_token: get("INBOX_API_TOKEN").filter(|t| !t.trim().is_empty()),
        poll_interval: Duration::from_secs(poll_secs),
        request_timeout: Duration::from_secs(timeout_secs),
        read_retries,
        rollback_on_failure,
    })
}

use std::time::Duration;

use crate::api::Endpoints;
use crate::poller::{PollConfig, WaitPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};

const DEFAULT_CE_URL: &str = "https://ce.judge0.com";
const DEFAULT_EXTRA_CE_URL: &str = "https://extra-ce.judge0.com";
const BUNDLED_FILES_PATH: &str = "/data/additional_files_zip_base64.txt";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults pointing at the public service instances.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    pub poll: PollConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                       |
    /// |---------------------------|-----------------------------------------------|
    /// | `JUDGE_CE_URL`            | `https://ce.judge0.com`                       |
    /// | `JUDGE_EXTRA_CE_URL`      | `https://extra-ce.judge0.com`                 |
    /// | `JUDGE_BUNDLED_FILES_URL` | `<JUDGE_CE_URL>/data/additional_files_zip_base64.txt` |
    /// | `POLL_MAX_ATTEMPTS`       | `50`                                          |
    /// | `POLL_INTERVAL_MS`        | `100`                                         |
    /// | `POLL_INITIAL_DELAY_MS`   | `0`                                           |
    /// | `POLL_BACKOFF_MAX_MS`     | unset (fixed interval)                        |
    /// | `POLL_BACKOFF_MULTIPLIER` | `2.0`                                         |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                          |
    ///
    /// Setting `POLL_BACKOFF_MAX_MS` switches the wait between attempts to
    /// exponential backoff starting at `POLL_INTERVAL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let ce_url = var("JUDGE_CE_URL").unwrap_or_else(|| DEFAULT_CE_URL.into());
        let extra_ce_url =
            var("JUDGE_EXTRA_CE_URL").unwrap_or_else(|| DEFAULT_EXTRA_CE_URL.into());
        let bundled_files_url = var("JUDGE_BUNDLED_FILES_URL").unwrap_or_else(|| {
            format!("{}{BUNDLED_FILES_PATH}", ce_url.trim_end_matches('/'))
        });

        let max_attempts = parse(
            "POLL_MAX_ATTEMPTS",
            var("POLL_MAX_ATTEMPTS"),
            DEFAULT_MAX_ATTEMPTS,
        )?;
        let interval_ms = parse(
            "POLL_INTERVAL_MS",
            var("POLL_INTERVAL_MS"),
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;
        let initial_delay_ms = parse("POLL_INITIAL_DELAY_MS", var("POLL_INITIAL_DELAY_MS"), 0)?;
        let interval = Duration::from_millis(interval_ms);
        let wait = match var("POLL_BACKOFF_MAX_MS") {
            None => WaitPolicy::Fixed(interval),
            Some(max_ms) => {
                let max_ms: u64 = parse("POLL_BACKOFF_MAX_MS", Some(max_ms), 0)?;
                let multiplier_text = var("POLL_BACKOFF_MULTIPLIER");
                let multiplier: f64 = parse(
                    "POLL_BACKOFF_MULTIPLIER",
                    multiplier_text.clone(),
                    DEFAULT_BACKOFF_MULTIPLIER,
                )?;
                if !multiplier.is_finite() || multiplier < 1.0 {
                    return Err(ConfigError::Invalid {
                        var: "POLL_BACKOFF_MULTIPLIER",
                        value: multiplier_text.unwrap_or_default(),
                    });
                }
                WaitPolicy::Backoff {
                    initial: interval,
                    max: Duration::from_millis(max_ms).max(interval),
                    multiplier,
                }
            }
        };
        let request_timeout_secs = parse(
            "REQUEST_TIMEOUT_SECS",
            var("REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            endpoints: Endpoints {
                ce_url,
                extra_ce_url,
                bundled_files_url,
            },
            request_timeout: Duration::from_secs(request_timeout_secs),
            poll: PollConfig {
                initial_delay: Duration::from_millis(initial_delay_ms),
                wait,
                max_attempts,
            },
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

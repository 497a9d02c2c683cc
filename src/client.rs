use reqwest::header;
use serde_json::Value;
use std::error::Error;
use std::time::Duration;

use crate::config::Config;
use crate::error::AppError;

const MAX_ATTEMPTS: u32 = 4;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(8);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses worth retrying; everything else fails the attempt outright.
const RETRY_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Authenticated client for the Supabase REST endpoint.
///
/// All requests are reads, so retrying is always safe. Certificate
/// verification uses the platform root bundle and is never skipped.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    /// # Errors
    /// * `AppError::Config` when the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build HTTP client: {}", err)))?;

        Ok(Self {
            http,
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_key.clone(),
        })
    }

    /// Fetch all rows of `table` as raw JSON objects.
    ///
    /// Up to four attempts with exponential backoff starting at one second,
    /// retried only on transient statuses or connection-level failures. The
    /// retry loop blocks the calling interaction until it succeeds or the
    /// budget is exhausted.
    ///
    /// # Errors
    /// * `AppError::Tls` on certificate/handshake failure.
    /// * `AppError::Transport` on any other network or HTTP failure.
    pub async fn fetch_table(&self, table: &str) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let mut delay = INITIAL_BACKOFF;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch(&url).await {
                Ok(rows) => {
                    if attempt > 1 {
                        log::info!("fetch of {} succeeded on attempt {}", table, attempt);
                    }
                    return Ok(rows);
                }
                Err(failure) => {
                    if !failure.retryable || attempt == MAX_ATTEMPTS {
                        return Err(failure.error);
                    }
                    log::warn!(
                        "fetch of {} failed on attempt {}/{}: {}; retrying in {:?}",
                        table,
                        attempt,
                        MAX_ATTEMPTS,
                        failure.error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay);
                }
            }
        }

        unreachable!("loop exits via return")
    }

    async fn try_fetch(&self, url: &str) -> Result<Vec<Value>, FetchFailure> {
        let response = self
            .http
            .get(url)
            .query(&[("select", "*")])
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure {
                retryable: is_retryable_status(status.as_u16()),
                error: AppError::Transport(format!("server returned {} for {}", status, url)),
            });
        }

        response.json::<Vec<Value>>().await.map_err(|err| FetchFailure {
            retryable: false,
            error: AppError::Transport(format!("invalid JSON response: {}", err)),
        })
    }
}

struct FetchFailure {
    error: AppError,
    retryable: bool,
}

fn classify_request_error(err: reqwest::Error) -> FetchFailure {
    if is_tls_error(&err) {
        // Never degraded to a plain transport error: the remediation
        // guidance in the Tls message is the whole point.
        return FetchFailure {
            retryable: false,
            error: AppError::Tls(err.to_string()),
        };
    }

    FetchFailure {
        retryable: err.is_connect() || err.is_timeout(),
        error: AppError::Transport(err.to_string()),
    }
}

// reqwest does not expose a TLS discriminant, so walk the source chain.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if message.contains("certificate")
            || message.contains("handshake")
            || message.contains("SSL")
            || message.contains("tls")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

fn is_retryable_status(code: u16) -> bool {
    RETRY_STATUS.contains(&code)
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_are_retryable() {
        for code in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(code), "{code} should be retryable");
        }
    }

    #[test]
    fn client_errors_are_not_retryable() {
        for code in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(code), "{code} should not retry");
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut delay = INITIAL_BACKOFF;
        let mut schedule = Vec::new();
        for _ in 0..4 {
            schedule.push(delay.as_secs());
            delay = next_delay(delay);
        }
        assert_eq!(schedule, vec![1, 2, 4, 8]);
        assert_eq!(next_delay(delay), MAX_BACKOFF);
    }
}

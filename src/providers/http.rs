use std::time::Duration;

use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Why a provider request did not produce a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    /// Connection, DNS, timeout or I/O failure
    Network(String),
    /// The provider answered with a non-success status
    Status(u16),
}

/// Blocking JSON transport shared by the provider clients.
///
/// Makes exactly one attempt per request unless the caller configured more.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    agent: ureq::Agent,
    pub(crate) retry_attempts: u32,
}

impl HttpTransport {
    pub(crate) fn new(timeout: Option<Duration>, retry_attempts: u32) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build()
            .into();

        Self {
            agent,
            retry_attempts: retry_attempts.max(1),
        }
    }

    pub(crate) fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build()
            .into();
        self
    }

    pub(crate) fn get(&self, url: &Url) -> Result<String, RequestFailure> {
        self.make_request_with_retry(url, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    pub(crate) fn post_json(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<String, RequestFailure> {
        self.make_request_with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn make_request_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String, RequestFailure>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_failure = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let failure = match &error {
                        ureq::Error::StatusCode(status) if *status >= 500 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            RequestFailure::Status(*status)
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(RequestFailure::Status(*status));
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            RequestFailure::Network(error.to_string())
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            return Err(RequestFailure::Network(error.to_string()));
                        }
                    };

                    last_failure = Some(failure);

                    if attempt < self.retry_attempts {
                        let delay = backoff_delay(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("Request to {} failed", url);

        Err(last_failure
            .unwrap_or_else(|| RequestFailure::Network("request was never attempted".to_string())))
    }
}

/// Wait before the attempt following `attempt`: 1s, 2s, 4s, ... saturating at `u64::MAX` ms
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let delay_ms = EXPONENTIAL_BACKOFF_BASE
        .saturating_pow(attempt.saturating_sub(1))
        .saturating_mul(1000);
    Duration::from_millis(delay_ms)
}

impl std::fmt::Display for RequestFailure {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {}", message),
            Self::Status(status) => write!(f, "HTTP {}", status),
        }
    }
}

impl std::error::Error for RequestFailure {}

impl RequestFailure {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match *self {
            Self::Status(status) => Some(status),
            Self::Network(_) => None,
        }
    }
}

//! Blocking JSON client shared by the hosted service integrations.
//!
//! Failures are classified so callers can tell a transient outage
//! (retried here with exponential backoff) from a request the service
//! will never accept.

#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpConfig;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transient failure after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    #[error("authentication failed (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("request rejected (HTTP {status})")]
    Rejected { status: u16 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Outcome of a single attempt, before retry policy is applied
enum Attempt {
    Retry(String),
    Fail(ServiceError),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
    retry_attempts: u32,
    backoff: Duration,
}

impl ApiClient {
    #[inline]
    pub fn new(http: &HttpConfig) -> Self {
        Self {
            agent: build_agent(Duration::from_secs(http.timeout_secs)),
            headers: Vec::new(),
            retry_attempts: http.retry_attempts,
            backoff: Duration::from_millis(http.backoff_ms),
        }
    }

    /// Attach a header sent with every request
    #[inline]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[inline]
    pub fn with_bearer_token(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ServiceError> {
        let body = self.get(url)?;
        parse_json(&body)
    }

    #[inline]
    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self.post(url, body)?;
        parse_json(&response)
    }

    /// GET a resource and return the raw response body
    #[inline]
    pub fn get(&self, url: &Url) -> Result<String, ServiceError> {
        self.send_with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body and return the raw response body
    #[inline]
    pub fn post<B: Serialize>(&self, url: &Url, body: &B) -> Result<String, ServiceError> {
        let payload = serde_json::to_string(body)
            .map_err(|e| ServiceError::Request(format!("Failed to serialize request: {}", e)))?;

        self.send_with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request
                .send(&payload)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn send_with_retry<F>(&self, url: &Url, mut request_fn: F) -> Result<String, ServiceError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_message = String::from("no attempt made");

        for attempt in 1..=self.retry_attempts {
            debug!(
                "HTTP request to {} attempt {}/{}",
                url, attempt, self.retry_attempts
            );

            match request_fn() {
                Ok(body) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Err(err) => match classify(&err) {
                    Attempt::Fail(service_error) => {
                        warn!("Request to {} failed, not retrying: {}", url, service_error);
                        return Err(service_error);
                    }
                    Attempt::Retry(message) => {
                        warn!(
                            "{}, attempt {}/{}",
                            message, attempt, self.retry_attempts
                        );
                        last_message = message;

                        if attempt < self.retry_attempts {
                            let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                            debug!("Waiting {:?} before retry", delay);
                            std::thread::sleep(delay);
                        }
                    }
                },
            }
        }

        error!("All retry attempts failed for request to {}", url);
        Err(ServiceError::Transient {
            attempts: self.retry_attempts,
            message: last_message,
        })
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn classify(error: &ureq::Error) -> Attempt {
    match error {
        ureq::Error::StatusCode(status) => match *status {
            401 | 403 => Attempt::Fail(ServiceError::Unauthorized { status: *status }),
            429 => Attempt::Retry(format!("Rate limited (status {})", status)),
            status if status >= 500 => Attempt::Retry(format!("Server error (status {})", status)),
            status => Attempt::Fail(ServiceError::Rejected { status }),
        },
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => Attempt::Retry(format!("Transport error: {}", error)),
        other => Attempt::Fail(ServiceError::Request(other.to_string())),
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

/// Join a path onto a base URL without discarding the base path
#[inline]
pub fn endpoint(base: &Url, path: &str) -> Result<Url, ServiceError> {
    let mut joined = base.as_str().trim_end_matches('/').to_string();
    joined.push('/');
    joined.push_str(path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| ServiceError::Request(format!("Invalid URL {}: {}", joined, e)))
}

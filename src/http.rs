//! Utility functions for creating HTTP clients and sending requests with retries
use crate::config::Credentials;
use crate::error::Error;
use anyhow::Result;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Responses with these statuses are retried.
pub const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];
const BACKOFF_FACTOR: Duration = Duration::from_secs(2);

pub fn client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Delay before retry number `attempt` (zero-based): 2s, 4s, 8s, ...
pub fn backoff(attempt: u32) -> Duration {
    BACKOFF_FACTOR * 2u32.saturating_pow(attempt)
}

/// Connection failures and timeouts are worth another attempt; anything
/// else (bad URL, body or redirect errors) would fail the same way again.
pub fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn is_retry_status(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

/// Sends `request` with basic auth, retrying server errors and transient
/// transport failures up to `max_retries` times. Any other non-success status
/// is an error.
pub async fn send(
    request: RequestBuilder,
    credentials: &Credentials,
    max_retries: u32,
) -> Result<Response> {
    let request = request.basic_auth(&credentials.username, Some(&credentials.password));
    let mut attempt = 0;
    loop {
        let result = request
            .try_clone()
            .ok_or(Error::RequestClone)?
            .send()
            .await;
        let reason = match result {
            Ok(response) if is_retry_status(response.status()) && attempt < max_retries => {
                format!("HTTP-{} from {}", response.status().as_u16(), response.url())
            }
            Ok(response) if !response.status().is_success() => {
                return Err(Error::Service {
                    status: response.status().as_u16(),
                    url: response.url().to_string(),
                }
                .into());
            }
            Ok(response) => return Ok(response),
            Err(e) if is_transient(&e) && attempt < max_retries => e.to_string(),
            Err(e) => return Err(e.into()),
        };
        let delay = backoff(attempt);
        warn!(
            "{}, retrying in {}s ({}/{})",
            reason,
            delay.as_secs(),
            attempt + 1,
            max_retries
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Remote file access needed to resume downloads.
pub trait ObjectOps {
    /// Size of the remote object, when the server reports one.
    async fn head_object(self: &Self, url: &str) -> Result<Option<u64>>;

    /// Object content from `start_byte` to the end.
    async fn get_object_range(self: &Self, url: &str, start_byte: u64) -> Result<Response>;
}

pub fn is_partial(response: &Response) -> bool {
    response.status() == StatusCode::PARTIAL_CONTENT
}

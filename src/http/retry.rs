//! Retry policy for network operations.

use log::{debug, warn};
use reqwest::StatusCode;

use crate::error::ModInstallerError;

/// Maximum number of attempts for one network operation.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Failures that will not go away by asking again.
#[derive(Debug)]
pub enum NonRetryableError {
    /// HTTP 401
    AuthenticationFailed(String),
    /// HTTP 404
    NotFound(String),
    /// HTTP 403 without an exhausted rate limit
    Forbidden(String),
    /// Other 4xx responses
    ClientError(String),
    /// The server answered with something that is not the requested file
    UnexpectedContent(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::AuthenticationFailed(url) => {
                write!(f, "Authentication failed for {}. Check your GITHUB_TOKEN.", url)
            }
            NonRetryableError::NotFound(url) => write!(f, "Not found: {}", url),
            NonRetryableError::Forbidden(url) => {
                write!(f, "Access forbidden: {}. You may need authentication.", url)
            }
            NonRetryableError::ClientError(msg) => write!(f, "Request error: {}", msg),
            NonRetryableError::UnexpectedContent(msg) => write!(f, "Unexpected content: {}", msg),
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies an HTTP error status. `Ok(())` means the request may be
/// retried (server errors).
pub fn classify_status(status: StatusCode, url: &str) -> Result<(), NonRetryableError> {
    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(url.to_string())),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(url.to_string())),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(url.to_string())),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {} from {}",
            s.as_u16(),
            url
        ))),
        _ => Ok(()),
    }
}

/// Converts an error from `error_for_status()` into a retryable
/// `reqwest::Error` or a [`NonRetryableError`].
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());
    match error.status().map(|status| classify_status(status, &url)) {
        Some(Err(non_retryable)) => anyhow::Error::from(non_retryable),
        _ => anyhow::Error::from(error),
    }
}

/// Non-retryable failures and every domain error (rate limit, unknown
/// host) stop the retry loop.
pub fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
        && e.downcast_ref::<ModInstallerError>().is_none()
}

/// Runs `operation` up to [`MAX_RETRIES`] times.
pub async fn with_retry<F, Fut, T>(operation_name: &str, operation: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable_error(&e) {
                    debug!("{}: non-retryable error: {}", operation_name, e);
                    return Err(e);
                }

                if attempt < MAX_RETRIES {
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                        operation_name, attempt, MAX_RETRIES, e, RETRY_DELAY_MS
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        anyhow::anyhow!("{}: failed after {} attempts", operation_name, MAX_RETRIES)
    }))
}

//! HTTP transport with conditional requests, rate limit tracking and retry.

mod client;
mod retry;

use anyhow::Result;
use async_trait::async_trait;

use crate::progress::ProgressListeners;

pub use client::HttpClient;
pub use retry::{
    MAX_RETRIES, NonRetryableError, RETRY_DELAY_MS, check_retryable, classify_status,
    is_retryable_error, with_retry,
};

/// Result of a (possibly conditional) GET request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Decoded body without a leading byte order mark. Empty for 304.
    pub body: String,
    pub etag: Option<String>,
}

impl FetchResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// Network access used by sources and asset downloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`, sending `If-None-Match` when `etag` is known.
    ///
    /// Fails with `RateLimited` while a rate limit is in effect and with
    /// `HostUnreachable` when the host cannot be contacted.
    async fn fetch(&self, url: &str, etag: Option<String>) -> Result<FetchResponse>;

    /// Download the content of `url`, reporting its size and progress.
    async fn download(&self, url: &str, progress: &ProgressListeners) -> Result<Vec<u8>>;
}

/// Removes a leading UTF-8 byte order mark, in decoded or raw form.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}')
        .or_else(|| text.strip_prefix("\u{ef}\u{bb}\u{bf}"))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}{}"), "{}");
        assert_eq!(strip_bom("\u{ef}\u{bb}\u{bf}{}"), "{}");
        assert_eq!(strip_bom("{}"), "{}");
    }

    #[test]
    fn test_not_modified() {
        let response = FetchResponse {
            status: 304,
            ..Default::default()
        };
        assert!(response.is_not_modified());
        assert!(!FetchResponse::default().is_not_modified());
    }
}

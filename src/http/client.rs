//! reqwest based [`Transport`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use log::debug;
use reqwest::header::{
    ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, ETAG, HeaderMap, HeaderValue,
    IF_NONE_MATCH,
};
use reqwest::{Client, Response, StatusCode};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::retry::{NonRetryableError, check_retryable, with_retry};
use super::{FetchResponse, Transport, strip_bom};
use crate::error::ModInstallerError;
use crate::progress::{ProgressListeners, format_byte_count};

const USER_AGENT: &str = "modpm";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// HTTP client that remembers an exhausted rate limit and refuses to send
/// requests until it has been reset.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limit_reset: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            rate_limit_reset: Arc::new(Mutex::new(None)),
        }
    }

    /// Builds the default client, authenticating with `token` if given.
    pub fn with_token(token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using GITHUB_TOKEN for authentication");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self::new(client))
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// The time until which requests are refused, if a limit was hit.
    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        self.rate_limit_reset.lock().ok().and_then(|reset| *reset)
    }

    fn check_rate_limit(&self) -> Result<()> {
        let mut reset = self
            .rate_limit_reset
            .lock()
            .map_err(|_| anyhow!("Rate limit state is poisoned"))?;
        match *reset {
            Some(at) if at > Utc::now() => Err(ModInstallerError::RateLimited { reset: at }.into()),
            Some(_) => {
                *reset = None;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Remembers the reset time if the response says no requests are left.
    fn record_rate_limit(&self, headers: &HeaderMap) -> Option<DateTime<Utc>> {
        let remaining = headers.get(RATE_LIMIT_REMAINING)?.to_str().ok()?;
        if remaining.trim() != "0" {
            return None;
        }

        let reset = headers
            .get(RATE_LIMIT_RESET)?
            .to_str()
            .ok()?
            .trim()
            .parse::<i64>()
            .ok()?;
        let reset = Utc.timestamp_opt(reset, 0).single()?;
        debug!("Rate limit exhausted until {}", reset);

        if let Ok(mut state) = self.rate_limit_reset.lock() {
            *state = Some(reset);
        }
        Some(reset)
    }

    /// Fails with `RateLimited` on HTTP 429 or on a 403 caused by an
    /// exhausted limit. Later requests are refused until the reset.
    fn check_rate_limited(&self, response: &Response) -> Result<()> {
        let exhausted = self.record_rate_limit(response.headers());
        let status = response.status();
        let limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && exhausted.is_some());
        if !limited {
            return Ok(());
        }

        let reset = exhausted.unwrap_or_else(|| Utc::now() + chrono::Duration::minutes(1));
        if let Ok(mut state) = self.rate_limit_reset.lock() {
            *state = Some(reset);
        }
        Err(ModInstallerError::RateLimited { reset }.into())
    }

    async fn fetch_once(&self, url: &str, etag: Option<&str>) -> Result<FetchResponse> {
        self.check_rate_limit()?;

        let mut request = self.client.get(url).header(ACCEPT_ENCODING, "gzip");
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().await.map_err(|e| send_error(url, e))?;
        self.check_rate_limited(&response)?;
        let status = response.status();

        let response_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if status == StatusCode::NOT_MODIFIED {
            debug!("{} is unmodified", url);
            return Ok(FetchResponse {
                status: status.as_u16(),
                body: String::new(),
                etag: response_etag.or_else(|| etag.map(str::to_string)),
            });
        }

        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("gzip"));

        let response = response.error_for_status().map_err(check_retryable)?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        let body = decode_body(&bytes, gzipped)?;

        Ok(FetchResponse {
            status: status.as_u16(),
            body: strip_bom(&body).to_string(),
            etag: response_etag,
        })
    }

    async fn download_once(&self, url: &str, progress: &ProgressListeners) -> Result<Vec<u8>> {
        self.check_rate_limit()?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_error(url, e))?;
        self.check_rate_limited(&response)?;
        let mut response = response.error_for_status().map_err(check_retryable)?;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        if is_html {
            return Err(NonRetryableError::UnexpectedContent(format!(
                "Received a text/html page instead of a file from {}",
                url
            ))
            .into());
        }

        let total = response.content_length().unwrap_or(0);
        progress.detail(&format_byte_count(total));
        progress.step_progress(0, total);

        // Content-Length is only a hint
        let mut data = Vec::with_capacity(total.min(MAX_PREALLOCATION) as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            data.extend_from_slice(&chunk);
            progress.step_progress(data.len() as u64, total);
        }

        debug!(
            "Downloaded {:.2} MB from {}",
            data.len() as f64 / (1024.0 * 1024.0),
            url
        );
        Ok(data)
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, etag: Option<String>) -> Result<FetchResponse> {
        debug!("GET {} (etag {:?})...", url, etag);
        with_retry("Fetch", || self.fetch_once(url, etag.as_deref())).await
    }

    #[tracing::instrument(skip(self, progress))]
    async fn download(&self, url: &str, progress: &ProgressListeners) -> Result<Vec<u8>> {
        debug!("Downloading {}...", url);
        with_retry("Download", || self.download_once(url, progress)).await
    }
}

/// Connection failures mean the host is unreachable; the rest are retried.
fn send_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_connect() {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        return ModInstallerError::HostUnreachable(host).into();
    }
    if error.is_builder() {
        return NonRetryableError::ClientError(format!("Invalid request to {}: {}", url, error))
            .into();
    }
    anyhow::Error::from(error).context(format!("Failed to send request to {}", url))
}

fn decode_body(bytes: &[u8], gzipped: bool) -> Result<String> {
    if !gzipped {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let mut body = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut body)
        .context("Failed to decompress gzip response")?;
    Ok(body)
}

//! HTTP client for xkcd and explainxkcd
//!
//! One `XkcdClient` is built per process and cloned into every task; the
//! underlying `reqwest::Client` shares its connection pool across clones.

use crate::assemble::{assemble, ExplainResponse, XkcdComic};
use crate::config::DownloadSettings;
use crate::endpoints::{ComicId, Endpoints};
use crate::error::{classify_decode_error, FetchError, SourceKind};
use crate::retry::{retry, RetryPolicy};
use reqwest::Url;
use serde::de::DeserializeOwned;
use sxkcd_common::Comic;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = concat!("sxkcd-dl/", env!("CARGO_PKG_VERSION"));

/// Fetch client for both upstream APIs
#[derive(Debug, Clone)]
pub struct XkcdClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    max_body_bytes: u64,
    retry_policy: RetryPolicy,
}

impl XkcdClient {
    pub fn new(settings: &DownloadSettings) -> Result<Self, FetchError> {
        let endpoints = Endpoints::new(&settings.xkcd_base_url, &settings.explain_base_url)?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| FetchError::InvalidArgument(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoints,
            max_body_bytes: settings.max_body_bytes,
            retry_policy: settings.retry,
        })
    }

    /// Fetch one comic from both sources and merge them.
    ///
    /// `ComicId::LATEST` fetches the most recent comic and stores it under
    /// the number xkcd reports for it.
    pub async fn fetch(&self, id: ComicId, cancel: &CancellationToken) -> Result<Comic, FetchError> {
        let xkcd: XkcdComic = self
            .get_json_with_retry(&self.endpoints.xkcd(id), cancel)
            .await
            .map_err(|e| e.at(SourceKind::Xkcd, id.get()))?;

        let num = if id.is_latest() { xkcd.num } else { id.get() };

        let explain: ExplainResponse = self
            .get_json_with_retry(&self.endpoints.explain(num), cancel)
            .await
            .map_err(|e| e.at(SourceKind::Explain, num))?;

        let comic = assemble(num, xkcd, &explain).map_err(|e| e.at(SourceKind::Xkcd, num))?;
        tracing::debug!(comic_id = num, title = %comic.title, "Comic fetched");
        Ok(comic)
    }

    /// Number of the most recent comic
    pub async fn fetch_latest_num(&self, cancel: &CancellationToken) -> Result<u32, FetchError> {
        let latest: XkcdComic = self
            .get_json_with_retry(&self.endpoints.xkcd(ComicId::LATEST), cancel)
            .await
            .map_err(|e| e.at(SourceKind::Xkcd, 0))?;
        Ok(latest.num)
    }

    pub async fn fetch_latest(&self, cancel: &CancellationToken) -> Result<Comic, FetchError> {
        self.fetch(ComicId::LATEST, cancel).await
    }

    /// [`get_json`](Self::get_json) under the client's retry policy
    pub async fn get_json_with_retry<T: DeserializeOwned>(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        retry(url.as_str(), &self.retry_policy, cancel, || self.get_json::<T>(url, cancel)).await
    }

    /// One GET, decoded into `T`.
    ///
    /// The body is read in chunks and abandoned as soon as it passes
    /// `max_body_bytes`. Invalid UTF-8 in the body is replaced with U+FFFD
    /// before decoding.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tracing::trace!(url = %url, "GET");
        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FetchError::BodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| request_error(url, e))? {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let text = String::from_utf8_lossy(&body);
        serde_json::from_str(&text).map_err(|e| classify_decode_error(e, text.as_bytes()))
    }
}

/// Map a reqwest failure; everything but a malformed request is transient
fn request_error(url: &Url, err: reqwest::Error) -> FetchError {
    if err.is_builder() {
        return FetchError::InvalidArgument(format!("bad request for {}: {}", url, err));
    }

    let message = if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    };
    FetchError::Transient {
        url: url.to_string(),
        message,
    }
}

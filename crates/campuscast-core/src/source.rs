//! Stream Source Resolver
//!
//! Resolves a playable-content id against the content backend into a
//! manifest URI and poster, together with the transcode status that gates
//! whether the player may load it.

use crate::types::PlaybackSource;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default HTTP timeout for backend requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default period between readiness polls
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// First gateway retry delay; doubles per attempt
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Doubling stops here (200 ms << 5 = 6.4 s)
const RETRY_MAX_SHIFT: u32 = 5;

/// Delay before retrying a response, or `None` when it should be returned as is.
/// Only 502/503/504 are retried, at most `retries` times.
pub fn retry_backoff(status: StatusCode, attempt: u32, retries: u32) -> Option<Duration> {
    let gateway = matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    );
    if !gateway || attempt >= retries {
        return None;
    }
    Some(RETRY_BASE_DELAY * (1u32 << attempt.min(RETRY_MAX_SHIFT)))
}

/// Backend transcode status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscodeStatus {
    /// No further status change is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranscodeStatus::Completed | TranscodeStatus::Failed)
    }
}

impl std::fmt::Display for TranscodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscodeStatus::Pending => write!(f, "pending"),
            TranscodeStatus::Processing => write!(f, "processing"),
            TranscodeStatus::Completed => write!(f, "completed"),
            TranscodeStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Private,
    Unlisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStatus {
    pub transcode: TranscodeStatus,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One encoded rendition as listed by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRendition {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Bits per second
    pub bandwidth: u64,
    pub codecs: String,
    pub frame_rate: f64,
    pub playlist_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPlayback {
    #[serde(default)]
    pub hls_master_url: Option<String>,
    #[serde(default)]
    pub renditions: Vec<ContentRendition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFiles {
    #[serde(default)]
    pub thumbnail: Option<FileRef>,
    #[serde(default)]
    pub source: Option<FileRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTimestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Playable content as returned by the view endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetail {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub access: Option<Access>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    pub status: ContentStatus,
    #[serde(default)]
    pub playback: ContentPlayback,
    #[serde(default)]
    pub files: ContentFiles,
    #[serde(default)]
    pub timestamps: Option<ContentTimestamps>,
}

/// Response envelope `{ ok, data }`
#[derive(Debug, Clone, Deserialize)]
pub struct ContentDetailResponse {
    pub ok: bool,
    #[serde(default)]
    pub data: Option<ContentDetail>,
}

/// Result of resolving a content id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub content_id: String,
    /// Absolute manifest URI, once the backend published one
    pub uri: Option<String>,
    pub poster_uri: Option<String>,
    /// Safe to hand to the player
    pub ready: bool,
    pub status: TranscodeStatus,
    /// Backend-reported failure reason
    pub status_detail: Option<String>,
}

impl ResolvedSource {
    pub fn from_detail(detail: &ContentDetail, api_base: &Url) -> Self {
        let uri = detail
            .playback
            .hls_master_url
            .as_deref()
            .and_then(|path| media_url(api_base, path));
        let poster_uri = detail
            .files
            .thumbnail
            .as_ref()
            .and_then(|thumb| media_url(api_base, &thumb.url));
        let ready = detail.status.transcode == TranscodeStatus::Completed && uri.is_some();

        Self {
            content_id: detail.id.clone(),
            uri,
            poster_uri,
            ready,
            status: detail.status.transcode,
            status_detail: detail.status.error.clone(),
        }
    }

    /// Whether polling can stop
    pub fn is_settled(&self) -> bool {
        self.ready || self.status.is_terminal()
    }

    /// The source to load, or why it cannot be loaded yet
    pub fn playback_source(&self) -> Result<PlaybackSource> {
        if self.status == TranscodeStatus::Failed {
            return Err(Error::SourceFailed {
                content_id: self.content_id.clone(),
                detail: self.status_detail.clone(),
            });
        }
        match (&self.uri, self.ready) {
            (Some(uri), true) => Ok(PlaybackSource {
                uri: uri.clone(),
                poster_uri: self.poster_uri.clone(),
            }),
            _ => Err(Error::SourceNotReady {
                status: self.status.to_string(),
            }),
        }
    }
}

/// Make a backend file path absolute. Paths already starting with `http`
/// pass through unchanged.
pub fn media_url(api_base: &Url, path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    if path.starts_with("http") {
        return Some(path.to_string());
    }
    let base = api_base.as_str().trim_end_matches('/');
    if path.starts_with('/') {
        Some(format!("{}{}", base, path))
    } else {
        Some(format!("{}/{}", base, path))
    }
}

/// Detail endpoint for `content_id`
pub fn detail_endpoint(api_base: &Url, content_id: &str) -> Result<Url> {
    let mut url = api_base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::InvalidConfig(format!("{} cannot be used as an API base", api_base)))?
        .pop_if_empty()
        .extend(["api", "playable-contents", content_id, "view"]);
    Ok(url)
}

/// Resolves content ids to playback sources
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn fetch_detail(&self, content_id: &str) -> Result<ContentDetail>;

    async fn resolve(&self, content_id: &str) -> Result<ResolvedSource>;
}

/// Resolver talking to the content backend over HTTP
pub struct HttpSourceResolver {
    client: Client,
    api_base: Url,
    /// Extra attempts on 502/503/504
    retries: u32,
}

impl HttpSourceResolver {
    pub fn new(api_base: &str) -> Result<Self> {
        Self::with_timeout(api_base, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: Url::parse(api_base)?,
            retries: 0,
        })
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    async fn get_with_retry(&self, url: &Url) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            match retry_backoff(status, attempt, self.retries) {
                Some(backoff) => {
                    let status = status.as_u16();
                    warn!(status, attempt, ?backoff, "Backend unavailable, retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                None => return Ok(response),
            }
        }
    }
}

#[async_trait]
impl SourceResolver for HttpSourceResolver {
    #[instrument(skip(self))]
    async fn fetch_detail(&self, content_id: &str) -> Result<ContentDetail> {
        let url = detail_endpoint(&self.api_base, content_id)?;
        let response = self.get_with_retry(&url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ContentNotFound(content_id.to_string()));
        }
        if !status.is_success() {
            return Err(Error::SourceStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let envelope: ContentDetailResponse = serde_json::from_str(&body)?;
        match envelope {
            ContentDetailResponse { ok: true, data: Some(detail) } => Ok(detail),
            _ => Err(Error::ContentNotFound(content_id.to_string())),
        }
    }

    async fn resolve(&self, content_id: &str) -> Result<ResolvedSource> {
        let detail = self.fetch_detail(content_id).await?;
        let resolved = ResolvedSource::from_detail(&detail, &self.api_base);
        debug!(
            content_id,
            status = %resolved.status,
            ready = resolved.ready,
            "Resolved content"
        );
        Ok(resolved)
    }
}

/// Poll until the content is ready or has failed. Errors from the resolver
/// end the wait; they are not retried here.
pub async fn wait_until_ready(
    resolver: &dyn SourceResolver,
    content_id: &str,
    interval: Duration,
) -> Result<ResolvedSource> {
    loop {
        let resolved = resolver.resolve(content_id).await?;
        if resolved.is_settled() {
            info!(content_id, status = %resolved.status, ready = resolved.ready, "Content settled");
            return Ok(resolved);
        }
        debug!(content_id, status = %resolved.status, "Content still processing");
        tokio::time::sleep(interval).await;
    }
}

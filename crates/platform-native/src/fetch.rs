//! HTTP and local-file fetching.

use std::path::PathBuf;
use std::time::Duration;

use lapse_common::config::HttpConfig;
use lapse_common::error::{LapseError, LapseResult};
use lapse_media_core::fetch::{
    AssetFetcher, Blob, Credentials, CrossOrigin, DirectImageLoader, FetchOptions, RequestMode,
};
use lapse_media_core::surface::DecodedImage;

use crate::decode::decode_with_hint;

/// Where a URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    Remote(String),
    Local(PathBuf),
}

impl Location {
    pub(crate) fn parse(url: &str) -> Self {
        if let Some(path) = url.strip_prefix("file://") {
            Self::Local(PathBuf::from(path))
        } else if url.contains("://") {
            Self::Remote(url.to_string())
        } else {
            Self::Local(PathBuf::from(url))
        }
    }
}

/// Fetcher backed by `reqwest`, with `file://` URLs and bare paths read from
/// disk.
///
/// The client keeps no cookie store, so requests never carry credentials.
/// There is no same-origin policy natively; the request mode is accepted
/// and ignored.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch_remote(&self, url: &str) -> LapseResult<Blob> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LapseError::fetch(url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LapseError::fetch(url, format!("HTTP {status}")));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| LapseError::fetch(url, e.to_string()))?;
        tracing::debug!(url, bytes = bytes.len(), ?content_type, "Fetched remote resource");
        Ok(Blob::new(bytes.to_vec(), content_type))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&HttpConfig::default())
    }
}

#[async_trait::async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: FetchOptions) -> LapseResult<Blob> {
        if options.credentials == Credentials::Include {
            tracing::debug!(url, "Credentialed request sent without cookies");
        }
        match Location::parse(url) {
            Location::Remote(url) => self.fetch_remote(&url).await,
            Location::Local(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| LapseError::fetch(url, e.to_string()))?;
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read local resource");
                Ok(Blob::new(bytes, None))
            }
        }
    }
}

/// Direct image loading: fetch and decode in one go, trusting the URL's
/// extension when the bytes alone do not identify the format.
#[derive(Debug, Clone, Default)]
pub struct HttpImageLoader {
    fetcher: HttpFetcher,
}

impl HttpImageLoader {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl DirectImageLoader for HttpImageLoader {
    async fn load(&self, url: &str, cross_origin: CrossOrigin) -> LapseResult<DecodedImage> {
        let options = FetchOptions {
            mode: RequestMode::NoCors,
            credentials: match cross_origin {
                CrossOrigin::Anonymous => Credentials::Omit,
                CrossOrigin::UseCredentials => Credentials::Include,
            },
        };
        let blob = self.fetcher.fetch(url, options).await?;
        let hint = image::ImageFormat::from_path(url.split(['?', '#']).next().unwrap_or(url)).ok();
        tokio::task::spawn_blocking(move || decode_with_hint(blob.bytes(), hint))
            .await
            .map_err(|e| LapseError::decode(format!("Decode task failed: {e}")))?
    }
}

//! HTTP implementation of `PagedSource` on top of `reqwest`.

use super::{Page, PagedSource};
use crate::error::{Result, SyncError};
use reqwest::{Client, Url};
use std::time::Duration;

/// Paginated listing served over HTTP as `GET <url>?page=N`.
///
/// Each request carries its own timeout, independent of (and shorter than)
/// the sync lock's ttl, so a hung connection cannot hold the lock forever.
#[derive(Debug, Clone)]
pub struct HttpPagedSource {
    client: Client,
    url: Url,
}

impl HttpPagedSource {
    pub fn new(url: &str, request_timeout: Duration, user_agent: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| SyncError::UserError(format!("invalid source URL '{}': {}", url, e)))?;

        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SyncError::UserError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PagedSource for HttpPagedSource {
    async fn fetch_page(&self, page: u64) -> Result<Page> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| {
                SyncError::RemoteFetch(format!("request for page {} failed: {}", page, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SyncError::RemoteFetch(format!(
                "page {} returned HTTP {}: {}",
                page, status, snippet
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            SyncError::RemoteFetch(format!("failed to read page {} body: {}", page, e))
        })?;

        Page::from_slice(&bytes)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

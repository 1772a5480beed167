//! Streaming fetch-and-publish of a paginated listing.
//!
//! Pages are requested in order and each accepted entry is appended to the
//! staging file as soon as its page arrives, so memory stays flat no matter
//! how large the listing is. The published file has the shape
//!
//! ```text
//! {"version":1,"entries":[<release>,...],"lastUpdated":"<RFC3339>"}
//! ```

use super::SNAPSHOT_VERSION;
use super::validate;
use crate::config::DatasetConfig;
use crate::error::{Result, SyncError};
use crate::fs::StagedFile;
use crate::source::PagedSource;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

/// Tuning for one fetch-and-publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Pause between page requests.
    pub page_delay: Duration,

    /// Entries whose hash contains this token are skipped.
    pub placeholder_token: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(500),
            placeholder_token: "REDACTED".to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn for_dataset(dataset: &DatasetConfig) -> Self {
        Self {
            page_delay: dataset.page_delay(),
            placeholder_token: dataset.placeholder_token.clone(),
        }
    }
}

/// Summary of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub pages: u64,
    pub accepted: u64,
    pub skipped: u64,
    pub bytes: u64,
    pub last_updated: DateTime<Utc>,
}

impl std::fmt::Display for PublishReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pages, {} accepted, {} skipped, {} bytes, lastUpdated {}",
            self.pages,
            self.accepted,
            self.skipped,
            self.bytes,
            self.last_updated.to_rfc3339()
        )
    }
}

#[derive(Debug, Default)]
struct Counts {
    pages: u64,
    accepted: u64,
    skipped: u64,
}

/// Fetch every page from `source` and atomically publish the result at
/// `target`.
///
/// On any failure the staging file is removed and `target` keeps its
/// previous content.
pub async fn fetch_and_publish<S: PagedSource>(
    source: &S,
    target: &Path,
    options: &PipelineOptions,
) -> Result<PublishReport> {
    let mut staged = StagedFile::create(target).await?;

    let streamed = stream_pages(source, &mut staged, options).await;
    let (counts, last_updated) = match streamed {
        Ok(done) => done,
        Err(e) => {
            tracing::warn!(
                source = %source.describe(),
                error = %e,
                "fetch failed, discarding staging file"
            );
            staged.discard().await;
            return Err(e);
        }
    };

    let bytes = staged.publish().await?;

    Ok(PublishReport {
        pages: counts.pages,
        accepted: counts.accepted,
        skipped: counts.skipped,
        bytes,
        last_updated,
    })
}

async fn stream_pages<S: PagedSource>(
    source: &S,
    staged: &mut StagedFile,
    options: &PipelineOptions,
) -> Result<(Counts, DateTime<Utc>)> {
    let mut counts = Counts::default();

    staged
        .write_all(format!("{{\"version\":{},\"entries\":[", SNAPSHOT_VERSION).as_bytes())
        .await?;

    let mut page_no = 1u64;
    loop {
        let page = source.fetch_page(page_no).await?;
        counts.pages += 1;

        for item in &page.items {
            match validate::classify(item, &options.placeholder_token) {
                Ok(release) => {
                    let mut encoded = Vec::with_capacity(128);
                    if counts.accepted > 0 {
                        encoded.push(b',');
                    }
                    serde_json::to_writer(&mut encoded, &release).map_err(|e| {
                        SyncError::Persistence(format!("failed to encode release: {}", e))
                    })?;
                    staged.write_all(&encoded).await?;
                    counts.accepted += 1;
                }
                Err(reason) => {
                    tracing::debug!(page = page_no, %reason, "skipping entry");
                    counts.skipped += 1;
                }
            }
        }

        tracing::debug!(
            page = page_no,
            total_pages = page.total_pages,
            accepted = counts.accepted,
            "page streamed"
        );

        if page_no >= page.total_pages {
            break;
        }
        page_no += 1;
        if !options.page_delay.is_zero() {
            tokio::time::sleep(options.page_delay).await;
        }
    }

    let last_updated = Utc::now();
    let stamp = serde_json::to_string(&last_updated)
        .map_err(|e| SyncError::Persistence(format!("failed to encode timestamp: {}", e)))?;
    staged
        .write_all(format!("],\"lastUpdated\":{}}}", stamp).as_bytes())
        .await?;

    Ok((counts, last_updated))
}

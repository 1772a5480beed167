use crate::error::{Result, SyncError};
use crate::source::{Page, PagedSource};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted paged source. Records every requested page number.
pub(crate) struct MockSource {
    pages: HashMap<u64, Page>,
    failures: HashMap<u64, SyncError>,
    requested: Mutex<Vec<u64>>,
}

impl MockSource {
    /// A source serving `pages` as pages 1..=n.
    pub(crate) fn new(pages: Vec<Page>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, page)| (i as u64 + 1, page))
                .collect(),
            failures: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Fail requests for `page` with `error`.
    pub(crate) fn failing_on(mut self, page: u64, error: SyncError) -> Self {
        self.failures.insert(page, error);
        self
    }

    pub(crate) fn requested(&self) -> Vec<u64> {
        self.requested
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl PagedSource for MockSource {
    async fn fetch_page(&self, page: u64) -> Result<Page> {
        self.requested
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(page);

        if let Some(err) = self.failures.get(&page) {
            return Err(err.clone());
        }
        self.pages
            .get(&page)
            .cloned()
            .ok_or_else(|| SyncError::RemoteFetch(format!("no scripted page {}", page)))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Build a page document.
pub(crate) fn page(page: u64, total_pages: u64, items: Vec<Value>) -> Page {
    Page {
        page,
        total_pages,
        items,
    }
}

/// A listing entry that passes validation.
pub(crate) fn release_item(group: &str, hash: &str) -> Value {
    json!({
        "groupId": group,
        "hash": hash,
        "title": format!("{} {}", group, hash),
        "size": 1024,
        "preferred": true
    })
}

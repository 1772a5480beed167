//! Remote paginated listing sources.
//!
//! A source answers `fetch_page(n)` with a `{ page, totalPages, items[] }`
//! document. A missing or mistyped `page`/`totalPages` is a hard
//! `RemoteFetch` failure; item contents are left to the consumer to validate.

mod http;

pub use http::HttpPagedSource;

use crate::error::{Result, SyncError};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page: u64,
    pub total_pages: u64,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl Page {
    /// Decode a page, enforcing the listing schema.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| SyncError::RemoteFetch(format!("malformed page payload: {}", e)))
    }

    /// Decode a page from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| SyncError::RemoteFetch(format!("malformed page payload: {}", e)))
    }
}

/// A remote paginated listing. Pages are numbered from 1.
pub trait PagedSource: Send + Sync {
    /// Fetch page `page`.
    fn fetch_page(&self, page: u64) -> impl Future<Output = Result<Page>> + Send;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_well_formed_page() {
        let page = Page::from_value(json!({
            "page": 2,
            "totalPages": 3,
            "items": [{"hash": "abc"}]
        }))
        .unwrap();

        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_missing_items_is_an_empty_page() {
        let page = Page::from_value(json!({"page": 1, "totalPages": 1})).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_missing_total_pages_is_a_fetch_error() {
        let err = Page::from_value(json!({"page": 1, "items": []})).unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));
    }

    #[test]
    fn test_mistyped_page_is_a_fetch_error() {
        let err = Page::from_value(json!({"page": "1", "totalPages": 2})).unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));

        let err = Page::from_slice(br#"{"page": 1, "totalPages": -4}"#).unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));
    }

    #[test]
    fn test_non_json_body_is_a_fetch_error() {
        let err = Page::from_slice(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, SyncError::RemoteFetch(_)));
    }
}

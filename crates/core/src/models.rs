use crate::error::{ErrorInfo, SearchError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A raw engine hit, returned to callers as-is.
pub type Document = Value;

pub const DEFAULT_SEARCH_PATH: &str = "_search";

/// Per-call query options. Anything left unset falls back to the client
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    pub path: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub scroll: bool,
    #[serde(alias = "cursor")]
    pub scroll_id: Option<String>,
    pub scroll_ttl: Option<String>,
    pub scroll_trigger: Option<u64>,
    /// Extra URL query parameters passed through untouched.
    pub params: BTreeMap<String, String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_SEARCH_PATH.to_string(),
            page: None,
            per_page: None,
            scroll: false,
            scroll_id: None,
            scroll_ttl: None,
            scroll_trigger: None,
            params: BTreeMap::new(),
        }
    }
}

impl QueryOptions {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn scroll(mut self) -> Self {
        self.scroll = true;
        self
    }

    pub fn continue_from(mut self, scroll_id: impl Into<String>) -> Self {
        self.scroll = true;
        self.scroll_id = Some(scroll_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.path.trim().is_empty() {
            return Err(SearchError::Configuration("path must not be empty".to_string()));
        }
        if self.page == Some(0) {
            return Err(SearchError::Configuration("page numbers start at 1".to_string()));
        }
        if self.per_page == Some(0) {
            return Err(SearchError::Configuration("per_page must be positive".to_string()));
        }
        if self.scroll_id.as_deref().is_some_and(str::is_empty) {
            return Err(SearchError::Configuration(
                "empty cursor: the scroll is exhausted, start a new query".to_string(),
            ));
        }
        if self.scroll && self.scroll_id.is_none() && self.page.is_some_and(|page| page > 1) {
            return Err(SearchError::Configuration(
                "scroll=true cannot start at a page other than 1".to_string(),
            ));
        }
        for reserved in ["from", "size", "scroll"] {
            if self.params.contains_key(reserved) {
                return Err(SearchError::Configuration(format!(
                    "query parameter {reserved} is managed by pagination"
                )));
            }
        }
        Ok(())
    }
}

/// A fully resolved request: options merged with configuration defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub body: Value,
    pub path: String,
    pub page: u32,
    pub per_page: u32,
    pub scroll: bool,
    pub scroll_id: Option<String>,
    pub scroll_ttl: String,
    pub scroll_trigger: u64,
    pub params: BTreeMap<String, String>,
}

impl SearchRequest {
    pub fn is_continuation(&self) -> bool {
        self.scroll_id.is_some()
    }

    pub fn requests_aggregations(&self) -> bool {
        self.body
            .as_object()
            .is_some_and(|body| body.contains_key("aggs") || body.contains_key("aggregations"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub count: u64,
    pub per_page: u32,
    pub page: u32,
    pub pages: u64,
    pub cursor: Option<String>,
}

impl Pagination {
    /// `Some("")` means scrolling is active but nothing is left to fetch.
    pub fn has_more(&self) -> bool {
        self.cursor.as_deref().is_some_and(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub ok: bool,
    pub rows: Vec<Document>,
    pub pagination: Pagination,
    /// Wall-clock seconds spent on the primary call.
    pub timing: f64,
    pub error: Option<ErrorInfo>,
}

impl SearchResponse {
    pub fn failed(error: ErrorInfo, timing: f64) -> Self {
        Self {
            ok: false,
            rows: Vec::new(),
            pagination: Pagination::default(),
            timing,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexAction {
    pub id: String,
    pub index: String,
    #[serde(default)]
    pub doc_type: String,
    pub body: Value,
}

impl IndexAction {
    pub fn new(
        id: impl Into<String>,
        index: impl Into<String>,
        doc_type: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            id: id.into(),
            index: index.into(),
            doc_type: doc_type.into(),
            body,
        }
    }

    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef {
            id: self.id.clone(),
            index: self.index.clone(),
            doc_type: self.doc_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub index: String,
    #[serde(default)]
    pub doc_type: String,
}

impl DocumentRef {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.id.trim().is_empty() {
            return Err(SearchError::Configuration("document is missing an id".to_string()));
        }
        if self.index.trim().is_empty() {
            return Err(SearchError::Configuration(format!(
                "document {} is missing an index",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkOptions {
    pub batch_size: usize,
    pub strict: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BULK_BATCH_SIZE,
            strict: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchFailure {
    /// 1-based position of the batch in the input.
    pub batch: usize,
    pub documents: usize,
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkResult {
    pub ok: bool,
    pub succeeded_batches: Vec<usize>,
    pub failed_batches: Vec<BatchFailure>,
    pub not_attempted_batches: Vec<usize>,
    pub documents_indexed: usize,
    pub documents_not_attempted: usize,
    /// Item-level rejections reported inside otherwise delivered batches.
    pub item_errors: usize,
}

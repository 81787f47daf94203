use crate::events::{ClientEvent, TracingEventSink};
use crate::models::{Document, QueryOptions, SearchRequest, SearchResponse};
use crate::normalize::{classify, normalize, NormalizeContext};
use crate::pagination::{self, PagePlan};
use crate::retry::RetryPolicy;
use crate::traits::{EventSink, Transport};
use crate::transport::{endpoint_url, TransportResponse, JSON_CONTENT_TYPE};
use crate::{ClientConfig, SearchError};
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs search calls against one engine. Holds no per-query state, so one
/// executor can serve concurrent callers.
pub struct QueryExecutor<T: Transport> {
    transport: T,
    config: ClientConfig,
    retry: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl<T: Transport> QueryExecutor<T> {
    pub fn new(transport: T, config: ClientConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            transport,
            retry: RetryPolicy::from_config(&config.retry),
            config,
            sink: Arc::new(TracingEventSink),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Merges per-call options over configuration defaults.
    pub fn resolve(&self, body: Value, options: QueryOptions) -> Result<SearchRequest, SearchError> {
        options.validate()?;
        let scroll = options.scroll || options.scroll_id.is_some();

        Ok(SearchRequest {
            body,
            path: options.path,
            page: options.page.unwrap_or(1),
            per_page: self.config.effective_per_page(options.per_page),
            scroll,
            scroll_id: options.scroll_id,
            scroll_ttl: options
                .scroll_ttl
                .unwrap_or_else(|| self.config.scroll_ttl.clone()),
            scroll_trigger: options.scroll_trigger.unwrap_or(self.config.scroll_trigger),
            params: options.params,
        })
    }

    /// One search call, plus a count probe when a scroll is being started.
    /// Only configuration problems come back as `Err`; engine and transport
    /// failures are reported in `SearchResponse::error`.
    pub async fn query(&self, body: Value, options: QueryOptions) -> Result<SearchResponse, SearchError> {
        let request = self.resolve(body, options)?;

        let mut plan = pagination::plan(&request);
        if let PagePlan::Probe { trigger } = plan {
            let total = self.probe_total(&request).await?;
            plan = pagination::resolve_probe(&request, total);
            debug!(?total, trigger, scrolling = plan.is_scrolling(), "count probe resolved");
        }

        let (url, payload) = self.call_for(&request, &plan)?;
        let policy = if request.is_continuation() {
            self.retry.single_attempt()
        } else {
            self.retry.clone()
        };

        let started = Instant::now();
        let outcome = policy
            .send("search", self.sink.as_ref(), || {
                self.transport.post(&url, payload.clone(), JSON_CONTENT_TYPE)
            })
            .await;
        let elapsed = started.elapsed();
        self.check_slow_query(elapsed, &request.body);

        let context = NormalizeContext {
            per_page: request.per_page,
            page: request.page,
            scrolling: plan.is_scrolling(),
            continuation: request.is_continuation(),
            timing: elapsed.as_secs_f64(),
        };

        let response = match outcome {
            Ok(raw) => normalize(&raw, &context),
            Err(SearchError::Engine { status, body }) => {
                normalize(&TransportResponse { status, body }, &context)
            }
            Err(error) if error.is_configuration() => return Err(error),
            Err(error) => SearchResponse::failed(error.to_info(), context.timing),
        };

        if let Some(error) = &response.error {
            self.sink.record(&ClientEvent::error("search", error.clone()));
        }

        Ok(response)
    }

    /// The single hit of a uniqueness-expected lookup. `None` when nothing
    /// matched and also when several documents did.
    pub async fn query_single(&self, body: Value) -> Result<Option<Document>, SearchError> {
        let response = self.query(body, QueryOptions::default()).await?;
        let mut rows = response.rows;

        match rows.len() {
            1 => Ok(rows.pop()),
            0 => Ok(None),
            count => {
                warn!(count, "query_single matched more than one document");
                Ok(None)
            }
        }
    }

    pub async fn query_count(&self, query_clause: Value) -> Result<u64, SearchError> {
        let response = self
            .query(json!({ "query": query_clause }), QueryOptions::default().per_page(1))
            .await?;

        match response.error {
            Some(error) => Err(SearchError::from_info(error)),
            None => Ok(response.pagination.total),
        }
    }

    /// Every matching document, fetched page by page. Starts a scroll and
    /// follows the returned cursor; when the result set is too small to
    /// scroll, or a page comes back without a cursor, it walks offset pages
    /// instead. Stops on an empty page or an empty cursor. Not restartable:
    /// a new call issues a fresh query.
    pub fn query_all(
        &self,
        query_clause: Value,
        per_page: Option<u32>,
    ) -> impl Stream<Item = Result<Document, SearchError>> + '_ {
        let body = json!({ "query": query_clause });
        let first = QueryOptions {
            per_page,
            ..QueryOptions::default()
        }
        .scroll();

        let cursor = ScrollCursor {
            next: Some(first),
            fetched: 0,
        };

        stream::try_unfold(cursor, move |cursor| self.next_page(body.clone(), cursor, per_page))
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<Document, SearchError>)))
            .try_flatten()
    }

    async fn next_page(
        &self,
        body: Value,
        cursor: ScrollCursor,
        per_page: Option<u32>,
    ) -> Result<Option<(Vec<Document>, ScrollCursor)>, SearchError> {
        let Some(options) = cursor.next else {
            return Ok(None);
        };
        let page = options.page.unwrap_or(1);

        let response = self.query(body, options).await?;
        if let Some(error) = response.error {
            return Err(SearchError::from_info(error));
        }

        let fetched = cursor.fetched + response.rows.len() as u64;
        let pagination = &response.pagination;
        let follow_up = QueryOptions {
            per_page,
            ..QueryOptions::default()
        };

        let exhausted = response.rows.is_empty()
            || fetched >= pagination.total
            || pagination.cursor.as_deref() == Some("");

        let next = if exhausted {
            None
        } else if pagination.has_more() {
            pagination
                .cursor
                .as_deref()
                .map(|scroll_id| follow_up.continue_from(scroll_id).page(page + 1))
        } else if u64::from(page) < pagination.pages {
            Some(follow_up.page(page + 1))
        } else {
            None
        };

        Ok(Some((response.rows, ScrollCursor { next, fetched })))
    }

    /// `None` when the probe fails; the caller then pages by offset.
    async fn probe_total(&self, request: &SearchRequest) -> Result<Option<u64>, SearchError> {
        let probe = PagePlan::Probe {
            trigger: request.scroll_trigger,
        };
        let (url, payload) = self.call_for(request, &probe)?;

        let outcome = self
            .retry
            .single_attempt()
            .send("count probe", self.sink.as_ref(), || {
                self.transport.post(&url, payload.clone(), JSON_CONTENT_TYPE)
            })
            .await;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(error) if error.is_configuration() => return Err(error),
            Err(error) => {
                warn!(error = %error, "count probe failed, falling back to offset pagination");
                return Ok(None);
            }
        };

        match classify(&raw, false) {
            Ok(page) => Ok(Some(page.total)),
            Err(error) => {
                warn!(error = %error, "count probe returned an error, falling back to offset pagination");
                Ok(None)
            }
        }
    }

    fn call_for(&self, request: &SearchRequest, plan: &PagePlan) -> Result<(String, String), SearchError> {
        let base = self.config.base_url();

        if let PagePlan::ScrollContinue { ttl, scroll_id } = plan {
            let url = endpoint_url(&base, [request.path.as_str(), "scroll"], Vec::new())?;
            let payload = json!({ "scroll": ttl, "scroll_id": scroll_id });
            return Ok((url, payload.to_string()));
        }

        let mut params = plan.query_params();
        params.extend(
            request
                .params
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        );
        let index = self.config.index.as_deref().unwrap_or_default();
        let url = endpoint_url(&base, [index, request.path.as_str()], params)?;
        let payload = serde_json::to_string(&request.body)?;
        Ok((url, payload))
    }

    fn check_slow_query(&self, elapsed: Duration, body: &Value) {
        let Some(threshold) = self.config.slow_query_threshold() else {
            return;
        };
        if elapsed > threshold {
            self.sink.record(&ClientEvent::slow_query(
                elapsed.as_secs_f64(),
                format!("{}:{}", self.config.host, self.config.port),
                self.config.index.clone(),
                body,
            ));
        }
    }
}

struct ScrollCursor {
    next: Option<QueryOptions>,
    fetched: u64,
}

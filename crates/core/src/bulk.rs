use crate::events::{ClientEvent, TracingEventSink};
use crate::models::{BatchFailure, BulkOptions, BulkResult, DocumentRef, IndexAction};
use crate::retry::RetryPolicy;
use crate::traits::{EventSink, Transport};
use crate::transport::{document_url, endpoint_url, JSON_CONTENT_TYPE, NDJSON_CONTENT_TYPE};
use crate::{ClientConfig, SearchError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Writes documents through the bulk endpoint in fixed-size batches.
pub struct BulkIndexer<T: Transport> {
    transport: T,
    config: ClientConfig,
    retry: RetryPolicy,
    sink: Arc<dyn EventSink>,
}

impl<T: Transport> BulkIndexer<T> {
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

    /// Batch size and strictness from the client configuration.
    pub fn default_options(&self) -> BulkOptions {
        BulkOptions {
            batch_size: self.config.bulk_batch_size,
            strict: self.config.strict,
        }
    }

    /// Sends `documents` in batches of `options.batch_size`, the last one
    /// possibly short. Under `strict` the first batch that still fails after
    /// retries stops the run and everything after it is reported as not
    /// attempted; otherwise the failure is recorded and the run continues.
    ///
    /// Every document is checked for an id and index before the first batch
    /// goes out; a missing one is a configuration error and nothing is sent.
    pub async fn index_many<I>(&self, documents: I, options: BulkOptions) -> Result<BulkResult, SearchError>
    where
        I: IntoIterator<Item = IndexAction>,
    {
        if options.batch_size == 0 {
            return Err(SearchError::Configuration("batch_size must be positive".to_string()));
        }

        let documents: Vec<IndexAction> = documents.into_iter().collect();
        for (position, action) in documents.iter().enumerate() {
            action.document_ref().validate().inspect_err(|error| {
                warn!(document = position + 1, error = %error, "bulk run rejected before sending");
            })?;
        }

        let url = endpoint_url(&self.config.base_url(), ["_bulk"], Vec::new())?;
        let batches: Vec<&[IndexAction]> = documents.chunks(options.batch_size).collect();
        let mut result = BulkResult::default();

        for (offset, batch) in batches.iter().enumerate() {
            let position = offset + 1;
            let delivered = self.send_batch(&url, position, batch, &mut result).await?;

            if !delivered && options.strict {
                let remaining = &batches[position..];
                result.not_attempted_batches = (position + 1..=batches.len()).collect();
                result.documents_not_attempted = remaining.iter().map(|batch| batch.len()).sum();
                warn!(
                    batch = position,
                    not_attempted = result.documents_not_attempted,
                    "strict bulk run stopped at a failed batch"
                );
                return Ok(result);
            }
        }

        result.ok = !options.strict || result.failed_batches.is_empty();
        info!(
            batches = batches.len(),
            failed = result.failed_batches.len(),
            documents_indexed = result.documents_indexed,
            item_errors = result.item_errors,
            "bulk indexing finished"
        );
        Ok(result)
    }

    /// Single-document write with the same retry budget as a batch. Returns
    /// `false` once retries are exhausted.
    pub async fn index_one(&self, action: &IndexAction) -> Result<bool, SearchError> {
        let reference = action.document_ref();
        reference.validate()?;

        let url = document_url(
            &self.config.base_url(),
            &reference.index,
            &reference.doc_type,
            &reference.id,
        )?;
        let payload = serde_json::to_string(&action.body)?;

        let outcome = self
            .retry
            .send("index", self.sink.as_ref(), || {
                self.transport.post(&url, payload.clone(), JSON_CONTENT_TYPE)
            })
            .await;

        match outcome {
            Ok(_) => Ok(true),
            Err(failure) if failure.is_configuration() => Err(failure),
            Err(failure) => {
                error!(id = %reference.id, index = %reference.index, error = %failure, "index failed");
                self.sink.record(&ClientEvent::error("index", failure.to_info()));
                Ok(false)
            }
        }
    }

    /// One delete attempt, no retries. Failures are logged and reported as
    /// `false`.
    pub async fn delete_one(&self, reference: &DocumentRef) -> Result<bool, SearchError> {
        reference.validate()?;
        let url = document_url(
            &self.config.base_url(),
            &reference.index,
            &reference.doc_type,
            &reference.id,
        )?;

        match self.transport.delete(&url).await {
            Ok(response) if self.retry.accepts(response.status) => Ok(true),
            Ok(response) => {
                warn!(id = %reference.id, status = response.status, "delete rejected");
                Ok(false)
            }
            Err(failure) if failure.is_configuration() => Err(failure),
            Err(failure) => {
                warn!(id = %reference.id, error = %failure, "delete failed");
                self.sink.record(&ClientEvent::error("delete", failure.to_info()));
                Ok(false)
            }
        }
    }

    async fn send_batch(
        &self,
        url: &str,
        position: usize,
        batch: &[IndexAction],
        result: &mut BulkResult,
    ) -> Result<bool, SearchError> {
        let payload = serialize_batch(batch)?;
        debug!(
            batch = position,
            documents = batch.len(),
            bytes = payload.len(),
            max_attempts = self.retry.max_attempts(),
            "sending bulk batch"
        );

        let outcome = self
            .retry
            .send("bulk", self.sink.as_ref(), || {
                self.transport.post(url, payload.clone(), NDJSON_CONTENT_TYPE)
            })
            .await;

        match outcome {
            Ok(response) => {
                let rejected = count_item_errors(&response.body);
                if rejected > 0 {
                    warn!(batch = position, rejected, "bulk batch delivered with item errors");
                }
                result.succeeded_batches.push(position);
                result.documents_indexed += batch.len();
                result.item_errors += rejected;
                Ok(true)
            }
            Err(failure) if failure.is_configuration() => Err(failure),
            Err(failure) => {
                error!(batch = position, documents = batch.len(), error = %failure, "bulk batch failed");
                let info = failure.to_info();
                self.sink.record(&ClientEvent::error("bulk", info.clone()));
                result.failed_batches.push(BatchFailure {
                    batch: position,
                    documents: batch.len(),
                    error: info,
                });
                Ok(false)
            }
        }
    }
}

/// Alternating action and source lines, newline-terminated.
pub fn serialize_batch(actions: &[IndexAction]) -> Result<String, SearchError> {
    let mut lines = Vec::with_capacity(actions.len() * 2);

    for action in actions {
        let mut header = json!({
            "_index": action.index,
            "_id": action.id,
        });
        if !action.doc_type.is_empty() {
            header["_type"] = json!(action.doc_type);
        }
        lines.push(json!({ "index": header }).to_string());
        lines.push(serde_json::to_string(&action.body)?);
    }

    Ok(lines.join("\n") + "\n")
}

fn count_item_errors(body: &str) -> usize {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return 0;
    };
    if parsed.get("errors").and_then(Value::as_bool) != Some(true) {
        return 0;
    }

    parsed
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter(|item| item.values().any(|outcome| outcome.get("error").is_some()))
                .count()
        })
        .unwrap_or_default()
}

//! Maps raw engine responses onto `SearchResponse`, independent of which
//! engine version produced them.

use crate::error::{ErrorInfo, ErrorKind, SearchError};
use crate::models::{Document, SearchResponse};
use crate::pagination::compute_pagination;
use crate::transport::TransportResponse;
use serde_json::Value;
use tracing::warn;

pub const UNKNOWN_ENGINE_ERROR: &str = "unknown engine error";

/// What the caller asked for, needed to compute pagination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeContext {
    pub per_page: u32,
    pub page: u32,
    pub scrolling: bool,
    pub continuation: bool,
    pub timing: f64,
}

/// One page of hits pulled out of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct HitPage {
    pub rows: Vec<Document>,
    pub total: u64,
    pub scroll_id: Option<String>,
}

pub fn normalize(raw: &TransportResponse, context: &NormalizeContext) -> SearchResponse {
    match classify(raw, context.continuation) {
        Ok(page) => {
            let count = page.rows.len() as u64;
            if context.scrolling && page.scroll_id.is_none() && count > 0 {
                warn!(total = page.total, "scroll response carried no _scroll_id, no cursor returned");
            }
            let pagination = compute_pagination(
                page.total,
                count,
                context.per_page,
                context.page,
                context.scrolling,
                page.scroll_id.as_deref(),
            );
            SearchResponse {
                ok: true,
                rows: page.rows,
                pagination,
                timing: context.timing,
                error: None,
            }
        }
        Err(error) => SearchResponse::failed(error.to_info(), context.timing),
    }
}

/// Splits a raw response into hits or a terminal error.
pub fn classify(raw: &TransportResponse, continuation: bool) -> Result<HitPage, SearchError> {
    let body: Value = match serde_json::from_str(&raw.body) {
        Ok(body) => body,
        Err(error) if is_success(raw.status) => {
            warn!(status = raw.status, error = %error, "response body is not json");
            return Err(SearchError::MalformedResponse(format!(
                "{} response is not json: {error}",
                raw.status
            )));
        }
        Err(_) => Value::Null,
    };

    if let Some(status) = error_status(raw.status, &body) {
        let reason = root_cause(&body);
        if status == 404 && continuation {
            return Err(SearchError::ExpiredCursor { reason });
        }
        return Err(SearchError::Failed(ErrorInfo::new(
            ErrorKind::Engine,
            Some(status),
            reason,
        )));
    }

    let rows = extract_rows(&body);
    let total = total_hits(&body).unwrap_or_else(|| {
        if !rows.is_empty() {
            warn!("response carried no hits.total, using row count");
        }
        rows.len() as u64
    });
    let scroll_id = body
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(HitPage {
        rows,
        total,
        scroll_id,
    })
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn error_status(status: u16, body: &Value) -> Option<u16> {
    if !is_success(status) {
        return Some(status);
    }
    if body.get("error").is_some() {
        let embedded = body
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok());
        return Some(embedded.unwrap_or(500));
    }
    None
}

/// `hits.total` is a bare number on older engines and `{value, relation}` on
/// newer ones.
pub fn total_hits(body: &Value) -> Option<u64> {
    let total = body.pointer("/hits/total")?;
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
}

fn extract_rows(body: &Value) -> Vec<Document> {
    match body.pointer("/hits/hits") {
        Some(Value::Array(hits)) => hits.clone(),
        Some(other) => {
            warn!(found = %kind_of(other), "hits.hits is not an array");
            Vec::new()
        }
        None => {
            warn!("response has no hits.hits");
            Vec::new()
        }
    }
}

/// Best effort: the first root cause, then the top-level reason, then a
/// generic marker.
pub fn root_cause(body: &Value) -> String {
    let error = match body.get("error") {
        Some(error) => error,
        None => {
            warn!("error response has no error envelope");
            return UNKNOWN_ENGINE_ERROR.to_string();
        }
    };

    if let Some(text) = error.as_str() {
        return text.to_string();
    }

    let cause = error
        .pointer("/root_cause/0")
        .filter(|cause| cause.get("reason").is_some())
        .unwrap_or(error);

    match (
        cause.get("type").and_then(Value::as_str),
        cause.get("reason").and_then(Value::as_str),
    ) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (None, Some(reason)) => reason.to_string(),
        (Some(kind), None) => kind.to_string(),
        (None, None) => {
            warn!("error envelope has no reason");
            UNKNOWN_ENGINE_ERROR.to_string()
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> NormalizeContext {
        NormalizeContext {
            per_page: 20,
            page: 1,
            scrolling: false,
            continuation: false,
            timing: 0.25,
        }
    }

    fn raw(status: u16, body: Value) -> TransportResponse {
        TransportResponse::new(status, body.to_string())
    }

    #[test]
    fn legacy_integer_totals() {
        let response = normalize(
            &raw(200, json!({"hits": {"total": 101, "hits": [{"_id": "1"}, {"_id": "2"}]}})),
            &context(),
        );
        assert!(response.ok);
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.pagination.total, 101);
        assert_eq!(response.pagination.count, 2);
        assert_eq!(response.pagination.pages, 6);
        assert_eq!(response.timing, 0.25);
    }

    #[test]
    fn object_totals() {
        let body = json!({"hits": {"total": {"value": 7, "relation": "eq"}, "hits": []}});
        let response = normalize(&raw(200, body), &context());
        assert_eq!(response.pagination.total, 7);
        assert_eq!(response.pagination.pages, 1);
    }

    #[test]
    fn expired_cursor_normalizes_to_empty_failure() {
        let body = json!({
            "error": {
                "root_cause": [{
                    "type": "search_context_missing_exception",
                    "reason": "No search context found for id [42]"
                }],
                "type": "search_phase_execution_exception",
                "reason": "all shards failed"
            },
            "status": 404
        });
        let response = normalize(
            &raw(404, body),
            &NormalizeContext {
                scrolling: true,
                continuation: true,
                ..context()
            },
        );
        assert!(!response.ok);
        assert!(response.rows.is_empty());
        assert_eq!(response.pagination, Default::default());
        let error = response.error.expect("error info");
        assert_eq!(error.kind, ErrorKind::ExpiredCursor);
        assert_eq!(
            error.reason,
            "search_context_missing_exception: No search context found for id [42]"
        );
    }

    #[test]
    fn error_without_envelope_uses_generic_marker() {
        let response = normalize(&TransportResponse::new(404, "Not Found"), &context());
        assert!(!response.ok);
        let error = response.error.expect("error info");
        assert_eq!(error.kind, ErrorKind::Engine);
        assert_eq!(error.reason, UNKNOWN_ENGINE_ERROR);
    }

    #[test]
    fn embedded_error_status_on_success_code() {
        let body = json!({"error": "index_not_found_exception", "status": 404});
        let response = normalize(&raw(200, body), &context());
        assert!(!response.ok);
        assert_eq!(response.error.and_then(|error| error.status), Some(404));
    }

    #[test]
    fn unexpected_shape_degrades_to_empty_rows() {
        let response = normalize(&raw(200, json!({"took": 3, "hits": {"hits": "nope"}})), &context());
        assert!(response.ok);
        assert!(response.rows.is_empty());
        assert_eq!(response.pagination.total, 0);
    }

    #[test]
    fn non_json_success_body_is_malformed() {
        let response = normalize(&TransportResponse::new(200, "<html>"), &context());
        assert!(!response.ok);
        assert_eq!(
            response.error.map(|error| error.kind),
            Some(ErrorKind::MalformedResponse)
        );
    }

    #[test]
    fn scroll_id_becomes_cursor_when_more_remain() {
        let body = json!({
            "_scroll_id": "DXF1ZXJ5",
            "hits": {"total": 50, "hits": [{"_id": "1"}]}
        });
        let response = normalize(
            &raw(200, body),
            &NormalizeContext {
                scrolling: true,
                ..context()
            },
        );
        assert_eq!(response.pagination.cursor.as_deref(), Some("DXF1ZXJ5"));
    }
}

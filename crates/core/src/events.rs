use crate::error::ErrorInfo;
use crate::traits::EventSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

const BODY_SUMMARY_CHARS: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    SlowQuery {
        at: DateTime<Utc>,
        duration_seconds: f64,
        host: String,
        index: Option<String>,
        body_summary: String,
    },
    Retry {
        at: DateTime<Utc>,
        operation: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    Error {
        at: DateTime<Utc>,
        operation: String,
        error: ErrorInfo,
    },
}

impl ClientEvent {
    pub fn slow_query(
        duration_seconds: f64,
        host: impl Into<String>,
        index: Option<String>,
        body: &Value,
    ) -> Self {
        ClientEvent::SlowQuery {
            at: Utc::now(),
            duration_seconds,
            host: host.into(),
            index,
            body_summary: summarize_body(body),
        }
    }

    pub fn retry(operation: &str, attempt: u32, max_attempts: u32, reason: impl Into<String>) -> Self {
        ClientEvent::Retry {
            at: Utc::now(),
            operation: operation.to_string(),
            attempt,
            max_attempts,
            reason: reason.into(),
        }
    }

    pub fn error(operation: &str, error: ErrorInfo) -> Self {
        ClientEvent::Error {
            at: Utc::now(),
            operation: operation.to_string(),
            error,
        }
    }
}

/// Compact JSON, cut to a fixed number of characters.
pub fn summarize_body(body: &Value) -> String {
    let compact = body.to_string();
    match compact.char_indices().nth(BODY_SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &compact[..cut]),
        None => compact,
    }
}

/// Default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &ClientEvent) {
        match event {
            ClientEvent::SlowQuery {
                duration_seconds,
                host,
                index,
                body_summary,
                ..
            } => warn!(
                duration_seconds,
                host = %host,
                index = index.as_deref().unwrap_or("-"),
                body = %body_summary,
                "slow query"
            ),
            ClientEvent::Retry {
                operation,
                attempt,
                max_attempts,
                reason,
                ..
            } => info!(
                operation = %operation,
                attempt,
                max_attempts,
                reason = %reason,
                "retrying request"
            ),
            ClientEvent::Error {
                operation, error: info, ..
            } => error!(operation = %operation, error = %info, "request failed"),
        }
    }
}

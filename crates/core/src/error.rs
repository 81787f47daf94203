use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("scroll cursor expired or unknown: {reason}")]
    ExpiredCursor { reason: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search failed: {0}")]
    Failed(ErrorInfo),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Transport(_) | SearchError::Http(_) => ErrorKind::Transport,
            SearchError::Engine { .. } => ErrorKind::Engine,
            SearchError::ExpiredCursor { .. } => ErrorKind::ExpiredCursor,
            SearchError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SearchError::Configuration(_) | SearchError::Url(_) | SearchError::Serialization(_) => {
                ErrorKind::Configuration
            }
            SearchError::Failed(info) => info.kind,
        }
    }

    /// Programming errors are raised to the caller; everything else is folded
    /// into result values.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::Engine { status, .. } => Some(*status),
            SearchError::ExpiredCursor { .. } => Some(404),
            SearchError::Http(error) => error.status().map(|status| status.as_u16()),
            SearchError::Failed(info) => info.status,
            _ => None,
        }
    }

    pub fn to_info(&self) -> ErrorInfo {
        let reason = match self {
            SearchError::Failed(info) => return info.clone(),
            SearchError::ExpiredCursor { reason } => reason.clone(),
            SearchError::MalformedResponse(detail) => detail.clone(),
            other => other.to_string(),
        };
        ErrorInfo {
            kind: self.kind(),
            status: self.status(),
            reason,
        }
    }

    /// Raises a normalized error again, keeping the variants callers match on.
    pub fn from_info(info: ErrorInfo) -> Self {
        match info.kind {
            ErrorKind::ExpiredCursor => SearchError::ExpiredCursor {
                reason: info.reason,
            },
            ErrorKind::MalformedResponse => SearchError::MalformedResponse(info.reason),
            _ => SearchError::Failed(info),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Engine,
    ExpiredCursor,
    MalformedResponse,
    Configuration,
}

/// Error carried inside normalized results instead of being raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub reason: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({status}): {}", self.kind, self.reason),
            None => write!(f, "{:?}: {}", self.kind, self.reason),
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_flagged() {
        let error = SearchError::Configuration("per_page must be positive".to_string());
        assert!(error.is_configuration());
        assert_eq!(error.to_info().kind, ErrorKind::Configuration);
    }

    #[test]
    fn engine_errors_keep_status() {
        let error = SearchError::Engine {
            status: 503,
            body: "{}".to_string(),
        };
        let info = error.to_info();
        assert_eq!(info.kind, ErrorKind::Engine);
        assert_eq!(info.status, Some(503));
        assert!(!error.is_configuration());
    }

    #[test]
    fn expired_cursor_reports_not_found_status() {
        let error = SearchError::ExpiredCursor {
            reason: "No search context found".to_string(),
        };
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.kind(), ErrorKind::ExpiredCursor);
        assert_eq!(error.to_info().reason, "No search context found");
    }

    #[test]
    fn normalized_errors_raise_back_to_their_variant() {
        let expired = SearchError::from_info(ErrorInfo::new(
            ErrorKind::ExpiredCursor,
            Some(404),
            "No search context found",
        ));
        assert!(matches!(expired, SearchError::ExpiredCursor { ref reason } if reason == "No search context found"));

        let malformed = SearchError::from_info(ErrorInfo::new(ErrorKind::MalformedResponse, None, "<html>"));
        assert!(matches!(malformed, SearchError::MalformedResponse(_)));

        let engine = SearchError::from_info(ErrorInfo::new(ErrorKind::Engine, Some(400), "bad query"));
        assert!(matches!(engine, SearchError::Failed(ref info) if info.status == Some(400)));
    }
}

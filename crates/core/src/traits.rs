use crate::events::ClientEvent;
use crate::transport::TransportResponse;
use crate::SearchError;
use async_trait::async_trait;
use std::sync::Arc;

/// HTTP collaborator. Implementations must be safe to share across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        body: String,
        content_type: &str,
    ) -> Result<TransportResponse, SearchError>;

    async fn delete(&self, url: &str) -> Result<TransportResponse, SearchError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn post(
        &self,
        url: &str,
        body: String,
        content_type: &str,
    ) -> Result<TransportResponse, SearchError> {
        (**self).post(url, body, content_type).await
    }

    async fn delete(&self, url: &str) -> Result<TransportResponse, SearchError> {
        (**self).delete(url).await
    }
}

/// Receives slow-query, retry and error events. Must not block.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &ClientEvent);
}

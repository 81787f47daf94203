use crate::traits::Transport;
use crate::{ClientConfig, SearchError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// reqwest-backed transport. The pooled client is shared between clones.
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, SearchError> {
        Self::new(config.timeout())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        body: String,
        content_type: &str,
    ) -> Result<TransportResponse, SearchError> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }

    async fn delete(&self, url: &str) -> Result<TransportResponse, SearchError> {
        let response = self.client.delete(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

/// `{base}/{segments...}?{params}`; empty segments are skipped.
pub fn endpoint_url<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
    params: impl IntoIterator<Item = (&'a str, String)>,
) -> Result<String, SearchError> {
    let mut url = Url::parse(base)?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| SearchError::Configuration(format!("{base} cannot be a base url")))?;
        path.pop_if_empty();
        for segment in segments {
            for part in segment.split('/').filter(|part| !part.is_empty()) {
                path.push(part);
            }
        }
    }

    let params: Vec<(&str, String)> = params.into_iter().collect();
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, &value);
        }
    }

    Ok(url.to_string())
}

/// `{base}/{index}/{doc_type}/{id}`; the id is pushed as one escaped segment.
pub fn document_url(base: &str, index: &str, doc_type: &str, id: &str) -> Result<String, SearchError> {
    let mut url = Url::parse(base)?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| SearchError::Configuration(format!("{base} cannot be a base url")))?;
        path.pop_if_empty();
        path.push(index);
        path.push(if doc_type.is_empty() { "_doc" } else { doc_type });
        path.push(id);
    }
    Ok(url.to_string())
}

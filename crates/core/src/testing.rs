use crate::events::ClientEvent;
use crate::traits::{EventSink, Transport};
use crate::transport::TransportResponse;
use crate::SearchError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub body: String,
}

impl RecordedCall {
    pub fn has_param(&self, pair: &str) -> bool {
        self.url
            .split_once('?')
            .is_some_and(|(_, query)| query.split('&').any(|item| item == pair))
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

type Responder = Box<dyn Fn(&RecordedCall) -> Result<TransportResponse, SearchError> + Send + Sync>;

/// Records every call and answers through a closure.
pub(crate) struct ScriptedTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responder: Responder,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&RecordedCall) -> Result<TransportResponse, SearchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn answer(&self, call: RecordedCall) -> Result<TransportResponse, SearchError> {
        let response = (self.responder)(&call);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        response
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        body: String,
        _content_type: &str,
    ) -> Result<TransportResponse, SearchError> {
        self.answer(RecordedCall {
            method: "POST",
            url: url.to_string(),
            body,
        })
    }

    async fn delete(&self, url: &str) -> Result<TransportResponse, SearchError> {
        self.answer(RecordedCall {
            method: "DELETE",
            url: url.to_string(),
            body: String::new(),
        })
    }
}

#[derive(Default)]
pub(crate) struct CollectingSink {
    events: Mutex<Vec<ClientEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: &ClientEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Buffers formatted `tracing` output for the current thread while the
/// returned guard is alive.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|buffer| String::from_utf8_lossy(&buffer).into_owned())
            .unwrap_or_default()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.extend_from_slice(bytes);
        }
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

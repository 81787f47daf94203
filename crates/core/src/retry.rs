use crate::config::RetryConfig;
use crate::events::ClientEvent;
use crate::traits::EventSink;
use crate::transport::TransportResponse;
use crate::SearchError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Fixed attempt count with a fixed pause between attempts. No jitter, no
/// backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    accepted_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, accepted_statuses: Vec<u16>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            accepted_statuses,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.delay(),
            config.accepted_statuses.clone(),
        )
    }

    /// Same acceptance rule, a single attempt.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.accepted_statuses.contains(&status)
    }

    /// Runs `call` until it returns an accepted status or attempts run out.
    /// A rejected status becomes `SearchError::Engine`; the last failure is
    /// returned. Configuration errors are never retried.
    pub async fn send<F, Fut>(
        &self,
        operation: &str,
        sink: &dyn EventSink,
        mut call: F,
    ) -> Result<TransportResponse, SearchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TransportResponse, SearchError>>,
    {
        let mut attempt = 1;
        loop {
            let failure = match call().await {
                Ok(response) if self.accepts(response.status) => {
                    debug!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        status = response.status,
                        "attempt succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => SearchError::Engine {
                    status: response.status,
                    body: response.body,
                },
                Err(error) if error.is_configuration() => return Err(error),
                Err(error) => error,
            };

            debug!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                error = %failure,
                "attempt failed"
            );

            if attempt >= self.max_attempts {
                return Err(failure);
            }

            sink.record(&ClientEvent::retry(
                operation,
                attempt,
                self.max_attempts,
                failure.to_string(),
            ));
            tokio::time::sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CollectingSink;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::ZERO, vec![200, 201])
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let sink = CollectingSink::default();

        let result = fast_policy()
            .send("bulk", &sink, || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(SearchError::Transport("connection reset".to_string()))
                    } else {
                        Ok(TransportResponse::new(201, "{}"))
                    }
                }
            })
            .await;

        assert!(matches!(result, Ok(ref response) if response.status == 201));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.events().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_with_last_error() {
        let calls = AtomicU32::new(0);
        let sink = CollectingSink::default();

        let result = fast_policy()
            .send("bulk", &sink, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(TransportResponse::new(503, "unavailable")) }
            })
            .await;

        assert!(matches!(result, Err(SearchError::Engine { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sink.events().len(), 4);
    }

    #[tokio::test]
    async fn statuses_outside_accepted_set_are_failures() {
        let policy = RetryPolicy::new(2, Duration::ZERO, vec![200, 201]);
        let sink = CollectingSink::default();

        let result = policy
            .send("index", &sink, || async { Ok(TransportResponse::new(202, "")) })
            .await;

        assert!(matches!(result, Err(SearchError::Engine { status: 202, .. })));
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let sink = CollectingSink::default();

        let result = fast_policy()
            .send("index", &sink, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SearchError::Configuration("bad url".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_never_sleeps_or_retries() {
        let calls = AtomicU32::new(0);
        let sink = CollectingSink::default();
        let policy = RetryPolicy::default().single_attempt();

        let result = policy
            .send("scroll", &sink, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(TransportResponse::new(404, "{}")) }
            })
            .await;

        assert!(matches!(result, Err(SearchError::Engine { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(policy.delay(), Duration::from_secs(5));
    }
}

//! In-flight limit for model calls.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::llm::{CompletionRequest, LlmClient, LlmResponse, ModelError};

/// Wraps a client so at most `max_in_flight` calls run at once.
///
/// Share one instance across runners to bound provider load process-wide.
pub struct RateLimitedLlm {
    inner: Arc<dyn LlmClient>,
    permits: Arc<Semaphore>,
}

impl RateLimitedLlm {
    pub fn new(inner: Arc<dyn LlmClient>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl LlmClient for RateLimitedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, ModelError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ModelError::Request(format!("rate limiter closed: {}", e)))?;
        self.inner.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::llm::ResponseSchema;

    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for Gauge {
        async fn complete(&self, _r: &CompletionRequest) -> Result<LlmResponse, ModelError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(LlmResponse::new("{}"))
        }
    }

    #[tokio::test]
    async fn never_exceeds_max_in_flight() {
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let limited = Arc::new(RateLimitedLlm::new(gauge.clone(), 2));
        let req = CompletionRequest::new(ResponseSchema::Answer, "q", 0.0);
        let calls = (0..6).map(|_| {
            let limited = Arc::clone(&limited);
            let req = req.clone();
            async move { limited.complete(&req).await }
        });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limited.available(), 2);
    }
}

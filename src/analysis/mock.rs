//! Scripted in-process analysis client.
//!
//! Doubles as the offline analyzer when no endpoint is configured.

use super::client::{AnalysisClient, AnalysisError};
use super::result::{AnalysisResult, AnalysisStatus, ImagePayload, ReasoningDepth};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Requests kept by default; older ones are dropped.
const DEFAULT_RECORD_LIMIT: usize = 64;

/// One call seen by [`MockAnalysisClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Augmented context text.
    pub context: String,
    /// Image MIME type.
    pub mime_type: String,
    /// Length of the base64 payload.
    pub image_len: usize,
    /// Requested depth.
    pub depth: ReasoningDepth,
}

/// Returns queued responses, then a fixed NORMAL verdict.
///
/// Each call sleeps for the configured latency on the tokio clock, so
/// paused-time tests can hold a request in flight deterministically. Only
/// the most recent requests are kept, so a long offline run stays bounded.
pub struct MockAnalysisClient {
    latency: Duration,
    script: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
    requests: Mutex<VecDeque<RecordedRequest>>,
    record_limit: usize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAnalysisClient {
    /// Creates a client with no latency and an empty script.
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(VecDeque::new()),
            record_limit: DEFAULT_RECORD_LIMIT,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the simulated service latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of recent requests kept for [`requests`](Self::requests).
    /// Zero disables recording.
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit;
        self
    }

    /// Queues a verdict.
    pub fn push_result(&self, result: AnalysisResult) {
        self.script.lock().push_back(Ok(result));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: AnalysisError) {
        self.script.lock().push_back(Err(error));
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent calls, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().iter().cloned().collect()
    }

    /// Highest number of calls ever outstanding at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn fallback(image: &ImagePayload) -> AnalysisResult {
        AnalysisResult {
            status: AnalysisStatus::Normal,
            observation: format!(
                "Received {} frame ({} base64 bytes).",
                image.mime_type,
                image.data.len()
            ),
            deduction: "No anomalies detected by the offline analyzer.".to_string(),
            recommendation: "Configure an analysis endpoint for real assessments.".to_string(),
        }
    }
}

impl Default for MockAnalysisClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisClient for MockAnalysisClient {
    async fn analyze(
        &self,
        context: &str,
        image: &ImagePayload,
        depth: ReasoningDepth,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.record_limit > 0 {
            let mut requests = self.requests.lock();
            if requests.len() == self.record_limit {
                requests.pop_front();
            }
            requests.push_back(RecordedRequest {
                context: context.to_string(),
                mime_type: image.mime_type.clone(),
                image_len: image.data.len(),
                depth,
            });
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::fallback(image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ImagePayload {
        ImagePayload {
            mime_type: "image/jpeg".into(),
            data: "AAAA".into(),
        }
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let client = MockAnalysisClient::new();
        client.push_error(AnalysisError::Service("boom".into()));

        let first = client.analyze("ctx", &payload(), ReasoningDepth::Low).await;
        assert!(first.is_err());

        let second = client
            .analyze("ctx", &payload(), ReasoningDepth::High)
            .await
            .unwrap();
        assert_eq!(second.status, AnalysisStatus::Normal);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].depth, ReasoningDepth::High);
        assert_eq!(requests[0].image_len, 4);
        assert_eq!(client.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_recording_is_bounded() {
        let client = MockAnalysisClient::new().with_record_limit(2);
        for context in ["first", "second", "third"] {
            client
                .analyze(context, &payload(), ReasoningDepth::Low)
                .await
                .unwrap();
        }

        assert_eq!(client.call_count(), 3);
        let contexts: Vec<_> = client.requests().into_iter().map(|r| r.context).collect();
        assert_eq!(contexts, vec!["second", "third"]);

        let silent = MockAnalysisClient::new().with_record_limit(0);
        silent
            .analyze("ctx", &payload(), ReasoningDepth::Low)
            .await
            .unwrap();
        assert_eq!(silent.call_count(), 1);
        assert!(silent.requests().is_empty());
    }
}

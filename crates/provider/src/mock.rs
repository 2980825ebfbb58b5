//! Programmable mock image provider for worker tests.
//!
//! Mirrors `crates/runpod/src/mock.rs`'s `MockRenderBehavior` shape
//! (shared `Arc<RwLock<_>>` knobs, a `reset()`, a request history) but
//! returns synchronously instead of posting an async callback, since this
//! provider's contract is a blocking RPC rather than submit-then-postback.

use crate::{EnhanceRequest, EnhanceResult, ImageProvider, ProviderError};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MockOutcome {
    #[default]
    Success,
    TransientFailure,
    PermanentFailure,
    /// Sleeps far longer than any sane `provider_deadline`, so a caller
    /// wrapping the call in `tokio::time::timeout` observes a timeout.
    Hang,
}

#[derive(Debug, Clone)]
pub struct MockProviderBehavior {
    pub outcome: Arc<RwLock<MockOutcome>>,
    pub delay_ms: Arc<RwLock<u64>>,
    pub error_message: Arc<RwLock<Option<String>>>,
}

impl Default for MockProviderBehavior {
    fn default() -> Self {
        Self {
            outcome: Arc::new(RwLock::new(MockOutcome::Success)),
            delay_ms: Arc::new(RwLock::new(10)),
            error_message: Arc::new(RwLock::new(None)),
        }
    }
}

impl MockProviderBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.write().unwrap() = outcome;
    }

    pub fn set_delay_ms(&self, delay: u64) {
        *self.delay_ms.write().unwrap() = delay;
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        *self.error_message.write().unwrap() = Some(message.into());
    }

    pub fn get_outcome(&self) -> MockOutcome {
        self.outcome.read().unwrap().clone()
    }

    pub fn reset(&self) {
        *self.outcome.write().unwrap() = MockOutcome::Success;
        *self.delay_ms.write().unwrap() = 10;
        *self.error_message.write().unwrap() = None;
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEnhanceRequest {
    pub job_id: uuid::Uuid,
    pub tier: String,
    pub prompt: String,
}

pub struct MockImageProvider {
    behavior: Arc<MockProviderBehavior>,
    history: Mutex<Vec<RecordedEnhanceRequest>>,
}

impl Default for MockImageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockImageProvider {
    pub fn new() -> Self {
        Self { behavior: Arc::new(MockProviderBehavior::new()), history: Mutex::new(Vec::new()) }
    }

    pub fn with_behavior(behavior: Arc<MockProviderBehavior>) -> Self {
        Self { behavior, history: Mutex::new(Vec::new()) }
    }

    pub fn behavior(&self) -> &Arc<MockProviderBehavior> {
        &self.behavior
    }

    pub fn recorded_requests(&self) -> Vec<RecordedEnhanceRequest> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageProvider for MockImageProvider {
    async fn enhance(&self, request: EnhanceRequest) -> Result<EnhanceResult, ProviderError> {
        self.history.lock().unwrap().push(RecordedEnhanceRequest {
            job_id: request.job_id,
            tier: request.tier.clone(),
            prompt: request.prompt.clone(),
        });

        let outcome = self.behavior.get_outcome();
        let delay_ms = *self.behavior.delay_ms.read().unwrap();
        let error_message = self.behavior.error_message.read().unwrap().clone();

        match outcome {
            MockOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("caller should have timed out before this resolves");
            }
            MockOutcome::Success => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(EnhanceResult {
                    output: bytes::Bytes::from_static(b"mock-enhanced-image-bytes"),
                    content_type: "image/jpeg".to_string(),
                })
            }
            MockOutcome::TransientFailure => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Err(ProviderError::Transient(
                    error_message.unwrap_or_else(|| "mock transient failure".to_string()),
                ))
            }
            MockOutcome::PermanentFailure => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Err(ProviderError::Permanent(
                    error_message.unwrap_or_else(|| "mock permanent failure".to_string()),
                ))
            }
        }
    }
}

//! Mock completion provider for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::completion::{CompletionError, CompletionProvider, CompletionRequest};

/// Scripted completion provider.
///
/// Responses are returned in the order they were queued; once the queue is
/// empty the fallback response (if any) is repeated. Every request is
/// recorded for inspection.
#[derive(Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that always answers `content`.
    pub fn always(content: impl Into<String>) -> Self {
        Self {
            fallback: Some(content.into()),
            ..Self::default()
        }
    }

    /// Queue a successful response.
    pub fn push_response(&self, content: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(content.into()));
        }
    }

    /// Queue a failure.
    pub fn push_error(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(message.into()));
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(content)) => Ok(content),
            Some(Err(message)) => Err(CompletionError::ApiError(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| CompletionError::ApiError("no scripted response".to_string())),
        }
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        Ok(())
    }
}

//! Mock completion provider for testing
//!
//! Returns a configurable reply or error without making network calls and
//! records every prompt it receives.

use std::sync::Mutex;
use std::time::Duration;

use crate::providers::{CompletionProvider, ProviderError};

pub struct MockCompletionProvider {
    response: Mutex<String>,
    error: Mutex<Option<ProviderError>>,
    delay: Mutex<Option<Duration>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self {
            response: Mutex::new("Mock response".to_string()),
            error: Mutex::new(None),
            delay: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_response(&self, content: impl Into<String>) {
        *self.response.lock().unwrap() = content.into();
    }

    /// Makes every call fail with `error` until cleared
    pub fn set_error(&self, error: ProviderError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error.lock().unwrap() = None;
    }

    /// Holds every call for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.response.lock().unwrap().clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockCompletionProvider::new();
        mock.set_response("Be careful.");

        assert_eq!(mock.complete("is this legit?").await.unwrap(), "Be careful.");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.prompts(), vec!["is this legit?".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_error_then_clear() {
        let mock = MockCompletionProvider::new();
        mock.set_error(ProviderError::timeout(30));
        assert!(mock.complete("hi").await.is_err());

        mock.clear_error();
        assert!(mock.complete("hi").await.is_ok());
    }
}

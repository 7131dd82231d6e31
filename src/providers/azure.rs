//! Azure-style chat-completions provider
//!
//! Posts `{"messages":[{"role":"user","content":...}]}` to
//! `{base_url}/deployments/{model}/chat/completions/?api-version={version}`
//! with the access token in the `api-key` header, and returns
//! `choices[0].message.content`.
//!
//! # Features
//!
//! - Exponential backoff retry for rate limiting and server errors, capped
//!   at one minute; a 429's `Retry-After` seconds take precedence
//! - Request timeout from configuration
//! - The access token is never logged

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CompletionConfig;
use crate::providers::{CompletionProvider, ProviderError};

const DEFAULT_MAX_RETRIES: u32 = 3;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AzureChatProvider {
    base_url: String,
    model: String,
    api_version: String,
    access_token: String,
    timeout_seconds: u64,
    max_retries: u32,
    retry_base_delay: Duration,
    client: Client,
}

impl AzureChatProvider {
    /// Creates a provider, failing if the HTTP client can not be built.
    pub fn try_new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_version: impl Into<String>,
        access_token: impl Into<String>,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_version: api_version.into(),
            access_token: access_token.into(),
            timeout_seconds,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
            client,
        })
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self, ProviderError> {
        let access_token = config.access_token.as_deref().ok_or_else(|| {
            ProviderError::config("Completion access token is not configured")
        })?;
        Self::try_new(
            &config.base_url,
            &config.model_name,
            &config.api_version,
            access_token,
            config.timeout_seconds,
        )
    }

    /// Overrides the retry policy. `max_retries` counts total attempts.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/deployments/{}/chat/completions/?api-version={}",
            self.base_url, self.model, self.api_version
        )
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }

    /// Wait before retrying a 429: the server's hint if it sent one,
    /// otherwise the regular backoff.
    fn rate_limit_delay(&self, err: &ProviderError, attempt: u32) -> Duration {
        match err.retry_after() {
            Some(seconds) => Duration::from_secs(seconds).min(MAX_RETRY_DELAY),
            None => self.backoff(attempt),
        }
    }

    fn parse_response(response: ChatResponse) -> Result<String, ProviderError> {
        if let Some(error) = response.error {
            return Err(ProviderError::provider(error.message, error.code));
        }

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::provider("No response choices returned", None::<&str>)
        })?;

        choice
            .message
            .content
            .ok_or_else(|| ProviderError::provider("Response choice has no content", None::<&str>))
    }

    /// Makes the API request with retry logic for rate limiting
    async fn make_request_with_retry(
        &self,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, ProviderError> {
        let url = self.endpoint_url();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt = attempt, model = %self.model, "Making chat-completions request");

            let response = self
                .client
                .post(&url)
                .header("api-key", &self.access_token)
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    debug!(status = %status, "Received response");

                    match status {
                        StatusCode::OK => {
                            return resp.json::<ChatResponse>().await.map_err(|e| {
                                ProviderError::serialization(format!(
                                    "Failed to parse response: {}",
                                    e
                                ))
                            });
                        }
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            let error_text = resp.text().await.unwrap_or_default();
                            return Err(ProviderError::auth(format!(
                                "Authentication failed ({}): {}",
                                status, error_text
                            )));
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            let retry_after = retry_after_seconds(resp.headers());
                            if attempt >= self.max_retries {
                                let error_text = resp.text().await.unwrap_or_default();
                                return Err(ProviderError::rate_limit(
                                    format!(
                                        "Rate limit exceeded after {} attempts: {}",
                                        attempt, error_text
                                    ),
                                    retry_after,
                                ));
                            }

                            let err = ProviderError::rate_limit("Too many requests", retry_after);
                            let delay = self.rate_limit_delay(&err, attempt);
                            warn!(
                                attempt = attempt,
                                max_retries = self.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                retry_after = ?retry_after,
                                "Rate limited, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        status if status.is_client_error() => {
                            let error_text = resp.text().await.unwrap_or_default();
                            return Err(ProviderError::invalid_request(format!(
                                "Client error ({}): {}",
                                status, error_text
                            )));
                        }
                        status if status.is_server_error() => {
                            let error_text = resp.text().await.unwrap_or_default();
                            if attempt < self.max_retries {
                                let delay = self.backoff(attempt);
                                warn!(
                                    attempt = attempt,
                                    max_retries = self.max_retries,
                                    delay_ms = delay.as_millis() as u64,
                                    "Server error, retrying",
                                );
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                            return Err(ProviderError::provider(
                                format!(
                                    "Server error ({}) after {} attempts: {}",
                                    status, attempt, error_text
                                ),
                                Some(status.as_u16().to_string()),
                            ));
                        }
                        _ => {
                            let error_text = resp.text().await.unwrap_or_default();
                            return Err(ProviderError::provider(
                                format!("Unexpected status ({}): {}", status, error_text),
                                Some(status.as_u16().to_string()),
                            ));
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Request failed");

                    let provider_error = if e.is_timeout() {
                        ProviderError::timeout(self.timeout_seconds)
                    } else {
                        ProviderError::from(e)
                    };

                    if attempt < self.max_retries && provider_error.is_retryable() {
                        let delay = self.backoff(attempt);
                        warn!(
                            attempt = attempt,
                            max_retries = self.max_retries,
                            error = %provider_error,
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(provider_error);
                }
            }
        }
    }
}

/// `Retry-After` in its delay-seconds form. HTTP-date values are ignored.
fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[async_trait::async_trait]
impl CompletionProvider for AzureChatProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        info!(
            model = %self.model,
            prompt_length = prompt.chars().count(),
            "Sending completion request"
        );

        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response = self.make_request_with_retry(&request).await?;
        let content = Self::parse_response(response)?;

        info!(
            content_length = content.chars().count(),
            "Received completion"
        );
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> AzureChatProvider {
        AzureChatProvider::try_new(
            "https://genai.example.edu/general/rest/",
            "gpt-4-o-mini",
            "2024-05-01-preview",
            "secret-token",
            30,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            provider().endpoint_url(),
            "https://genai.example.edu/general/rest/deployments/gpt-4-o-mini/chat/completions/?api-version=2024-05-01-preview"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"messages": [{"role": "user", "content": "hello"}]})
        );
    }

    #[test]
    fn test_parse_response_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Likely a scam."}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .unwrap();
        assert_eq!(
            AzureChatProvider::parse_response(response).unwrap(),
            "Likely a scam."
        );
    }

    #[test]
    fn test_parse_response_errors() {
        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(AzureChatProvider::parse_response(empty).is_err());

        let service: ChatResponse = serde_json::from_value(json!({
            "error": {"message": "content filtered", "code": "content_filter"}
        }))
        .unwrap();
        let err = AzureChatProvider::parse_response(service).unwrap_err();
        assert!(err.to_string().contains("content filtered"));
    }

    #[test]
    fn test_backoff_doubles() {
        let provider = provider().with_retry(4, Duration::from_millis(10));
        assert_eq!(provider.backoff(1), Duration::from_millis(10));
        assert_eq!(provider.backoff(2), Duration::from_millis(20));
        assert_eq!(provider.backoff(3), Duration::from_millis(40));
    }

    #[test]
    fn test_backoff_saturates_at_cap() {
        let provider = provider().with_retry(u32::MAX, Duration::from_secs(1));
        assert_eq!(provider.backoff(7), Duration::from_secs(60));
        assert_eq!(provider.backoff(40), MAX_RETRY_DELAY);
        assert_eq!(provider.backoff(u32::MAX), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_rate_limit_delay_prefers_server_hint() {
        let provider = provider().with_retry(3, Duration::from_secs(10));
        let hinted = ProviderError::rate_limit("slow down", Some(2));
        assert_eq!(provider.rate_limit_delay(&hinted, 1), Duration::from_secs(2));

        let huge = ProviderError::rate_limit("slow down", Some(86_400));
        assert_eq!(provider.rate_limit_delay(&huge, 1), MAX_RETRY_DELAY);

        let bare = ProviderError::rate_limit("slow down", None);
        assert_eq!(provider.rate_limit_delay(&bare, 2), Duration::from_secs(20));
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_seconds(&headers), None);

        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(retry_after_seconds(&headers), Some(12));

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after_seconds(&headers), None);
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = CompletionConfig::default();
        let err = AzureChatProvider::from_config(&config).unwrap_err();
        assert!(matches!(err, ProviderError::Config { .. }));
    }
}

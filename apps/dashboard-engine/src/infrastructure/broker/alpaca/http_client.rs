//! HTTP client wrapper with retry logic.
//!
//! Reads are retried on network errors, 429 and gateway errors. Order
//! submission goes through [`AlpacaHttpClient::post_once`] and is never
//! retried: a request that timed out may still have reached the venue.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaErrorResponse;
use super::config::AlpacaConfig;
use super::error::AlpacaError;
use crate::application::retry::RetryPolicy;

/// HTTP client for the Alpaca API.
#[derive(Debug, Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key: String,
    api_secret: String,
    trading_base_url: String,
    data_base_url: String,
    retry: RetryPolicy,
}

impl AlpacaHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(AlpacaError::MissingCredentials);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            trading_base_url: config.trading_base_url().trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url().trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    /// GET from the trading API, with retry.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.trading_base_url, path, &[], None::<&()>, true)
            .await
    }

    /// GET from the market data API, with retry.
    pub async fn data_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AlpacaError> {
        self.request(Method::GET, &self.data_base_url, path, query, None::<&()>, true)
            .await
    }

    /// POST to the trading API exactly once.
    #[allow(clippy::future_not_send)]
    pub async fn post_once<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        self.request(Method::POST, &self.trading_base_url, path, &[], Some(body), false)
            .await
    }

    #[allow(clippy::future_not_send, clippy::too_many_lines)]
    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        retry: bool,
    ) -> Result<T, AlpacaError> {
        let url = format!("{base_url}{path}");
        let policy = if retry { self.retry } else { RetryPolicy::none() };
        let mut backoff = policy.backoff();

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt = backoff.attempt() + 1,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(if retry {
                        AlpacaError::MaxRetriesExceeded {
                            attempts: backoff.attempt() + 1,
                        }
                    } else {
                        AlpacaError::Network(e.to_string())
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| AlpacaError::Network(e.to_string()))?;
                let text = if text.is_empty() { "null" } else { text.as_str() };
                return serde_json::from_str(text).map_err(|e| AlpacaError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();

            let (error_code, error_message) =
                match serde_json::from_str::<AlpacaErrorResponse>(&error_body) {
                    Ok(err) => (
                        err.code_string()
                            .unwrap_or_else(|| status.as_u16().to_string()),
                        err.message,
                    ),
                    Err(_) => (status.as_u16().to_string(), error_body),
                };

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    let delay = backoff
                        .next_backoff()
                        .map(|computed| retry_after.map_or(computed, Duration::from_secs));
                    if let Some(delay) = delay {
                        tracing::warn!(
                            code = %error_code,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            code = %error_code,
                            message = %error_message,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            "Retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(if retry {
                        AlpacaError::MaxRetriesExceeded {
                            attempts: backoff.attempt() + 1,
                        }
                    } else {
                        AlpacaError::Network(format!("{error_code}: {error_message}"))
                    });
                }
                ErrorCategory::NonRetryable => {
                    return Err(match (status, method == Method::POST) {
                        (StatusCode::UNAUTHORIZED, _) | (StatusCode::FORBIDDEN, false) => {
                            AlpacaError::AuthenticationFailed
                        }
                        // Orders refused for buying power, PDT rules or bad parameters.
                        (StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY, true) => {
                            AlpacaError::OrderRejected(error_message)
                        }
                        _ => AlpacaError::Api {
                            code: error_code,
                            message: error_message,
                        },
                    });
                }
            }
        }
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_statuses() {
        assert!(matches!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        ));
        assert!(matches!(
            categorize_status(StatusCode::BAD_GATEWAY),
            ErrorCategory::Retryable
        ));
        assert!(matches!(
            categorize_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorCategory::Retryable
        ));
        assert!(matches!(
            categorize_status(StatusCode::UNPROCESSABLE_ENTITY),
            ErrorCategory::NonRetryable
        ));
        assert!(matches!(
            categorize_status(StatusCode::UNAUTHORIZED),
            ErrorCategory::NonRetryable
        ));
    }

    #[test]
    fn missing_credentials_are_refused() {
        let config = AlpacaConfig::new("", "secret", crate::domain::execution::Venue::Paper);
        assert_eq!(
            AlpacaHttpClient::new(&config).unwrap_err(),
            AlpacaError::MissingCredentials
        );
    }
}

//! Cloud API HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::CloudConfig;
use crate::error::{is_retryable_code, CloudError};
use crate::types::{SendRequest, SendResponse, StatusUpdateRequest};

/// Bounded timeout for provider calls. After this the attempt is treated as
/// a retryable failure by callers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error envelope returned by the Graph API.
#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

/// Structured Graph API error.
#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    code: i64,
}

/// Client for the Cloud API messages endpoint of one business phone number.
#[derive(Clone)]
pub struct CloudClient {
    http: Client,
    config: CloudConfig,
}

impl CloudClient {
    /// Create a client for the given configuration.
    pub fn new(config: CloudConfig) -> Result<Self, CloudError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(CloudError::Http)?;

        Ok(Self { http, config })
    }

    /// Create a client reusing an existing HTTP connection pool.
    ///
    /// Used when one process sends through many channels: one reqwest client,
    /// one `CloudClient` per channel's credentials.
    pub fn with_http(http: Client, config: CloudConfig) -> Self {
        Self { http, config }
    }

    /// Send a message. Returns the provider's acknowledgement.
    pub async fn send(&self, request: &SendRequest) -> Result<SendResponse, CloudError> {
        debug!("Cloud API send: to={}, type={}", request.to, request.kind);
        self.post(request).await
    }

    /// Mark an inbound message as read.
    ///
    /// Callers treat failures here as best-effort; this method still reports
    /// them so the caller can log.
    pub async fn mark_read(&self, message_id: &str) -> Result<(), CloudError> {
        debug!("Cloud API mark_read: {}", message_id);
        let request = StatusUpdateRequest::read(message_id);
        let _: serde_json::Value = self.post(&request).await?;
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// POST a JSON body to the messages endpoint and decode the response.
    async fn post<B, R>(&self, body: &B) -> Result<R, CloudError>
    where
        B: serde::Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.config.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await
            .map_err(CloudError::Http)?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(CloudError::Http);
        }

        // Rate-limit responses carry a Retry-After header in seconds.
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GraphErrorResponse>(&text) {
            Ok(parsed) => {
                let error = parsed.error;
                warn!(
                    "Cloud API error {} ({}): {}",
                    error.code, error.kind, error.message
                );
                Err(CloudError::Api {
                    retryable: is_retryable_code(error.code) || status.is_server_error(),
                    code: error.code,
                    kind: error.kind,
                    message: error.message,
                    retry_after,
                })
            }
            Err(_) => Err(CloudError::Unexpected {
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("api_base", &self.config.api_base)
            .field("phone_number_id", &self.config.phone_number_id)
            .finish()
    }
}

//! Configuration types for the Cloud API client.

/// Default Graph API base URL.
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Configuration for one sending identity (a business phone number).
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the Graph API (overridable for tests/proxies).
    pub api_base: String,
    /// Phone number id this client sends from.
    pub phone_number_id: String,
    /// Bearer token for the phone number's WABA.
    pub access_token: String,
}

impl CloudConfig {
    /// Create a new configuration against the default Graph API base.
    pub fn new(phone_number_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Create a configuration with a custom API base URL.
    pub fn with_api_base(
        api_base: impl Into<String>,
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Get the messages endpoint URL for this phone number.
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }
}

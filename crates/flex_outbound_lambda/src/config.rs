use std::time::Duration;

use thiserror::Error;

use crate::adapters::platform::PlatformError;
use crate::adapters::twilio::{
    TwilioClient, TwilioCredentials, TwilioEndpoints, DEFAULT_CHAT_BASE_URL,
    DEFAULT_FLEX_BASE_URL, DEFAULT_PROXY_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};
use crate::handlers::cleanup::CleanupConfig;
use crate::handlers::initiate::InitiateConfig;

pub const ACCOUNT_SID_VAR: &str = "ACCOUNT_SID";
pub const AUTH_TOKEN_VAR: &str = "AUTH_TOKEN";
pub const PROXY_SERVICE_SID_VAR: &str = "TWILIO_PROXY_SERVICE_SID";
pub const CHAT_SERVICE_SID_VAR: &str = "TWILIO_CHAT_SERVICE_SID";
pub const PROXY_BASE_URL_VAR: &str = "TWILIO_PROXY_BASE_URL";
pub const CHAT_BASE_URL_VAR: &str = "TWILIO_CHAT_BASE_URL";
pub const FLEX_BASE_URL_VAR: &str = "TWILIO_FLEX_BASE_URL";
pub const HTTP_TIMEOUT_VAR: &str = "TWILIO_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Settings read once per cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    pub credentials: TwilioCredentials,
    pub endpoints: TwilioEndpoints,
    pub request_timeout: Duration,
    pub proxy_service_sid: String,
    /// Only the session cleanup needs it; outbound messages use the chat
    /// service of the matched Flex Flow.
    pub chat_service_sid: Option<String>,
}

impl FunctionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        let request_timeout = match value(HTTP_TIMEOUT_VAR) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: HTTP_TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            credentials: TwilioCredentials {
                account_sid: required(ACCOUNT_SID_VAR)?,
                auth_token: required(AUTH_TOKEN_VAR)?,
            },
            endpoints: TwilioEndpoints {
                proxy: value(PROXY_BASE_URL_VAR)
                    .unwrap_or_else(|| DEFAULT_PROXY_BASE_URL.to_string()),
                chat: value(CHAT_BASE_URL_VAR)
                    .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
                flex: value(FLEX_BASE_URL_VAR)
                    .unwrap_or_else(|| DEFAULT_FLEX_BASE_URL.to_string()),
            },
            request_timeout,
            proxy_service_sid: required(PROXY_SERVICE_SID_VAR)?,
            chat_service_sid: value(CHAT_SERVICE_SID_VAR),
        })
    }

    pub fn require_chat_service_sid(&self) -> Result<&str, ConfigError> {
        self.chat_service_sid
            .as_deref()
            .ok_or(ConfigError::Missing(CHAT_SERVICE_SID_VAR))
    }

    pub fn cleanup_config(&self) -> Result<CleanupConfig, ConfigError> {
        Ok(CleanupConfig {
            proxy_service_sid: self.proxy_service_sid.clone(),
            chat_service_sid: self.require_chat_service_sid()?.to_string(),
        })
    }

    pub fn initiate_config(&self) -> InitiateConfig {
        InitiateConfig {
            proxy_service_sid: self.proxy_service_sid.clone(),
        }
    }

    pub fn twilio_client(&self) -> Result<TwilioClient, PlatformError> {
        TwilioClient::new(
            self.credentials.clone(),
            self.endpoints.clone(),
            self.request_timeout,
        )
    }
}

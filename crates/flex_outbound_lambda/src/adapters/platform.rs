use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::runtime::resources::{
    ChatChannel, ChatMessage, FlexChannel, FlexFlow, NewFlexChannel, NewProxySession,
    ProxyParticipant, ProxySession,
};

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform answered with its structured error document.
    #[error("platform error {status}: {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
        more_info: Option<String>,
    },
    /// The platform answered with a status but a body we could not decode.
    #[error("undecodable platform response ({status}): {message}")]
    Decode { status: u16, message: String },
    /// The request never produced a response.
    #[error("platform request failed: {0}")]
    Transport(String),
}

impl PlatformError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Decode { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }

    /// Raw error document, relayed verbatim as a handler response body.
    pub fn body(&self) -> Value {
        match self {
            Self::Api {
                status,
                code,
                message,
                more_info,
            } => json!({
                "status": status,
                "code": code,
                "message": message,
                "moreInfo": more_info,
            }),
            Self::Decode { status, message } => json!({
                "status": status,
                "message": message,
            }),
            Self::Transport(message) => json!({ "message": message }),
        }
    }
}

/// Remote resources the handlers orchestrate. Implementations perform exactly
/// one remote call per method (list methods may page).
#[async_trait]
pub trait CommsPlatform: Send + Sync {
    async fn list_proxy_sessions(
        &self,
        proxy_service_sid: &str,
    ) -> Result<Vec<ProxySession>, PlatformError>;

    async fn create_proxy_session(
        &self,
        proxy_service_sid: &str,
        session: &NewProxySession,
    ) -> Result<ProxySession, PlatformError>;

    async fn close_proxy_session(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<ProxySession, PlatformError>;

    async fn remove_proxy_session(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<(), PlatformError>;

    async fn list_proxy_participants(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<Vec<ProxyParticipant>, PlatformError>;

    async fn fetch_chat_channel(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
    ) -> Result<ChatChannel, PlatformError>;

    async fn update_chat_channel_attributes(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
        attributes: &str,
    ) -> Result<ChatChannel, PlatformError>;

    async fn create_chat_message(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
        body: &str,
    ) -> Result<ChatMessage, PlatformError>;

    async fn list_flex_flows(&self) -> Result<Vec<FlexFlow>, PlatformError>;

    async fn create_flex_channel(
        &self,
        channel: &NewFlexChannel,
    ) -> Result<FlexChannel, PlatformError>;
}

use serde_json::Value;
use thiserror::Error;

use crate::adapters::platform::{CommsPlatform, PlatformError};
use crate::response::{
    is_preflight, message_response, platform_error_response, preflight_response,
    success_response, ApiGatewayResponse,
};
use crate::runtime::attributes::{deactivate_channel_attributes, AttributesError};
use crate::runtime::contract::CleanupSummary;
use crate::runtime::identifiers::{channel_sid_for_session, SidMappingError};

const COMPONENT: &str = "cleanup_handler";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub proxy_service_sid: String,
    pub chat_service_sid: String,
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    SidMapping(#[from] SidMappingError),
    #[error("chat channel '{channel_sid}': {source}")]
    Attributes {
        channel_sid: String,
        #[source]
        source: AttributesError,
    },
}

/// Tears down every proxy session in the service, one at a time, in list order.
///
/// For each session the paired chat channel is marked inactive, then the
/// session is closed and deleted. The first failure stops the run; sessions
/// already removed stay removed.
pub async fn cleanup_proxy_sessions(
    config: &CleanupConfig,
    platform: &dyn CommsPlatform,
) -> Result<CleanupSummary, CleanupError> {
    let sessions = platform
        .list_proxy_sessions(&config.proxy_service_sid)
        .await?;
    tracing::info!(
        component = COMPONENT,
        event = "sessions_listed",
        sessions_found = sessions.len()
    );

    for session in &sessions {
        let channel_sid = channel_sid_for_session(&session.sid, session.unique_name.as_deref())?;

        let channel = platform
            .fetch_chat_channel(&config.chat_service_sid, channel_sid.as_str())
            .await?;
        let attributes =
            deactivate_channel_attributes(channel.attributes.as_deref()).map_err(|source| {
                CleanupError::Attributes {
                    channel_sid: channel_sid.to_string(),
                    source,
                }
            })?;
        platform
            .update_chat_channel_attributes(
                &config.chat_service_sid,
                channel_sid.as_str(),
                &attributes,
            )
            .await?;

        platform
            .close_proxy_session(&config.proxy_service_sid, &session.sid)
            .await?;
        platform
            .remove_proxy_session(&config.proxy_service_sid, &session.sid)
            .await?;

        tracing::info!(
            component = COMPONENT,
            event = "session_removed",
            session_sid = %session.sid,
            channel_sid = %channel_sid
        );
    }

    Ok(CleanupSummary {
        sessions_cleaned: sessions.len(),
    })
}

/// Runs a cleanup for any request method except an `OPTIONS` preflight,
/// which only gets the CORS headers and never reaps.
pub async fn handle_cleanup_event(
    event: Value,
    config: &CleanupConfig,
    platform: &dyn CommsPlatform,
) -> ApiGatewayResponse {
    if is_preflight(&event) {
        return preflight_response();
    }

    match cleanup_proxy_sessions(config, platform).await {
        Ok(summary) => success_response(200, summary.message()),
        Err(error) => {
            tracing::error!(
                component = COMPONENT,
                event = "cleanup_failed",
                error = %error
            );
            match &error {
                CleanupError::Platform(platform_error) => platform_error_response(platform_error),
                CleanupError::SidMapping(_) | CleanupError::Attributes { .. } => {
                    message_response(500, error.to_string())
                }
            }
        }
    }
}

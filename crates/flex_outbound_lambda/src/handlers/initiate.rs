use std::fmt;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::platform::{CommsPlatform, PlatformError};
use crate::response::{
    is_preflight, message_response, normalize_apigw_event, platform_error_response,
    preflight_response, success_response, validation_error_response, ApiGatewayResponse,
};
use crate::runtime::contract::{
    new_flex_channel, new_proxy_session, verify_outbound_request, ChatChannelView,
    ChatMessageView, OutboundConversationResponse, OutboundRequest, ProxySessionView,
    RequestValidationError, ValidatedOutboundRequest, RESPONSE_SCHEMA_VERSION,
};
use crate::runtime::resources::{ChatMessage, FlexFlow, ProxySession};
use crate::runtime::routing::select_flex_flow;

const COMPONENT: &str = "initiate_handler";

/// Source of the chat identity bound to each new channel.
pub trait IdentitySource: Send + Sync {
    fn next_identity(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdentitySource;

impl IdentitySource for UuidIdentitySource {
    fn next_identity(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateConfig {
    pub proxy_service_sid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedResource {
    ChatChannel,
    ProxySession,
    ChatMessage,
}

impl fmt::Display for CreatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChatChannel => "Chat Channel",
            Self::ProxySession => "Proxy Session",
            Self::ChatMessage => "Chat Message",
        })
    }
}

#[derive(Debug, Error)]
pub enum InitiateError {
    #[error("Unable to find matching Flex Flow")]
    NoMatchingFlow,
    #[error("Flex Flow '{0}' has no chat service")]
    MissingChatService(String),
    #[error("Failed to create {0}")]
    MissingSid(CreatedResource),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Opens an outbound SMS conversation routed through a Flex task.
///
/// Steps run strictly in order and the first failure aborts the rest:
/// resolve the Flex Flow for the sender number, create the task-bound chat
/// channel, reuse or create the proxy session linking customer and channel,
/// then post the optional initial message.
pub async fn initiate_outbound_conversation(
    request: &ValidatedOutboundRequest,
    config: &InitiateConfig,
    platform: &dyn CommsPlatform,
    identities: &dyn IdentitySource,
) -> Result<OutboundConversationResponse, InitiateError> {
    let flows = platform.list_flex_flows().await?;
    let flow =
        select_flex_flow(&flows, &request.from_number).ok_or(InitiateError::NoMatchingFlow)?;
    tracing::info!(
        component = COMPONENT,
        event = "flex_flow_resolved",
        flex_flow_sid = %flow.sid,
        chat_service_sid = flow.chat_service_sid.as_deref().unwrap_or_default()
    );

    let identity = identities.next_identity();
    let channel = platform
        .create_flex_channel(&new_flex_channel(request, &flow.sid, &identity))
        .await?;
    if channel.sid.is_empty() {
        return Err(InitiateError::MissingSid(CreatedResource::ChatChannel));
    }
    tracing::info!(
        component = COMPONENT,
        event = "chat_channel_created",
        chat_channel_sid = %channel.sid,
        task_sid = channel.task_sid.as_deref().unwrap_or_default()
    );

    let session = reuse_or_create_proxy_session(request, config, platform, &channel.sid).await?;
    let participants = platform
        .list_proxy_participants(&config.proxy_service_sid, &session.sid)
        .await?;

    let chat_message = match &request.initial_notification_message {
        Some(body) => Some(send_initial_message(flow, platform, &channel.sid, body).await?),
        None => None,
    };

    Ok(OutboundConversationResponse {
        schema_version: RESPONSE_SCHEMA_VERSION.to_string(),
        chat_channel: ChatChannelView::new(identity, &channel),
        proxy_session: ProxySessionView::new(&session, &participants),
        chat_message: chat_message.as_ref().map(ChatMessageView::from),
    })
}

/// Returns the session already named after `chat_channel_sid`, or creates
/// one. List-then-create is not atomic: concurrent invocations for the same
/// channel can both create.
async fn reuse_or_create_proxy_session(
    request: &ValidatedOutboundRequest,
    config: &InitiateConfig,
    platform: &dyn CommsPlatform,
    chat_channel_sid: &str,
) -> Result<ProxySession, InitiateError> {
    let sessions = platform
        .list_proxy_sessions(&config.proxy_service_sid)
        .await?;
    if let Some(existing) = sessions
        .into_iter()
        .find(|session| session.unique_name.as_deref() == Some(chat_channel_sid))
    {
        tracing::info!(
            component = COMPONENT,
            event = "proxy_session_reused",
            proxy_session_sid = %existing.sid,
            chat_channel_sid
        );
        return Ok(existing);
    }

    let session = platform
        .create_proxy_session(
            &config.proxy_service_sid,
            &new_proxy_session(request, chat_channel_sid),
        )
        .await?;
    if session.sid.is_empty() {
        return Err(InitiateError::MissingSid(CreatedResource::ProxySession));
    }
    tracing::info!(
        component = COMPONENT,
        event = "proxy_session_created",
        proxy_session_sid = %session.sid,
        chat_channel_sid
    );
    Ok(session)
}

/// Posts on the flow's chat service; the proxy session relays it as SMS.
/// The sender defaults to the platform's system identity.
async fn send_initial_message(
    flow: &FlexFlow,
    platform: &dyn CommsPlatform,
    chat_channel_sid: &str,
    body: &str,
) -> Result<ChatMessage, InitiateError> {
    let chat_service_sid = flow
        .chat_service_sid
        .as_deref()
        .filter(|sid| !sid.is_empty())
        .ok_or_else(|| InitiateError::MissingChatService(flow.sid.clone()))?;

    let message = platform
        .create_chat_message(chat_service_sid, chat_channel_sid, body)
        .await?;
    if message.sid.is_empty() {
        return Err(InitiateError::MissingSid(CreatedResource::ChatMessage));
    }
    tracing::info!(
        component = COMPONENT,
        event = "chat_message_sent",
        chat_message_sid = %message.sid,
        chat_channel_sid
    );
    Ok(message)
}

pub async fn handle_initiate_event(
    event: Value,
    config: &InitiateConfig,
    platform: &dyn CommsPlatform,
    identities: &dyn IdentitySource,
) -> ApiGatewayResponse {
    if is_preflight(&event) {
        return preflight_response();
    }

    let request = match parse_request(event) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                component = COMPONENT,
                event = "request_rejected",
                errors = ?error.errors
            );
            return validation_error_response(error);
        }
    };

    match initiate_outbound_conversation(&request, config, platform, identities).await {
        Ok(response) => success_response(200, response),
        Err(error) => {
            tracing::error!(
                component = COMPONENT,
                event = "initiate_failed",
                error = %error
            );
            match &error {
                InitiateError::Platform(platform_error) => platform_error_response(platform_error),
                _ => message_response(500, error.to_string()),
            }
        }
    }
}

pub async fn handle_initiate_event_with_uuid_identity(
    event: Value,
    config: &InitiateConfig,
    platform: &dyn CommsPlatform,
) -> ApiGatewayResponse {
    handle_initiate_event(event, config, platform, &UuidIdentitySource).await
}

fn parse_request(event: Value) -> Result<ValidatedOutboundRequest, RequestValidationError> {
    let payload = normalize_apigw_event(event).map_err(RequestValidationError::new)?;
    let request = serde_json::from_value::<OutboundRequest>(payload)
        .map_err(|error| RequestValidationError::new(format!("Malformed request: {error}")))?;
    verify_outbound_request(request)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::runtime::contract::NO_MATCHING_FLOW_MESSAGE;
    use crate::test_helpers::{
        FixedIdentitySource, InMemoryPlatform, Operation, TEST_PROXY_SERVICE_SID,
    };

    const FROM: &str = "+15551230000";
    const TO: &str = "+15559876543";

    fn sample_config() -> InitiateConfig {
        InitiateConfig {
            proxy_service_sid: TEST_PROXY_SERVICE_SID.to_string(),
        }
    }

    fn sample_event() -> Value {
        json!({
            "body": json!({
                "fromNumber": FROM,
                "toName": "Alex",
                "toNumber": TO,
            })
            .to_string()
        })
    }

    fn message_event(message: &str) -> Value {
        json!({
            "fromNumber": FROM,
            "toName": "Alex",
            "toNumber": TO,
            "initialNotificationMessage": message
        })
    }

    fn sample_platform() -> InMemoryPlatform {
        InMemoryPlatform::new().with_task_flow("FO1", FROM)
    }

    #[tokio::test]
    async fn rejects_missing_field_without_remote_calls() {
        let platform = sample_platform();
        let response = handle_initiate_event(
            json!({"body": {"fromNumber": FROM, "toNumber": TO}}),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.json_body(),
            json!({"status": 400, "errors": ["Missing 'toName' in request body"]})
        );
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn rejects_malformed_json_body() {
        let platform = sample_platform();
        let response = handle_initiate_event(
            json!({"body": "{not json"}),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 400);
        assert!(response.json_body()["errors"][0]
            .as_str()
            .expect("error string")
            .starts_with("Malformed JSON body"));
    }

    #[tokio::test]
    async fn missing_flow_fails_before_creating_anything() {
        let platform = InMemoryPlatform::new().with_task_flow("FO1", "+15550000000");
        let response = handle_initiate_event(
            sample_event(),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": NO_MATCHING_FLOW_MESSAGE})
        );
        assert_eq!(platform.count(Operation::CreateFlexChannel), 0);
        assert_eq!(platform.count(Operation::CreateProxySession), 0);
    }

    #[tokio::test]
    async fn creates_channel_with_fresh_identity_and_task_attributes() {
        let platform = sample_platform();
        let request = verify_outbound_request(OutboundRequest {
            from_number: Some(FROM.to_string()),
            to_name: Some("Alex".to_string()),
            to_number: Some(TO.to_string()),
            source_chat_channel_sid: Some("CHsource".to_string()),
            ..OutboundRequest::default()
        })
        .expect("request should validate");

        let response = initiate_outbound_conversation(
            &request,
            &sample_config(),
            &platform,
            &FixedIdentitySource::new(&["identity-abc"]),
        )
        .await
        .expect("initiation should succeed");

        assert_eq!(response.chat_channel.identity, "identity-abc");
        assert!(response.chat_message.is_none());

        let create = platform
            .calls()
            .into_iter()
            .find(|call| call.operation == Operation::CreateFlexChannel)
            .expect("channel should be created");
        assert_eq!(create.target.as_deref(), Some(TO));
        let attributes: Value =
            serde_json::from_str(&create.payload.expect("task attributes")).expect("JSON");
        assert_eq!(
            attributes,
            json!({
                "to": TO,
                "direction": "outbound",
                "name": "Alex",
                "from": FROM,
                "sourceChatChannelSid": "CHsource"
            })
        );
    }

    #[tokio::test]
    async fn reuses_session_named_after_channel() {
        let platform = sample_platform();
        let identities = FixedIdentitySource::default();

        let config = sample_config();
        let first = handle_initiate_event(sample_event(), &config, &platform, &identities).await;
        let second = handle_initiate_event(sample_event(), &config, &platform, &identities).await;

        assert_eq!(first.status_code, 200);
        assert_eq!(second.status_code, 200);
        assert_eq!(platform.count(Operation::CreateProxySession), 1);
        assert_eq!(
            first.json_body()["proxySession"]["sid"],
            second.json_body()["proxySession"]["sid"]
        );
        assert_ne!(
            first.json_body()["chatChannel"]["identity"],
            second.json_body()["chatChannel"]["identity"]
        );
    }

    #[tokio::test]
    async fn sends_initial_message_on_flow_chat_service() {
        let platform = sample_platform();
        let response = handle_initiate_event(
            message_event("Hello!"),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.json_body()["chatMessage"]["body"], "Hello!");
        let messages = platform.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].channel_sid.as_deref(),
            response.json_body()["chatChannel"]["sid"].as_str()
        );
    }

    #[tokio::test]
    async fn created_channel_without_sid_is_reported() {
        let platform = sample_platform();
        platform.omit_sid_on(Operation::CreateFlexChannel);

        let response = handle_initiate_event(
            sample_event(),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": "Failed to create Chat Channel"})
        );
        assert_eq!(platform.count(Operation::ListProxySessions), 0);
    }

    #[tokio::test]
    async fn created_session_without_sid_is_reported() {
        let platform = sample_platform();
        platform.omit_sid_on(Operation::CreateProxySession);

        let response = handle_initiate_event(
            sample_event(),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": "Failed to create Proxy Session"})
        );
    }

    #[tokio::test]
    async fn created_message_without_sid_is_reported() {
        let platform = sample_platform();
        platform.omit_sid_on(Operation::CreateChatMessage);

        let response = handle_initiate_event(
            message_event("Hello!"),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": "Failed to create Chat Message"})
        );
        assert_eq!(platform.count(Operation::CreateChatMessage), 1);
        assert_eq!(platform.sessions().len(), 1);
    }

    #[tokio::test]
    async fn flow_without_chat_service_fails_before_sending() {
        let platform = InMemoryPlatform::new().with_flow(FlexFlow {
            sid: "FO1".to_string(),
            contact_identity: Some(FROM.to_string()),
            integration_type: Some("task".to_string()),
            chat_service_sid: None,
            ..FlexFlow::default()
        });

        let response = handle_initiate_event(
            message_event("Hello!"),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.json_body(),
            json!({"message": "Flex Flow 'FO1' has no chat service"})
        );
        assert_eq!(platform.count(Operation::CreateChatMessage), 0);
        assert_eq!(platform.count(Operation::CreateProxySession), 1);
        assert_eq!(platform.sessions().len(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_status_and_body() {
        let platform = sample_platform();
        platform.fail_on(Operation::CreateProxySession, None, Some(429));

        let response = handle_initiate_event(
            sample_event(),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 429);
        assert_eq!(response.json_body()["status"], 429);
        assert_eq!(platform.count(Operation::CreateChatMessage), 0);
    }

    #[tokio::test]
    async fn preflight_skips_validation() {
        let platform = sample_platform();
        let response = handle_initiate_event(
            json!({"requestContext": {"http": {"method": "OPTIONS"}}}),
            &sample_config(),
            &platform,
            &FixedIdentitySource::default(),
        )
        .await;

        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn uuid_identities_are_unique_v4() {
        let first = UuidIdentitySource.next_identity();
        let second = UuidIdentitySource.next_identity();
        assert_ne!(first, second);
        let parsed = Uuid::parse_str(&first).expect("identity should be a UUID");
        assert_eq!(parsed.get_version_num(), 4);
    }
}

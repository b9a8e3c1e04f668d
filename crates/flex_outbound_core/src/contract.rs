use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::resources::{
    ChatMessage, FlexChannel, NewFlexChannel, NewProxySession, ParticipantSpec, ProxyParticipant,
    ProxySession, SESSION_MODE_MESSAGE_ONLY,
};

pub const RESPONSE_SCHEMA_VERSION: &str = "v1";
pub const OUTBOUND_DIRECTION: &str = "outbound";
pub const NO_MATCHING_FLOW_MESSAGE: &str = "Unable to find matching Flex Flow";

/// Raw body of an outbound conversation request. Every field is optional here;
/// presence is checked by [`verify_outbound_request`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    #[serde(default)]
    pub from_number: Option<String>,
    #[serde(default)]
    pub to_name: Option<String>,
    #[serde(default)]
    pub to_number: Option<String>,
    #[serde(default)]
    pub initial_notification_message: Option<String>,
    #[serde(default)]
    pub source_chat_channel_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOutboundRequest {
    pub from_number: String,
    pub to_name: String,
    pub to_number: String,
    pub initial_notification_message: Option<String>,
    pub source_chat_channel_sid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .errors.join("; "))]
pub struct RequestValidationError {
    pub errors: Vec<String>,
}

impl RequestValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }
}

/// Checks mandatory fields in a fixed order and reports only the first one
/// missing. Empty strings count as missing.
pub fn verify_outbound_request(
    request: OutboundRequest,
) -> Result<ValidatedOutboundRequest, RequestValidationError> {
    let Some(from_number) = present(request.from_number) else {
        return Err(missing_field("fromNumber"));
    };
    let Some(to_name) = present(request.to_name) else {
        return Err(missing_field("toName"));
    };
    let Some(to_number) = present(request.to_number) else {
        return Err(missing_field("toNumber"));
    };

    Ok(ValidatedOutboundRequest {
        from_number,
        to_name,
        to_number,
        initial_notification_message: present(request.initial_notification_message),
        source_chat_channel_sid: present(request.source_chat_channel_sid),
    })
}

fn missing_field(field: &str) -> RequestValidationError {
    RequestValidationError::new(format!("Missing '{field}' in request body"))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

/// Attributes carried by the routing task created alongside the chat channel.
pub fn task_attributes_json(request: &ValidatedOutboundRequest) -> String {
    let mut attributes = json!({
        "to": request.to_number,
        "direction": OUTBOUND_DIRECTION,
        "name": request.to_name,
        "from": request.from_number,
    });
    if let Some(source) = &request.source_chat_channel_sid {
        attributes["sourceChatChannelSid"] = json!(source);
    }
    attributes.to_string()
}

pub fn new_flex_channel(
    request: &ValidatedOutboundRequest,
    flex_flow_sid: &str,
    identity: &str,
) -> NewFlexChannel {
    NewFlexChannel {
        flex_flow_sid: flex_flow_sid.to_string(),
        identity: identity.to_string(),
        target: request.to_number.clone(),
        chat_user_friendly_name: request.to_name.clone(),
        chat_friendly_name: format!("SMS{}", request.to_number),
        task_attributes: task_attributes_json(request),
    }
}

/// Both participants share `from_number` as the masking number: the customer's
/// phone and the agent-facing chat channel.
pub fn session_participants(
    request: &ValidatedOutboundRequest,
    chat_channel_sid: &str,
) -> [ParticipantSpec; 2] {
    let participant = |identifier: &str| ParticipantSpec {
        identifier: identifier.to_string(),
        proxy_identifier: request.from_number.clone(),
        friendly_name: request.to_name.clone(),
    };
    [participant(&request.to_number), participant(chat_channel_sid)]
}

pub fn new_proxy_session(
    request: &ValidatedOutboundRequest,
    chat_channel_sid: &str,
) -> NewProxySession {
    NewProxySession {
        unique_name: chat_channel_sid.to_string(),
        mode: SESSION_MODE_MESSAGE_ONLY.to_string(),
        participants: session_participants(request, chat_channel_sid).to_vec(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatChannelView {
    pub identity: String,
    pub sid: String,
    pub account_sid: Option<String>,
    pub flex_flow_sid: Option<String>,
    pub user_sid: Option<String>,
    pub task_sid: Option<String>,
    pub url: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
}

impl ChatChannelView {
    pub fn new(identity: impl Into<String>, channel: &FlexChannel) -> Self {
        Self {
            identity: identity.into(),
            sid: channel.sid.clone(),
            account_sid: channel.account_sid.clone(),
            flex_flow_sid: channel.flex_flow_sid.clone(),
            user_sid: channel.user_sid.clone(),
            task_sid: channel.task_sid.clone(),
            url: channel.url.clone(),
            date_created: channel.date_created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub sid: String,
    pub identifier: Option<String>,
    pub proxy_identifier: Option<String>,
    pub friendly_name: Option<String>,
}

impl From<&ProxyParticipant> for ParticipantView {
    fn from(participant: &ProxyParticipant) -> Self {
        Self {
            sid: participant.sid.clone(),
            identifier: participant.identifier.clone(),
            proxy_identifier: participant.proxy_identifier.clone(),
            friendly_name: participant.friendly_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProxySessionView {
    pub sid: String,
    pub unique_name: Option<String>,
    pub status: Option<String>,
    pub service_sid: Option<String>,
    pub mode: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub date_expiry: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub participants: Vec<ParticipantView>,
}

impl ProxySessionView {
    pub fn new(session: &ProxySession, participants: &[ProxyParticipant]) -> Self {
        Self {
            sid: session.sid.clone(),
            unique_name: session.unique_name.clone(),
            status: session.status.clone(),
            service_sid: session.service_sid.clone(),
            mode: session.mode.clone(),
            date_created: session.date_created,
            date_updated: session.date_updated,
            date_expiry: session.date_expiry,
            url: session.url.clone(),
            participants: participants.iter().map(ParticipantView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    pub sid: String,
    pub channel_sid: Option<String>,
    pub from: Option<String>,
    pub body: Option<String>,
    pub index: Option<u64>,
    pub date_created: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

impl From<&ChatMessage> for ChatMessageView {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sid: message.sid.clone(),
            channel_sid: message.channel_sid.clone(),
            from: message.from.clone(),
            body: message.body.clone(),
            index: message.index,
            date_created: message.date_created,
            url: message.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundConversationResponse {
    pub schema_version: String,
    pub chat_channel: ChatChannelView,
    pub proxy_session: ProxySessionView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_message: Option<ChatMessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationErrorBody {
    pub status: u16,
    pub errors: Vec<String>,
}

impl From<RequestValidationError> for ValidationErrorBody {
    fn from(error: RequestValidationError) -> Self {
        Self {
            status: 400,
            errors: error.errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSummary {
    pub sessions_cleaned: usize,
}

impl CleanupSummary {
    pub fn message(&self) -> String {
        format!("{} sessions cleaned up", self.sessions_cleaned)
    }
}

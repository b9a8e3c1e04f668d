//! Resource shapes exchanged with the communications platform.
//!
//! Read shapes decode the platform's snake_case JSON. Only `sid` is relied on
//! structurally; it defaults to an empty string so a created resource without
//! an identifier decodes and can be rejected by the caller instead of failing
//! deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SESSION_MODE_MESSAGE_ONLY: &str = "message-only";
pub const SESSION_STATUS_CLOSED: &str = "closed";
pub const TASK_INTEGRATION_TYPE: &str = "task";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxySession {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub service_sid: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub closed_reason: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyParticipant {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub session_sid: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub proxy_identifier: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatChannel {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub service_sid: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    /// Free-form JSON document, kept as the raw string the platform stores.
    #[serde(default)]
    pub attributes: Option<String>,
    #[serde(default, rename = "type")]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub members_count: Option<u32>,
    #[serde(default)]
    pub messages_count: Option<u32>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub channel_sid: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub index: Option<u64>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlexFlow {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub chat_service_sid: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub contact_identity: Option<String>,
    #[serde(default)]
    pub integration_type: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Chat channel created through the Flex API; creating it also creates the
/// routing task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlexChannel {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub flex_flow_sid: Option<String>,
    #[serde(default)]
    pub user_sid: Option<String>,
    #[serde(default)]
    pub task_sid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantSpec {
    pub identifier: String,
    pub proxy_identifier: String,
    pub friendly_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProxySession {
    pub unique_name: String,
    pub mode: String,
    pub participants: Vec<ParticipantSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewFlexChannel {
    pub flex_flow_sid: String,
    pub identity: String,
    pub target: String,
    pub chat_user_friendly_name: String,
    pub chat_friendly_name: String,
    /// Serialized task attributes JSON.
    pub task_attributes: String,
}

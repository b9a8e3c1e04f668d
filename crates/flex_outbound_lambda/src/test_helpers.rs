//! In-memory communications platform for handler tests.
//!
//! [`InMemoryPlatform`] keeps sessions, participants, chat channels and flows
//! in memory, records every call in order, and can be told to fail a given
//! operation or to return a created resource without a SID.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::adapters::platform::{CommsPlatform, PlatformError};
use crate::handlers::initiate::IdentitySource;
use crate::runtime::attributes::{INACTIVE_STATUS, STATUS_ATTRIBUTE};
use crate::runtime::resources::{
    ChatChannel, ChatMessage, FlexChannel, FlexFlow, NewFlexChannel, NewProxySession,
    ProxyParticipant, ProxySession, SESSION_STATUS_CLOSED, TASK_INTEGRATION_TYPE,
};

pub const TEST_ACCOUNT_SID: &str = "AC00000000000000000000000000000000";
pub const TEST_PROXY_SERVICE_SID: &str = "KS00000000000000000000000000000000";
pub const TEST_CHAT_SERVICE_SID: &str = "IS00000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListProxySessions,
    CreateProxySession,
    CloseProxySession,
    RemoveProxySession,
    ListProxyParticipants,
    FetchChatChannel,
    UpdateChatChannelAttributes,
    CreateChatMessage,
    ListFlexFlows,
    CreateFlexChannel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCall {
    pub operation: Operation,
    /// SID (or target) the call addressed, when it addressed one.
    pub target: Option<String>,
    /// Payload written by the call, e.g. attributes or a message body.
    pub payload: Option<String>,
}

#[derive(Debug, Clone)]
struct Failure {
    operation: Operation,
    target: Option<String>,
    status: Option<u16>,
}

#[derive(Debug, Default)]
struct PlatformState {
    sessions: Vec<ProxySession>,
    participants: HashMap<String, Vec<ProxyParticipant>>,
    channels: Vec<(String, ChatChannel)>,
    messages: Vec<ChatMessage>,
    flows: Vec<FlexFlow>,
    calls: Vec<PlatformCall>,
    failures: Vec<Failure>,
    missing_sid: Vec<Operation>,
    sequence: u64,
}

impl PlatformState {
    fn next_sid(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}{:032x}", self.sequence)
    }

    fn record(
        &mut self,
        operation: Operation,
        target: Option<&str>,
        payload: Option<&str>,
    ) -> Result<(), PlatformError> {
        self.calls.push(PlatformCall {
            operation,
            target: target.map(str::to_string),
            payload: payload.map(str::to_string),
        });

        let failure = self.failures.iter().find(|failure| {
            failure.operation == operation
                && (failure.target.is_none() || failure.target.as_deref() == target)
        });
        match failure.map(|failure| failure.status) {
            None => Ok(()),
            Some(Some(status)) => Err(PlatformError::Api {
                status,
                code: Some(20000 + i64::from(status)),
                message: format!("injected {operation:?} failure"),
                more_info: None,
            }),
            Some(None) => Err(PlatformError::Transport(format!(
                "injected {operation:?} transport failure"
            ))),
        }
    }

    fn strip_sid(&self, operation: Operation, sid: String) -> String {
        if self.missing_sid.contains(&operation) {
            String::new()
        } else {
            sid
        }
    }

    fn channel_mut(&mut self, sid: &str) -> Option<&mut ChatChannel> {
        self.channels
            .iter_mut()
            .find(|(channel_sid, _)| channel_sid == sid)
            .map(|(_, channel)| channel)
    }
}

fn not_found(resource: &str, sid: &str) -> PlatformError {
    PlatformError::Api {
        status: 404,
        code: Some(20404),
        message: format!("The requested resource /{resource}/{sid} was not found"),
        more_info: Some("https://www.twilio.com/docs/errors/20404".to_string()),
    }
}

fn channel_is_active(channel: &ChatChannel) -> bool {
    let status = channel
        .attributes
        .as_deref()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
        .and_then(|attributes| {
            attributes
                .get(STATUS_ATTRIBUTE)
                .and_then(|value| value.as_str().map(str::to_string))
        });
    status.as_deref() != Some(INACTIVE_STATUS)
}

#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().expect("poisoned mutex")
    }

    /// Registers a task-integrated Flex Flow for `contact_identity`.
    pub fn with_task_flow(self, flow_sid: &str, contact_identity: &str) -> Self {
        self.with_flow(FlexFlow {
            sid: flow_sid.to_string(),
            friendly_name: Some(format!("SMS {contact_identity}")),
            chat_service_sid: Some(TEST_CHAT_SERVICE_SID.to_string()),
            channel_type: Some("sms".to_string()),
            contact_identity: Some(contact_identity.to_string()),
            integration_type: Some(TASK_INTEGRATION_TYPE.to_string()),
            enabled: Some(true),
            url: None,
        })
    }

    pub fn with_flow(self, flow: FlexFlow) -> Self {
        self.state().flows.push(flow);
        self
    }

    /// Seeds an open session named after a freshly created chat channel with
    /// the given attributes. Returns the channel SID.
    pub fn seed_session_with_channel(&self, attributes: &str) -> String {
        let mut state = self.state();
        let channel_sid = state.next_sid("CH");
        let session_sid = state.next_sid("KC");
        state.channels.push((
            channel_sid.clone(),
            ChatChannel {
                sid: channel_sid.clone(),
                service_sid: Some(TEST_CHAT_SERVICE_SID.to_string()),
                attributes: Some(attributes.to_string()),
                ..ChatChannel::default()
            },
        ));
        state.sessions.push(ProxySession {
            sid: session_sid,
            unique_name: Some(channel_sid.clone()),
            status: Some("open".to_string()),
            service_sid: Some(TEST_PROXY_SERVICE_SID.to_string()),
            mode: Some("message-only".to_string()),
            ..ProxySession::default()
        });
        channel_sid
    }

    /// Seeds a session whose unique name is not a chat channel SID.
    pub fn seed_session_named(&self, unique_name: &str) -> String {
        let mut state = self.state();
        let session_sid = state.next_sid("KC");
        state.sessions.push(ProxySession {
            sid: session_sid.clone(),
            unique_name: Some(unique_name.to_string()),
            status: Some("open".to_string()),
            ..ProxySession::default()
        });
        session_sid
    }

    /// Makes `operation` fail. `target` narrows it to one SID; `status` of
    /// `None` simulates a transport failure.
    pub fn fail_on(&self, operation: Operation, target: Option<&str>, status: Option<u16>) {
        self.state().failures.push(Failure {
            operation,
            target: target.map(str::to_string),
            status,
        });
    }

    /// Makes the create `operation` answer with a resource lacking its SID.
    pub fn omit_sid_on(&self, operation: Operation) {
        self.state().missing_sid.push(operation);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn sessions(&self) -> Vec<ProxySession> {
        self.state().sessions.clone()
    }

    pub fn channel(&self, sid: &str) -> Option<ChatChannel> {
        self.state().channel_mut(sid).map(|channel| channel.clone())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }
}

#[async_trait]
impl CommsPlatform for InMemoryPlatform {
    async fn list_proxy_sessions(
        &self,
        _proxy_service_sid: &str,
    ) -> Result<Vec<ProxySession>, PlatformError> {
        let mut state = self.state();
        state.record(Operation::ListProxySessions, None, None)?;
        Ok(state.sessions.clone())
    }

    async fn create_proxy_session(
        &self,
        proxy_service_sid: &str,
        session: &NewProxySession,
    ) -> Result<ProxySession, PlatformError> {
        let mut state = self.state();
        state.record(
            Operation::CreateProxySession,
            Some(session.unique_name.as_str()),
            None,
        )?;

        let sid = state.next_sid("KC");
        let participants = session
            .participants
            .iter()
            .map(|spec| ProxyParticipant {
                sid: state.next_sid("KP"),
                session_sid: Some(sid.clone()),
                identifier: Some(spec.identifier.clone()),
                proxy_identifier: Some(spec.proxy_identifier.clone()),
                friendly_name: Some(spec.friendly_name.clone()),
                date_created: None,
            })
            .collect();
        let created = ProxySession {
            sid: sid.clone(),
            unique_name: Some(session.unique_name.clone()),
            status: Some("open".to_string()),
            service_sid: Some(proxy_service_sid.to_string()),
            mode: Some(session.mode.clone()),
            ..ProxySession::default()
        };
        state.sessions.push(created.clone());
        state.participants.insert(sid.clone(), participants);

        Ok(ProxySession {
            sid: state.strip_sid(Operation::CreateProxySession, sid),
            ..created
        })
    }

    async fn close_proxy_session(
        &self,
        _proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<ProxySession, PlatformError> {
        let mut state = self.state();
        state.record(Operation::CloseProxySession, Some(session_sid), None)?;
        let session = state
            .sessions
            .iter_mut()
            .find(|session| session.sid == session_sid)
            .ok_or_else(|| not_found("Sessions", session_sid))?;
        session.status = Some(SESSION_STATUS_CLOSED.to_string());
        Ok(session.clone())
    }

    async fn remove_proxy_session(
        &self,
        _proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.state();
        state.record(Operation::RemoveProxySession, Some(session_sid), None)?;
        let before = state.sessions.len();
        state.sessions.retain(|session| session.sid != session_sid);
        if state.sessions.len() == before {
            return Err(not_found("Sessions", session_sid));
        }
        state.participants.remove(session_sid);
        Ok(())
    }

    async fn list_proxy_participants(
        &self,
        _proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<Vec<ProxyParticipant>, PlatformError> {
        let mut state = self.state();
        state.record(Operation::ListProxyParticipants, Some(session_sid), None)?;
        Ok(state
            .participants
            .get(session_sid)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_chat_channel(
        &self,
        _chat_service_sid: &str,
        channel_sid: &str,
    ) -> Result<ChatChannel, PlatformError> {
        let mut state = self.state();
        state.record(Operation::FetchChatChannel, Some(channel_sid), None)?;
        state
            .channel_mut(channel_sid)
            .map(|channel| channel.clone())
            .ok_or_else(|| not_found("Channels", channel_sid))
    }

    async fn update_chat_channel_attributes(
        &self,
        _chat_service_sid: &str,
        channel_sid: &str,
        attributes: &str,
    ) -> Result<ChatChannel, PlatformError> {
        let mut state = self.state();
        state.record(
            Operation::UpdateChatChannelAttributes,
            Some(channel_sid),
            Some(attributes),
        )?;
        let channel = state
            .channel_mut(channel_sid)
            .ok_or_else(|| not_found("Channels", channel_sid))?;
        channel.attributes = Some(attributes.to_string());
        Ok(channel.clone())
    }

    async fn create_chat_message(
        &self,
        _chat_service_sid: &str,
        channel_sid: &str,
        body: &str,
    ) -> Result<ChatMessage, PlatformError> {
        let mut state = self.state();
        state.record(Operation::CreateChatMessage, Some(channel_sid), Some(body))?;
        if state.channel_mut(channel_sid).is_none() {
            return Err(not_found("Channels", channel_sid));
        }
        let sid = state.next_sid("IM");
        let message = ChatMessage {
            sid: sid.clone(),
            channel_sid: Some(channel_sid.to_string()),
            from: Some("system".to_string()),
            to: Some(channel_sid.to_string()),
            body: Some(body.to_string()),
            index: Some(state.messages.len() as u64),
            ..ChatMessage::default()
        };
        state.messages.push(message.clone());
        Ok(ChatMessage {
            sid: state.strip_sid(Operation::CreateChatMessage, sid),
            ..message
        })
    }

    async fn list_flex_flows(&self) -> Result<Vec<FlexFlow>, PlatformError> {
        let mut state = self.state();
        state.record(Operation::ListFlexFlows, None, None)?;
        Ok(state.flows.clone())
    }

    /// Returns the still-active channel already open for the same target, as
    /// the platform does, or creates a new one.
    async fn create_flex_channel(
        &self,
        channel: &NewFlexChannel,
    ) -> Result<FlexChannel, PlatformError> {
        let mut state = self.state();
        state.record(
            Operation::CreateFlexChannel,
            Some(channel.target.as_str()),
            Some(channel.task_attributes.as_str()),
        )?;

        let existing = state
            .channels
            .iter()
            .find(|(_, existing)| {
                existing.unique_name.as_deref() == Some(channel.target.as_str())
                    && channel_is_active(existing)
            })
            .map(|(sid, _)| sid.clone());
        let sid = match existing {
            Some(sid) => sid,
            None => {
                let sid = state.next_sid("CH");
                state.channels.push((
                    sid.clone(),
                    ChatChannel {
                        sid: sid.clone(),
                        service_sid: Some(TEST_CHAT_SERVICE_SID.to_string()),
                        friendly_name: Some(channel.chat_friendly_name.clone()),
                        unique_name: Some(channel.target.clone()),
                        attributes: Some("{}".to_string()),
                        ..ChatChannel::default()
                    },
                ));
                sid
            }
        };

        Ok(FlexChannel {
            sid: state.strip_sid(Operation::CreateFlexChannel, sid),
            account_sid: Some(TEST_ACCOUNT_SID.to_string()),
            flex_flow_sid: Some(channel.flex_flow_sid.clone()),
            user_sid: Some(state.next_sid("US")),
            task_sid: Some(state.next_sid("WT")),
            url: None,
            date_created: None,
        })
    }
}

/// Hands out identities from a fixed list, then `identity-<n>`.
#[derive(Debug, Default)]
pub struct FixedIdentitySource {
    issued: Mutex<usize>,
    identities: Vec<String>,
}

impl FixedIdentitySource {
    pub fn new(identities: &[&str]) -> Self {
        Self {
            issued: Mutex::new(0),
            identities: identities.iter().map(|value| value.to_string()).collect(),
        }
    }
}

impl IdentitySource for FixedIdentitySource {
    fn next_identity(&self) -> String {
        let mut issued = self.issued.lock().expect("poisoned mutex");
        let identity = self
            .identities
            .get(*issued)
            .cloned()
            .unwrap_or_else(|| format!("identity-{}", *issued));
        *issued += 1;
        identity
    }
}

//! REST adapter for the Twilio Proxy, Programmable Chat and Flex APIs.
//!
//! Each [`CommsPlatform`] method maps to one documented endpoint. Writes are
//! form-encoded with the platform's PascalCase parameter names; reads decode
//! the snake_case resource JSON into `flex_outbound_core` resource types.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapters::platform::{CommsPlatform, PlatformError};
use crate::runtime::resources::{
    ChatChannel, ChatMessage, FlexChannel, FlexFlow, NewFlexChannel, NewProxySession,
    ProxyParticipant, ProxySession, SESSION_STATUS_CLOSED,
};

pub const DEFAULT_PROXY_BASE_URL: &str = "https://proxy.twilio.com/v1";
pub const DEFAULT_CHAT_BASE_URL: &str = "https://chat.twilio.com/v2";
pub const DEFAULT_FLEX_BASE_URL: &str = "https://flex-api.twilio.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: &str = "50";

/// Base URLs per platform product, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioEndpoints {
    pub proxy: String,
    pub chat: String,
    pub flex: String,
}

impl Default for TwilioEndpoints {
    fn default() -> Self {
        Self {
            proxy: DEFAULT_PROXY_BASE_URL.to_string(),
            chat: DEFAULT_CHAT_BASE_URL.to_string(),
            flex: DEFAULT_FLEX_BASE_URL.to_string(),
        }
    }
}

impl TwilioEndpoints {
    /// Points every product at one host, e.g. a local mock server.
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            proxy: format!("{base}/proxy/v1"),
            chat: format!("{base}/chat/v2"),
            flex: format!("{base}/flex/v1"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    credentials: TwilioCredentials,
    endpoints: TwilioEndpoints,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next_page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDocument {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    more_info: Option<String>,
}

impl From<reqwest::Error> for PlatformError {
    fn from(error: reqwest::Error) -> Self {
        PlatformError::Transport(error.to_string())
    }
}

impl TwilioClient {
    pub fn new(
        credentials: TwilioCredentials,
        endpoints: TwilioEndpoints,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            endpoints: TwilioEndpoints {
                proxy: endpoints.proxy.trim_end_matches('/').to_string(),
                chat: endpoints.chat.trim_end_matches('/').to_string(),
                flex: endpoints.flex.trim_end_matches('/').to_string(),
            },
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            &self.credentials.account_sid,
            Some(&self.credentials.auth_token),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, PlatformError> {
        tracing::debug!(method = "GET", url, "platform request");
        let response = self.authorized(self.client.get(url)).send().await?;
        decode_response(response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        tracing::debug!(method = "POST", url, "platform request");
        let response = self
            .authorized(self.client.post(url))
            .form(form)
            .send()
            .await?;
        decode_response(response).await
    }

    /// Reads every page of a list resource, following `meta.next_page_url`.
    async fn list_all<T: DeserializeOwned>(
        &self,
        url: &str,
        key: &str,
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        let mut next = Some(format!("{url}?PageSize={PAGE_SIZE}"));

        while let Some(page_url) = next.take() {
            let mut page: Value = self.get_json(&page_url).await?;
            let entries = page.get_mut(key).map(Value::take).unwrap_or(Value::Null);
            if !entries.is_null() {
                let decoded: Vec<T> =
                    serde_json::from_value(entries).map_err(|error| PlatformError::Decode {
                        status: 200,
                        message: format!("invalid '{key}' page: {error}"),
                    })?;
                items.extend(decoded);
            }

            next = page
                .get("meta")
                .cloned()
                .and_then(|meta| serde_json::from_value::<PageMeta>(meta).ok())
                .and_then(|meta| meta.next_page_url)
                .filter(|url| !url.is_empty());
        }

        Ok(items)
    }

    fn sessions_url(&self, proxy_service_sid: &str) -> String {
        format!(
            "{}/Services/{proxy_service_sid}/Sessions",
            self.endpoints.proxy
        )
    }

    fn channel_url(&self, chat_service_sid: &str, channel_sid: &str) -> String {
        format!(
            "{}/Services/{chat_service_sid}/Channels/{channel_sid}",
            self.endpoints.chat
        )
    }
}

async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &text));
    }

    serde_json::from_str(&text).map_err(|error| PlatformError::Decode {
        status: status.as_u16(),
        message: error.to_string(),
    })
}

fn api_error(status: u16, text: &str) -> PlatformError {
    match serde_json::from_str::<ApiErrorDocument>(text) {
        Ok(ApiErrorDocument {
            code,
            message: Some(message),
            more_info,
        }) => PlatformError::Api {
            status,
            code,
            message,
            more_info,
        },
        _ => PlatformError::Decode {
            status,
            message: if text.is_empty() {
                format!("HTTP {status}")
            } else {
                text.to_string()
            },
        },
    }
}

#[async_trait]
impl CommsPlatform for TwilioClient {
    async fn list_proxy_sessions(
        &self,
        proxy_service_sid: &str,
    ) -> Result<Vec<ProxySession>, PlatformError> {
        self.list_all(&self.sessions_url(proxy_service_sid), "sessions")
            .await
    }

    async fn create_proxy_session(
        &self,
        proxy_service_sid: &str,
        session: &NewProxySession,
    ) -> Result<ProxySession, PlatformError> {
        let mut form = vec![
            ("UniqueName", session.unique_name.clone()),
            ("Mode", session.mode.clone()),
        ];
        for participant in &session.participants {
            form.push((
                "Participants",
                json!({
                    "Identifier": participant.identifier,
                    "ProxyIdentifier": participant.proxy_identifier,
                    "FriendlyName": participant.friendly_name,
                })
                .to_string(),
            ));
        }
        self.post_form(&self.sessions_url(proxy_service_sid), &form)
            .await
    }

    async fn close_proxy_session(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<ProxySession, PlatformError> {
        let url = format!("{}/{session_sid}", self.sessions_url(proxy_service_sid));
        self.post_form(&url, &[("Status", SESSION_STATUS_CLOSED.to_string())])
            .await
    }

    async fn remove_proxy_session(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/{session_sid}", self.sessions_url(proxy_service_sid));
        tracing::debug!(method = "DELETE", url = %url, "platform request");
        let response = self.authorized(self.client.delete(&url)).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await?;
        Err(api_error(status.as_u16(), &text))
    }

    async fn list_proxy_participants(
        &self,
        proxy_service_sid: &str,
        session_sid: &str,
    ) -> Result<Vec<ProxyParticipant>, PlatformError> {
        let url = format!(
            "{}/{session_sid}/Participants",
            self.sessions_url(proxy_service_sid)
        );
        self.list_all(&url, "participants").await
    }

    async fn fetch_chat_channel(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
    ) -> Result<ChatChannel, PlatformError> {
        self.get_json(&self.channel_url(chat_service_sid, channel_sid))
            .await
    }

    async fn update_chat_channel_attributes(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
        attributes: &str,
    ) -> Result<ChatChannel, PlatformError> {
        self.post_form(
            &self.channel_url(chat_service_sid, channel_sid),
            &[("Attributes", attributes.to_string())],
        )
        .await
    }

    async fn create_chat_message(
        &self,
        chat_service_sid: &str,
        channel_sid: &str,
        body: &str,
    ) -> Result<ChatMessage, PlatformError> {
        let url = format!(
            "{}/Messages",
            self.channel_url(chat_service_sid, channel_sid)
        );
        self.post_form(&url, &[("Body", body.to_string())]).await
    }

    async fn list_flex_flows(&self) -> Result<Vec<FlexFlow>, PlatformError> {
        let url = format!("{}/FlexFlows", self.endpoints.flex);
        self.list_all(&url, "flex_flows").await
    }

    async fn create_flex_channel(
        &self,
        channel: &NewFlexChannel,
    ) -> Result<FlexChannel, PlatformError> {
        let url = format!("{}/Channels", self.endpoints.flex);
        let form = [
            ("FlexFlowSid", channel.flex_flow_sid.clone()),
            ("Identity", channel.identity.clone()),
            ("Target", channel.target.clone()),
            ("ChatUserFriendlyName", channel.chat_user_friendly_name.clone()),
            ("ChatFriendlyName", channel.chat_friendly_name.clone()),
            ("TaskAttributes", channel.task_attributes.clone()),
        ];
        self.post_form(&url, &form).await
    }
}

use std::fmt;

use thiserror::Error;

/// Length of a platform resource identifier: two-letter type prefix plus 32 hex digits.
pub const SID_LENGTH: usize = 34;
pub const CHANNEL_SID_PREFIX: &str = "CH";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SidMappingError {
    #[error("proxy session '{session_sid}' has no unique name")]
    MissingUniqueName { session_sid: String },
    #[error(
        "unique name '{unique_name}' of proxy session '{session_sid}' \
         does not start with a chat channel SID"
    )]
    NotAChannelSid {
        session_sid: String,
        unique_name: String,
    },
}

/// Validated chat channel identifier (`CH` + 32 hex digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelSid(String);

impl ChannelSid {
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != SID_LENGTH || !value.starts_with(CHANNEL_SID_PREFIX) {
            return None;
        }
        if !value[CHANNEL_SID_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the chat channel a proxy session relays to.
///
/// Sessions opened for outbound conversations are named after their chat
/// channel, so the channel SID is the first [`SID_LENGTH`] characters of the
/// unique name. Names that do not carry a channel SID there are rejected
/// rather than fetched blindly.
pub fn channel_sid_for_session(
    session_sid: &str,
    unique_name: Option<&str>,
) -> Result<ChannelSid, SidMappingError> {
    let Some(unique_name) = unique_name.filter(|name| !name.is_empty()) else {
        return Err(SidMappingError::MissingUniqueName {
            session_sid: session_sid.to_string(),
        });
    };

    unique_name
        .get(..SID_LENGTH)
        .and_then(ChannelSid::parse)
        .ok_or_else(|| SidMappingError::NotAChannelSid {
            session_sid: session_sid.to_string(),
            unique_name: unique_name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "CH0123456789abcdef0123456789abcdef";

    #[test]
    fn maps_exact_channel_name() {
        let sid = channel_sid_for_session("KC1", Some(CHANNEL)).expect("should map");
        assert_eq!(sid.as_str(), CHANNEL);
    }

    #[test]
    fn maps_prefix_of_longer_unique_name() {
        let name = format!("{CHANNEL}-retry-2");
        let sid = channel_sid_for_session("KC1", Some(&name)).expect("should map");
        assert_eq!(sid.as_str(), CHANNEL);
    }

    #[test]
    fn rejects_short_unique_name() {
        let error = channel_sid_for_session("KC1", Some("CH0123")).expect_err("should fail");
        assert_eq!(
            error,
            SidMappingError::NotAChannelSid {
                session_sid: "KC1".to_string(),
                unique_name: "CH0123".to_string(),
            }
        );
    }

    #[test]
    fn rejects_foreign_prefix() {
        let name = "KC0123456789abcdef0123456789abcdef";
        assert!(channel_sid_for_session("KC1", Some(name)).is_err());
    }

    #[test]
    fn rejects_missing_unique_name() {
        assert_eq!(
            channel_sid_for_session("KC9", None),
            Err(SidMappingError::MissingUniqueName {
                session_sid: "KC9".to_string()
            })
        );
        assert!(channel_sid_for_session("KC9", Some("")).is_err());
    }

    #[test]
    fn multibyte_name_does_not_panic() {
        let name = "CHééééééééééééééééééééééééééééééééé";
        assert!(channel_sid_for_session("KC1", Some(name)).is_err());
    }
}

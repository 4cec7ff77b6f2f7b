use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use crate::error::QueueError;

/// Serialized queue payload.
///
/// Messages carry no identity beyond their text. Two identical payloads are
/// indistinguishable once they are in the store, so handlers must tolerate
/// duplicate delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(String);

impl Message {
    /// Plain text, stored unchanged.
    pub fn text(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Structured value, stored as its JSON encoding.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, QueueError> {
        Ok(Self(serde_json::to_string(value)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// ASCII record separator. Opens every tagged member.
pub const TAG_MARKER: char = '\u{1e}';
const TAG_LEN: usize = 26;

/// Delay-set member encoding.
///
/// A sorted set dedups by member, so two identical payloads delayed at the
/// same time would collapse into one entry. Tagged members are
/// `\x1e<ULID>:<payload>` which keeps each insert distinct. Anything without
/// the marker is a plain payload and decodes unchanged, ULID-looking prefix
/// or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedMember {
    tag: Option<Ulid>,
    message: Message,
}

impl DelayedMember {
    pub fn tagged(tag: Ulid, message: Message) -> Self {
        Self {
            tag: Some(tag),
            message,
        }
    }

    pub fn untagged(message: Message) -> Self {
        Self { tag: None, message }
    }

    pub fn encode(&self) -> String {
        match self.tag {
            Some(tag) => format!("{TAG_MARKER}{tag}:{}", self.message),
            None => self.message.as_str().to_string(),
        }
    }

    pub fn decode(member: &str) -> Self {
        if let Some(rest) = member.strip_prefix(TAG_MARKER)
            && rest.as_bytes().get(TAG_LEN) == Some(&b':')
            && let Some(prefix) = rest.get(..TAG_LEN)
            && let Ok(tag) = Ulid::from_string(prefix)
        {
            return Self::tagged(tag, Message::text(&rest[TAG_LEN + 1..]));
        }
        Self::untagged(Message::text(member))
    }

    pub fn tag(&self) -> Option<Ulid> {
        self.tag
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn json_message_uses_canonical_encoding() {
        let msg = Message::json(&json!({ "id": 1 })).unwrap();
        assert_eq!(msg.as_str(), r#"{"id":1}"#);
    }

    #[test]
    fn text_message_passes_through() {
        let msg = Message::text("hello");
        assert_eq!(msg.as_str(), "hello");
    }

    #[test]
    fn tagged_member_decodes_back_to_payload() {
        let tag = Ulid::new();
        let member = DelayedMember::tagged(tag, Message::text(r#"{"id":2}"#)).encode();
        assert!(member.starts_with(&format!("{TAG_MARKER}{tag}:")));

        let decoded = DelayedMember::decode(&member);
        assert_eq!(decoded.tag(), Some(tag));
        assert_eq!(decoded.message().as_str(), r#"{"id":2}"#);
    }

    #[rstest]
    #[case::json(r#"{"id":2}"#)]
    #[case::empty("")]
    #[case::short_colon("abc:def")]
    #[case::not_a_ulid("!!!!!!!!!!!!!!!!!!!!!!!!!!:payload")]
    #[case::multibyte("ああああああああああ:x")]
    #[case::bare_ulid_prefix("01ARZ3NDEKTSV4RRFFQ69G5FAV:order-42")]
    #[case::marker_without_ulid("\u{1e}not-a-ulid:x")]
    fn untagged_members_are_plain_payloads(#[case] member: &str) {
        let decoded = DelayedMember::decode(member);
        assert_eq!(decoded.tag(), None);
        assert_eq!(decoded.message().as_str(), member);
    }
}

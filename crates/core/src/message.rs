//! A single role-tagged message and its transcript encoding.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};
use crate::role::{Role, RoleSet, LABEL_SEPARATOR, MESSAGE_MARKER};

/// A single message in a conversation.
///
/// A message carrying a `name` always has the `user` role: the name is the
/// speaker label shown in transcripts in place of the role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MessageRecord")]
pub struct Message {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A user message spoken by `name`.
    pub fn named(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Build a message from a transcript label: canonical role names map to
    /// their role, anything else becomes a named user message.
    pub fn from_label(label: &str, content: impl Into<String>) -> Self {
        match Role::from_label(label) {
            Some(role) => Self::new(role, content),
            None => Self::named(label, content),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The label written in front of the message in a transcript.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.role.as_str())
    }

    /// Decode a span of the form `"\n\n<label>: <body>"` using the canonical roles.
    pub fn from_text(span: &str) -> Result<Self> {
        Self::decode(span, RoleSet::canonical())
    }

    /// Decode a span, unescaping the body against `roles`.
    pub fn decode(span: &str, roles: &RoleSet) -> Result<Self> {
        let (label, body) = span
            .strip_prefix(MESSAGE_MARKER)
            .and_then(|rest| rest.split_once(LABEL_SEPARATOR))
            .ok_or_else(|| CodecError::MalformedSpan {
                span: span.to_string(),
            })?;
        Ok(Self::from_label(label, roles.unescape(body)))
    }

    /// Encode as a transcript span using the canonical roles.
    pub fn to_text(&self) -> String {
        self.encode(RoleSet::canonical())
    }

    /// Encode as a transcript span, escaping the content against `roles`.
    pub fn encode(&self, roles: &RoleSet) -> String {
        format!(
            "{}{}{}{}",
            MESSAGE_MARKER,
            self.label(),
            LABEL_SEPARATOR,
            roles.escape(&self.content)
        )
    }
}

/// Wire shape of a message inside a structured record.
///
/// Roles are kept as plain strings on the way in so that records written
/// with a speaker name in the `role` field still load.
#[derive(Debug, Clone, Deserialize)]
struct MessageRecord {
    role: String,
    content: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        match (Role::from_label(&record.role), record.name) {
            (Some(role), None) => Message::new(role, record.content),
            (_, Some(name)) => Message::from_label(&name, record.content),
            (None, None) => Message::named(record.role, record.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_canonical_role() {
        let msg = Message::from_text("\n\nassistant: Hello: world").unwrap();
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), "Hello: world");
        assert_eq!(msg.name(), None);
    }

    #[test]
    fn test_decode_custom_label_falls_back_to_user() {
        let msg = Message::from_text("\n\nAlice: hi there").unwrap();
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.name(), Some("Alice"));
        assert_eq!(msg.to_text(), "\n\nAlice: hi there");
    }

    #[test]
    fn test_decode_unescapes_body() {
        let msg = Message::from_text("\n\nuser: a \\\\ b\n\n\\system: c").unwrap();
        assert_eq!(msg.content(), "a \\ b\n\nsystem: c");
        assert_eq!(msg.to_text(), "\n\nuser: a \\\\ b\n\n\\system: c");
    }

    #[test]
    fn test_decode_empty_body() {
        let msg = Message::from_text("\n\nuser: ").unwrap();
        assert_eq!(msg.content(), "");
    }

    #[test]
    fn test_malformed_spans() {
        assert!(matches!(
            Message::from_text("\n\nuser without separator"),
            Err(CodecError::MalformedSpan { .. })
        ));
        assert!(matches!(
            Message::from_text("user: missing marker"),
            Err(CodecError::MalformedSpan { .. })
        ));
    }

    #[test]
    fn test_named_messages_serialize_name() {
        let value = serde_json::to_value(Message::named("Bob", "yo")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"role": "user", "content": "yo", "name": "Bob"})
        );
        let value = serde_json::to_value(Message::system("be nice")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "system", "content": "be nice"}));
    }

    #[test]
    fn test_deserialize_unknown_role_as_name() {
        let msg: Message = serde_json::from_str(r#"{"role": "Bob", "content": "yo"}"#).unwrap();
        assert_eq!(msg, Message::named("Bob", "yo"));

        let msg: Message =
            serde_json::from_str(r#"{"role": "user", "content": "yo", "name": "Bob"}"#).unwrap();
        assert_eq!(msg.label(), "Bob");
    }

    #[test]
    fn test_deserialize_canonical_name_as_role() {
        let msg: Message =
            serde_json::from_str(r#"{"role": "user", "content": "yo", "name": "assistant"}"#)
                .unwrap();
        assert_eq!(msg, Message::assistant("yo"));
        assert_eq!(Message::from_text(&msg.to_text()).unwrap(), msg);
    }
}

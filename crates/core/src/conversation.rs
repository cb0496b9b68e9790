//! Conversations: segmentation of transcripts, default system messages and
//! structured records.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::message::Message;
use crate::role::{Role, RoleSet};
use crate::BASE_TEMPLATE_NAME;

/// Options for reading transcript files.
#[derive(Debug, Clone)]
pub struct TranscriptConfig {
    /// Labels recognised as message boundaries.
    pub roles: RoleSet,
    /// Look for a sibling base template and inherit its system message.
    pub inherit: bool,
    /// File name of the base template inside a transcript's directory.
    pub base_template_name: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            roles: RoleSet::default(),
            inherit: true,
            base_template_name: BASE_TEMPLATE_NAME.to_string(),
        }
    }
}

/// An ordered sequence of messages.
///
/// Serializes as the `{"messages": [...]}` envelope. Legacy records that are
/// a bare array of messages are accepted when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConversationRecord")]
pub struct Conversation {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConversationRecord {
    Envelope { messages: Vec<Message> },
    Legacy(Vec<Message>),
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        match record {
            ConversationRecord::Envelope { messages } | ConversationRecord::Legacy(messages) => {
                Conversation { messages }
            }
        }
    }
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Build a conversation, prepending `default_system` as a system message
    /// when none of `messages` has the system role.
    pub fn with_default_system(messages: Vec<Message>, default_system: Option<&str>) -> Self {
        let mut conversation = Self::new(messages);
        if let Some(default) = default_system {
            if !conversation.has_system_message() {
                conversation.messages.insert(0, Message::system(default));
            }
        }
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|m| m.role() == Role::System)
    }

    /// Content of the first system message, if any.
    pub fn system_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role() == Role::System)
            .map(Message::content)
    }

    /// Decode a transcript using the canonical roles.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::decode(text, RoleSet::canonical(), None)
    }

    /// Decode a transcript.
    ///
    /// The text is split at every unescaped boundary marker of `roles` and
    /// each span decoded on its own. Empty text gives an empty conversation.
    pub fn decode(text: &str, roles: &RoleSet, default_system: Option<&str>) -> Result<Self> {
        let messages = roles
            .spans(text)
            .into_iter()
            .map(|span| Message::decode(span, roles))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_default_system(messages, default_system))
    }

    /// Encode as a transcript using the canonical roles.
    pub fn to_text(&self) -> String {
        self.encode(RoleSet::canonical())
    }

    pub fn encode(&self, roles: &RoleSet) -> String {
        self.messages.iter().map(|m| m.encode(roles)).collect()
    }

    /// Read a transcript file with the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, &TranscriptConfig::default())
    }

    /// Read a transcript file, inheriting the system message of a sibling
    /// base template when `config.inherit` is set.
    pub fn load_with(path: impl AsRef<Path>, config: &TranscriptConfig) -> Result<Self> {
        let path = path.as_ref();
        let default_system = if config.inherit {
            inherited_system_content(path, config)?
        } else {
            None
        };
        let text = fs::read_to_string(path).map_err(|e| CodecError::io(path, e))?;
        debug!(path = %path.display(), inherited = default_system.is_some(), "loading transcript");
        Self::decode(&text, &config.roles, default_system.as_deref())
    }

    /// Write the transcript to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, RoleSet::canonical())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, roles: &RoleSet) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CodecError::io(parent, e))?;
        }
        fs::write(path, self.encode(roles)).map_err(|e| CodecError::io(path, e))
    }

    /// The structured record: `{"messages": [{"role", "content", "name"?}, ...]}`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Path of the base template that applies to `path`.
pub fn base_template_path(path: &Path, base_template_name: &str) -> PathBuf {
    path.parent()
        .unwrap_or_else(|| Path::new(""))
        .join(base_template_name)
}

/// System content of the base template next to `path`, if there is one.
///
/// The template itself is read without inheritance, so lookups never chain.
fn inherited_system_content(path: &Path, config: &TranscriptConfig) -> Result<Option<String>> {
    let base = base_template_path(path, &config.base_template_name);
    if !base.is_file() {
        return Ok(None);
    }
    debug!(base = %base.display(), "inheriting system message from base template");
    let template = Conversation::load_with(
        &base,
        &TranscriptConfig {
            inherit: false,
            ..config.clone()
        },
    )?;
    Ok(template.system_content().map(str::to_string))
}

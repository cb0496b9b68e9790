//! Ordered collections of conversations stored as JSONL.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::conversation::Conversation;
use crate::error::{CodecError, Result};
use crate::message::Message;
use crate::role::RoleSet;

/// An ordered, append-only collection of conversations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    conversations: Vec<Conversation>,
}

impl Dataset {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }

    pub fn push(&mut self, conversation: Conversation) {
        self.conversations.push(conversation);
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn into_conversations(self) -> Vec<Conversation> {
        self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Total number of messages across all conversations.
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(Conversation::len).sum()
    }

    /// Speaker names of named messages, in order of first appearance.
    pub fn speaker_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self
            .conversations
            .iter()
            .flat_map(|c| c.messages())
            .filter_map(Message::name)
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Roles under which every conversation survives a trip through a
    /// transcript: the canonical roles, `extra`, and every speaker name.
    ///
    /// Without the speaker names, a named message that is not the first in
    /// its conversation would not start a new span when read back.
    pub fn transcript_roles<I, S>(&self, extra: I) -> Result<RoleSet>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = extra
            .into_iter()
            .map(Into::into)
            .chain(self.speaker_names().into_iter().map(str::to_string))
            .collect();
        RoleSet::with_extra_roles(labels)
    }

    /// One `{"messages": [...]}` record per line, without a trailing newline.
    pub fn to_jsonl(&self) -> Result<String> {
        let lines = self
            .conversations
            .iter()
            .map(Conversation::to_json_string)
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }

    /// Parse JSONL text. The first invalid line fails the whole load.
    ///
    /// Blank lines are skipped; line numbers in errors are 1-based.
    pub fn from_jsonl(text: &str) -> Result<Self> {
        records(text)
            .map(|(line, record)| parse_record(line, record))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Parse JSONL text, keeping every valid record and collecting the
    /// errors of the invalid ones instead of failing.
    pub fn from_jsonl_lenient(text: &str) -> (Self, Vec<CodecError>) {
        let mut dataset = Self::default();
        let mut errors = Vec::new();
        for (line, record) in records(text) {
            match parse_record(line, record) {
                Ok(conversation) => dataset.push(conversation),
                Err(e) => {
                    warn!(line, error = %e, "skipping invalid record");
                    errors.push(e);
                }
            }
        }
        (dataset, errors)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_jsonl(&read(path)?)
    }

    pub fn load_lenient(path: impl AsRef<Path>) -> Result<(Self, Vec<CodecError>)> {
        let path = path.as_ref();
        Ok(Self::from_jsonl_lenient(&read(path)?))
    }

    /// Write the dataset as JSONL, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CodecError::io(parent, e))?;
        }
        fs::write(path, self.to_jsonl()?).map_err(|e| CodecError::io(path, e))
    }
}

impl FromIterator<Conversation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Conversation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Extend<Conversation> for Dataset {
    fn extend<I: IntoIterator<Item = Conversation>>(&mut self, iter: I) {
        self.conversations.extend(iter);
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CodecError::io(path, e))
}

/// Non-blank lines with their 1-based line numbers.
fn records(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn parse_record(line: usize, record: &str) -> Result<Conversation> {
    serde_json::from_str(record).map_err(|source| CodecError::InvalidRecord { line, source })
}

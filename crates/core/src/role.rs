//! Speaker roles and the boundary scanner that splits transcripts into spans.
//!
//! A boundary is the exact, unescaped sequence `"\n\n<label>: "` where
//! `<label>` belongs to a [`RoleSet`]. Escaped markers carry an extra
//! backslash before the label and therefore never match.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Two-newline prefix that opens every message in a transcript.
pub const MESSAGE_MARKER: &str = "\n\n";

/// Separator between a message label and its body.
pub const LABEL_SEPARATOR: &str = ": ";

static CANONICAL_ROLES: LazyLock<RoleSet> =
    LazyLock::new(|| RoleSet::build(Vec::new()).unwrap());

/// Canonical speaker category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Assistant, Role::System];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Returns the canonical role named exactly `label`, if any.
    pub fn from_label(label: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == label)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of labels recognised as message boundaries.
///
/// Always contains the three canonical roles; callers may add extra labels
/// (speaker names such as `"Alice"`) so those also start new messages.
/// Segmentation, escaping and unescaping of one transcript must all use the
/// same set, otherwise round trips are not guaranteed.
#[derive(Debug, Clone)]
pub struct RoleSet {
    labels: Vec<String>,
    pub(crate) marker_re: Regex,
    pub(crate) escaped_marker_re: Regex,
}

impl RoleSet {
    /// The canonical roles only.
    pub fn canonical() -> &'static RoleSet {
        &CANONICAL_ROLES
    }

    /// Canonical roles plus `extra` labels.
    ///
    /// Fails with [`CodecError::InvalidRole`] for labels that could not be
    /// told apart from message text: empty labels, or labels containing a
    /// newline, a backslash or `": "`.
    pub fn with_extra_roles<I, S>(extra: I) -> Result<RoleSet>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels = Vec::new();
        for label in extra {
            let label = label.into();
            validate_label(&label)?;
            if Role::from_label(&label).is_none() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        RoleSet::build(labels)
    }

    fn build(extra: Vec<String>) -> Result<RoleSet> {
        let labels: Vec<String> = Role::ALL
            .iter()
            .map(|role| role.as_str().to_string())
            .chain(extra)
            .collect();
        let alternation = labels
            .iter()
            .map(|label| regex::escape(label))
            .collect::<Vec<_>>()
            .join("|");

        let marker_re = Regex::new(&format!(r"\n\n({alternation}): "))
            .map_err(|_| CodecError::InvalidRole { label: alternation.clone() })?;
        let escaped_marker_re = Regex::new(&format!(r"\n\n\\({alternation}): "))
            .map_err(|_| CodecError::InvalidRole { label: alternation.clone() })?;

        Ok(RoleSet {
            labels,
            marker_re,
            escaped_marker_re,
        })
    }

    /// All labels in the set, canonical roles first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// True if an unescaped boundary marker starts at byte offset `pos`.
    pub fn boundary_at(&self, text: &str, pos: usize) -> bool {
        let Some(rest) = text
            .get(pos..)
            .and_then(|rest| rest.strip_prefix(MESSAGE_MARKER))
        else {
            return false;
        };
        self.labels.iter().any(|label| {
            rest.strip_prefix(label.as_str())
                .is_some_and(|after| after.starts_with(LABEL_SEPARATOR))
        })
    }

    /// Iterate over the byte offsets at which messages start in `text`.
    pub fn boundaries<'a>(&'a self, text: &'a str) -> BoundaryScanner<'a> {
        BoundaryScanner {
            roles: self,
            text,
            last: None,
            done: text.is_empty(),
        }
    }

    /// Split `text` into message spans, one per boundary.
    ///
    /// The first span always starts at offset 0, whether or not a boundary
    /// marker is present there. Empty text yields no spans.
    pub fn spans<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let offsets: Vec<usize> = self.boundaries(text).collect();
        offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = offsets.get(i + 1).copied().unwrap_or(text.len());
                &text[start..end]
            })
            .collect()
    }
}

impl Default for RoleSet {
    fn default() -> Self {
        RoleSet::canonical().clone()
    }
}

fn validate_label(label: &str) -> Result<()> {
    let unusable = label.is_empty()
        || label.contains('\n')
        || label.contains('\\')
        || label.contains(LABEL_SEPARATOR);
    if unusable {
        return Err(CodecError::InvalidRole {
            label: label.to_string(),
        });
    }
    Ok(())
}

/// Lazy scanner over boundary offsets.
///
/// Yields 0 first, then each later offset where an unescaped marker begins.
/// Every search starts one character past the previous boundary so the
/// marker at that boundary is not matched again.
#[derive(Debug, Clone)]
pub struct BoundaryScanner<'a> {
    roles: &'a RoleSet,
    text: &'a str,
    last: Option<usize>,
    done: bool,
}

impl Iterator for BoundaryScanner<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let Some(last) = self.last else {
            self.last = Some(0);
            return Some(0);
        };

        let step = self.text[last..].chars().next().map_or(1, char::len_utf8);
        let mut from = last + step;
        while let Some(rel) = self.text.get(from..).and_then(|rest| rest.find(MESSAGE_MARKER)) {
            let pos = from + rel;
            if self.roles.boundary_at(self.text, pos) {
                self.last = Some(pos);
                return Some(pos);
            }
            from = pos + 1;
        }

        self.done = true;
        None
    }
}

//! Escaping grammar for message content.
//!
//! Encoding doubles every backslash, then puts a backslash in front of the
//! label of every embedded boundary marker (`"\n\nuser: "` becomes
//! `"\n\n\user: "`). Decoding undoes the two steps in reverse order.

use crate::role::RoleSet;

impl RoleSet {
    /// Escape `content` so that it can be embedded in a transcript.
    pub fn escape(&self, content: &str) -> String {
        let doubled = content.replace('\\', "\\\\");
        self.marker_re
            .replace_all(&doubled, "\n\n\\${1}: ")
            .into_owned()
    }

    /// Inverse of [`RoleSet::escape`].
    pub fn unescape(&self, content: &str) -> String {
        self.escaped_marker_re
            .replace_all(content, "\n\n${1}: ")
            .replace("\\\\", "\\")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_backslashes_and_markers() {
        let roles = RoleSet::canonical();
        assert_eq!(roles.escape("a\\b"), "a\\\\b");
        assert_eq!(roles.escape("x\n\nuser: y"), "x\n\n\\user: y");
        assert_eq!(roles.escape("x\n\n\\user: y"), "x\n\n\\\\user: y");
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let roles = RoleSet::canonical();
        let samples = [
            "",
            "plain text",
            "\\",
            "\\\\",
            "ends with backslash \\",
            "\n\nuser: ",
            "\n\n\\user: ",
            "\n\n\\\\assistant: ",
            "\\\n\nsystem: x",
            "\n\nuser: \n\nassistant: back to back",
            "\n\n\n\nsystem: extra newlines",
            "\n\nUser: not a role",
            "\n\nuser:no space",
        ];
        for sample in samples {
            assert_eq!(roles.unescape(&roles.escape(sample)), sample, "sample {sample:?}");
        }
    }

    #[test]
    fn test_escape_uses_extra_roles() {
        let roles = RoleSet::with_extra_roles(["Alice"]).unwrap();
        assert_eq!(roles.escape("\n\nAlice: hi"), "\n\n\\Alice: hi");
        assert_eq!(RoleSet::canonical().escape("\n\nAlice: hi"), "\n\nAlice: hi");
        assert_eq!(roles.unescape("\n\n\\Alice: hi"), "\n\nAlice: hi");
    }
}

//! Client command lines.
//!
//! A tagged command line is `<tag> <VERB> [args...]`. This module splits the
//! tag and verb off a framed line, hands the remainder to the argument
//! parser, and folds the `UID` prefix into the effective verb.

use super::args::{self, Argument};
use crate::{Error, Result};

/// Command verbs understood by the dispatcher.
///
/// Verbs are matched case-insensitively. Anything else is carried as
/// [`Verb::Unknown`] so the dispatcher can answer it with a tagged `BAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// CAPABILITY
    Capability,
    /// NOOP
    Noop,
    /// LOGOUT
    Logout,
    /// STARTTLS (accepted, always answered `BAD`)
    StartTls,
    /// AUTHENTICATE
    Authenticate,
    /// LOGIN
    Login,
    /// SELECT
    Select,
    /// EXAMINE
    Examine,
    /// CREATE
    Create,
    /// DELETE
    Delete,
    /// RENAME
    Rename,
    /// SUBSCRIBE
    Subscribe,
    /// UNSUBSCRIBE
    Unsubscribe,
    /// LIST
    List,
    /// LSUB
    Lsub,
    /// STATUS
    Status,
    /// APPEND
    Append,
    /// CHECK
    Check,
    /// CLOSE
    Close,
    /// EXPUNGE
    Expunge,
    /// SEARCH
    Search,
    /// FETCH
    Fetch,
    /// STORE
    Store,
    /// COPY
    Copy,
    /// UID (prefix verb, folded away during parsing)
    Uid,
    /// Any verb this engine does not know.
    Unknown(String),
}

impl Verb {
    /// Parses a verb keyword, case-insensitively.
    #[must_use]
    pub fn parse(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "CAPABILITY" => Self::Capability,
            "NOOP" => Self::Noop,
            "LOGOUT" => Self::Logout,
            "STARTTLS" => Self::StartTls,
            "AUTHENTICATE" => Self::Authenticate,
            "LOGIN" => Self::Login,
            "SELECT" => Self::Select,
            "EXAMINE" => Self::Examine,
            "CREATE" => Self::Create,
            "DELETE" => Self::Delete,
            "RENAME" => Self::Rename,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "LIST" => Self::List,
            "LSUB" => Self::Lsub,
            "STATUS" => Self::Status,
            "APPEND" => Self::Append,
            "CHECK" => Self::Check,
            "CLOSE" => Self::Close,
            "EXPUNGE" => Self::Expunge,
            "SEARCH" => Self::Search,
            "FETCH" => Self::Fetch,
            "STORE" => Self::Store,
            "COPY" => Self::Copy,
            "UID" => Self::Uid,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The canonical (uppercase) keyword for this verb.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Authenticate => "AUTHENTICATE",
            Self::Login => "LOGIN",
            Self::Select => "SELECT",
            Self::Examine => "EXAMINE",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Rename => "RENAME",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::List => "LIST",
            Self::Lsub => "LSUB",
            Self::Status => "STATUS",
            Self::Append => "APPEND",
            Self::Check => "CHECK",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::Search => "SEARCH",
            Self::Fetch => "FETCH",
            Self::Store => "STORE",
            Self::Copy => "COPY",
            Self::Uid => "UID",
            Self::Unknown(word) => word,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Client-chosen tag, echoed back in the final tagged response.
    pub tag: String,
    /// Effective verb (after UID folding).
    pub verb: Verb,
    /// Whether the verb was prefixed with `UID`.
    pub uid: bool,
    /// Ordered argument list.
    pub args: Vec<Argument>,
}

/// Extracts the client tag from a framed line without parsing the rest.
///
/// Used to answer a line whose arguments fail to parse: the tagged `BAD`
/// still needs the tag. A line with no tag at all answers as `*`.
#[must_use]
pub fn peek_tag(line: &[u8]) -> String {
    let end = line.iter().position(|&b| b == b' ').unwrap_or(line.len());
    let tag = String::from_utf8_lossy(&line[..end]);
    if tag.is_empty() {
        "*".to_string()
    } else {
        tag.into_owned()
    }
}

/// Parses one framed command line (without its CRLF).
pub fn parse_command(line: &[u8]) -> Result<Command> {
    let mut words = line.splitn(3, |&b| b == b' ');

    let tag = words
        .next()
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| Error::parse(0, "missing command tag"))?;
    let tag = std::str::from_utf8(tag)
        .map_err(|_| Error::parse(0, "invalid UTF-8 in tag"))?
        .to_string();

    let verb = words
        .next()
        .filter(|verb| !verb.is_empty())
        .ok_or_else(|| Error::parse(tag.len(), "missing command verb"))?;
    let verb = std::str::from_utf8(verb)
        .map_err(|_| Error::parse(tag.len() + 1, "invalid UTF-8 in verb"))?;
    let mut verb = Verb::parse(verb);

    let mut args = args::parse_arguments(words.next().unwrap_or_default())?;

    // "UID COPY|FETCH|STORE|SEARCH ..." folds into the prefixed verb with
    // the UID flag recorded. A UID prefix on anything else stays as-is and
    // falls out as an unknown-verb BAD in dispatch.
    let mut uid = false;
    if verb == Verb::Uid {
        let folded = args.first().and_then(Argument::as_text).map(Verb::parse);
        if let Some(inner @ (Verb::Copy | Verb::Fetch | Verb::Store | Verb::Search)) = folded {
            verb = inner;
            uid = true;
            args.remove(0);
        }
    }

    Ok(Command {
        tag,
        verb,
        uid,
        args,
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_login_command() {
        let cmd = parse_command(b"A1 LOGIN \"foo bar\" baz").unwrap();
        assert_eq!(cmd.tag, "A1");
        assert_eq!(cmd.verb, Verb::Login);
        assert!(!cmd.uid);
        assert_eq!(
            cmd.args,
            vec![
                Argument::Atom("foo bar".to_string()),
                Argument::Atom("baz".to_string()),
            ]
        );
    }

    #[test]
    fn test_select_with_list() {
        let cmd = parse_command(b"A2 SELECT (FLAGS UID)").unwrap();
        assert_eq!(cmd.tag, "A2");
        assert_eq!(cmd.verb, Verb::Select);
        assert_eq!(
            cmd.args,
            vec![Argument::List(vec![
                Argument::Atom("FLAGS".to_string()),
                Argument::Atom("UID".to_string()),
            ])]
        );
    }

    #[test]
    fn test_verb_case_insensitive() {
        let cmd = parse_command(b"a3 noop").unwrap();
        assert_eq!(cmd.verb, Verb::Noop);
        assert_eq!(cmd.tag, "a3");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_uid_fetch_folds() {
        let cmd = parse_command(b"A4 UID FETCH 1:3 (UID)").unwrap();
        assert_eq!(cmd.verb, Verb::Fetch);
        assert!(cmd.uid);
        assert_eq!(cmd.args.len(), 2);
        assert_eq!(cmd.args[0], Argument::Atom("1:3".to_string()));
    }

    #[test]
    fn test_uid_with_unsupported_inner_verb_stays_uid() {
        let cmd = parse_command(b"A5 UID NOOP").unwrap();
        assert_eq!(cmd.verb, Verb::Uid);
        assert!(!cmd.uid);
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn test_unknown_verb() {
        let cmd = parse_command(b"A6 FROBNICATE x").unwrap();
        assert_eq!(cmd.verb, Verb::Unknown("FROBNICATE".to_string()));
        assert_eq!(cmd.verb.keyword(), "FROBNICATE");
    }

    #[test]
    fn test_missing_verb_is_error() {
        assert!(parse_command(b"A7").is_err());
        assert!(parse_command(b"A7 ").is_err());
    }

    #[test]
    fn test_empty_line_is_error() {
        assert!(parse_command(b"").is_err());
    }

    #[test]
    fn test_peek_tag() {
        assert_eq!(peek_tag(b"A8 NOOP"), "A8");
        assert_eq!(peek_tag(b"A8"), "A8");
        assert_eq!(peek_tag(b""), "*");
    }

    #[test]
    fn test_bad_arguments_still_error() {
        assert!(parse_command(b"A9 FETCH {10}").is_err());
    }
}

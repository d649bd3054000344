//! Embedder extension points.
//!
//! The engine owns session lifecycle, syntax, and sequencing; everything it
//! cannot know — whether to admit a connection, whether credentials are
//! valid, what mailboxes exist — is asked of an [`ImapHandler`]. Handlers
//! may be synchronous or do real I/O; while one is running, only that
//! connection's processing is suspended.
//!
//! # Example
//!
//! ```ignore
//! use letterbox_imap::{Admission, AuthDecision, HandlerError, ImapHandler, MailboxInfo};
//! use letterbox_imap::server::Connection;
//!
//! struct SingleUser;
//!
//! impl ImapHandler for SingleUser {
//!     type Data = ();
//!
//!     async fn on_auth(
//!         &self,
//!         _conn: &mut Connection<()>,
//!         username: &str,
//!         password: &str,
//!     ) -> Result<AuthDecision, HandlerError> {
//!         if username == "alice" && password == "sesame" {
//!             Ok(AuthDecision::Accept(None))
//!         } else {
//!             Ok(AuthDecision::Reject(Some("bad credentials".into())))
//!         }
//!     }
//! }
//! ```

use crate::server::Connection;

/// Opaque error type a handler may fail with.
///
/// Handler faults are contained at the dispatch boundary: the offending
/// command answers with a tagged `BAD` and the connection stays usable.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Admission decision for a freshly accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Greet with `OK` and start unauthenticated.
    RequireLogin,
    /// Greet with `PREAUTH` and start authenticated.
    Preauth,
    /// Send `BYE` with the optional reason and close.
    Reject(Option<String>),
}

/// Verdict on a LOGIN or AUTHENTICATE attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Credentials accepted; optional text for the tagged `OK`.
    Accept(Option<String>),
    /// Credentials rejected; optional text for the tagged `NO`.
    Reject(Option<String>),
}

/// One mailbox as described by the embedder.
///
/// Hierarchy is expressed through `children`; the engine flattens ancestor
/// chains with `/` when listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Mailbox name (one hierarchy level, no separator).
    pub name: String,
    /// Optional embedder-side identifier; never interpreted by the engine.
    pub id: Option<String>,
    /// Flags defined for messages in this mailbox (e.g. `\Seen`).
    pub flags: Vec<String>,
    /// Flags the client may change permanently.
    pub permanent_flags: Vec<String>,
    /// Total message count.
    pub messages: u32,
    /// Count of unseen messages.
    pub unseen: u32,
    /// Count of recent messages, if tracked.
    pub recent: Option<u32>,
    /// Nested sub-mailboxes.
    pub children: Vec<MailboxInfo>,
}

impl MailboxInfo {
    /// Creates an empty mailbox descriptor with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Flattens a mailbox hierarchy depth-first, parent before children,
/// joining each ancestor chain with `/`.
#[must_use]
pub fn flatten_mailboxes(boxes: &[MailboxInfo]) -> Vec<(String, &MailboxInfo)> {
    fn walk<'a>(
        mailbox: &'a MailboxInfo,
        prefix: Option<&str>,
        out: &mut Vec<(String, &'a MailboxInfo)>,
    ) {
        let path = match prefix {
            Some(prefix) => format!("{prefix}/{}", mailbox.name),
            None => mailbox.name.clone(),
        };
        out.push((path.clone(), mailbox));
        for child in &mailbox.children {
            walk(child, Some(&path), out);
        }
    }

    let mut out = Vec::new();
    for mailbox in boxes {
        walk(mailbox, None, &mut out);
    }
    out
}

/// Callbacks supplied by the embedding application.
///
/// All methods have defaults: a handler that implements nothing admits
/// every connection with a login requirement and then refuses every
/// authentication attempt.
pub trait ImapHandler: Send + Sync + 'static {
    /// Per-connection application state. Owned by the [`Connection`],
    /// never interpreted by the engine.
    type Data: Default + Send + 'static;

    /// Decides the greeting and initial state; called once per accepted
    /// socket, before anything is written.
    fn on_connection(
        &self,
        conn: &mut Connection<Self::Data>,
    ) -> impl Future<Output = Admission> + Send {
        let _ = conn;
        async { Admission::RequireLogin }
    }

    /// Notified exactly once when the connection tears down, whether by
    /// LOGOUT, rejection, peer close, or fatal error.
    fn on_close(&self, conn: &mut Connection<Self::Data>) -> impl Future<Output = ()> + Send {
        let _ = conn;
        async {}
    }

    /// Verifies credentials for LOGIN and AUTHENTICATE PLAIN.
    ///
    /// The default refuses every attempt, matching an embedder that
    /// supplies no credential store.
    fn on_auth(
        &self,
        conn: &mut Connection<Self::Data>,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthDecision, HandlerError>> + Send {
        let _ = (conn, username, password);
        async { Ok(AuthDecision::Reject(None)) }
    }

    /// Returns the connection's mailbox set, queried by SELECT, EXAMINE,
    /// LIST, LSUB, STATUS and FETCH.
    fn on_boxes(
        &self,
        conn: &mut Connection<Self::Data>,
    ) -> impl Future<Output = Result<Vec<MailboxInfo>, HandlerError>> + Send {
        let _ = conn;
        async { Ok(Vec::new()) }
    }

    /// Reserved extension point for observing unknown command lines.
    ///
    /// Not currently invoked by dispatch.
    fn on_unknown_command(
        &self,
        conn: &mut Connection<Self::Data>,
        raw: &[u8],
    ) -> impl Future<Output = ()> + Send {
        let _ = (conn, raw);
        async {}
    }
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

    fn boxes() -> Vec<MailboxInfo> {
        let mut inbox = MailboxInfo::new("INBOX");
        let mut work = MailboxInfo::new("work");
        work.children.push(MailboxInfo::new("reports"));
        inbox.children.push(work);
        inbox.children.push(MailboxInfo::new("personal"));
        vec![inbox, MailboxInfo::new("Archive")]
    }

    #[test]
    fn test_flatten_order_and_paths() {
        let boxes = boxes();
        let flat = flatten_mailboxes(&boxes);
        let paths: Vec<_> = flat.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "INBOX",
                "INBOX/work",
                "INBOX/work/reports",
                "INBOX/personal",
                "Archive",
            ]
        );
    }

    #[test]
    fn test_flatten_keeps_descriptor_reference() {
        let mut mailbox = MailboxInfo::new("INBOX");
        mailbox.messages = 7;
        let boxes = vec![mailbox];

        let flat = flatten_mailboxes(&boxes);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].1.messages, 7);
    }

    #[test]
    fn test_flatten_empty() {
        assert!(flatten_mailboxes(&[]).is_empty());
    }
}

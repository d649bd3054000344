//! Server response descriptors and their wire encoding.
//!
//! Responses are ephemeral values describing one server line. Encoding is a
//! pure function of the descriptor; the session writes the bytes and, for a
//! continuation request, switches into its raw-line wait.

use bytes::BytesMut;

/// Completion condition of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success.
    Ok,
    /// Operational failure.
    No,
    /// Protocol-level error (syntax, state, arguments).
    Bad,
}

impl Status {
    /// The wire keyword for this status.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

/// One server response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `<tag|*> <OK|NO|BAD> <text>` — tagged when `tag` is present,
    /// untagged otherwise. Missing text falls back to the status keyword.
    Status {
        /// Echo of the client's tag, or `None` for an untagged line.
        tag: Option<String>,
        /// Completion condition.
        status: Status,
        /// Human-readable text.
        text: Option<String>,
    },
    /// `* PREAUTH <text>` greeting.
    Preauth {
        /// Greeting text.
        text: Option<String>,
    },
    /// `* BYE <text>` before closing the connection.
    Bye {
        /// Farewell text.
        text: Option<String>,
    },
    /// `+ <text>` continuation request; never carries a tag.
    Continue {
        /// Prompt text.
        text: Option<String>,
    },
    /// `* CAPABILITY <caps...>` announcement.
    Capability(Vec<String>),
    /// A raw pre-formatted line for per-command response shapes
    /// (FETCH results, LIST entries, STATUS lines).
    Raw(Vec<u8>),
}

impl Response {
    /// Tagged `OK`.
    pub fn ok(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Status {
            tag: Some(tag.into()),
            status: Status::Ok,
            text: Some(text.into()),
        }
    }

    /// Tagged `NO`.
    pub fn no(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Status {
            tag: Some(tag.into()),
            status: Status::No,
            text: Some(text.into()),
        }
    }

    /// Tagged `BAD`.
    pub fn bad(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Status {
            tag: Some(tag.into()),
            status: Status::Bad,
            text: Some(text.into()),
        }
    }

    /// Untagged `* OK`.
    pub fn untagged_ok(text: impl Into<String>) -> Self {
        Self::Status {
            tag: None,
            status: Status::Ok,
            text: Some(text.into()),
        }
    }

    /// `* BYE`.
    pub fn bye(text: Option<String>) -> Self {
        Self::Bye { text }
    }

    /// A raw pre-formatted line, CRLF appended during encoding.
    pub fn raw(line: impl Into<Vec<u8>>) -> Self {
        Self::Raw(line.into())
    }

    /// Whether this response suspends the command for a continuation reply.
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }

    /// Encodes this response into wire bytes, including the CRLF.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Encodes this response onto the end of `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Status { tag, status, text } => {
                buf.extend_from_slice(tag.as_deref().unwrap_or("*").as_bytes());
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(status.keyword().as_bytes());
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(text.as_deref().unwrap_or(status.keyword()).as_bytes());
            }
            Self::Preauth { text } => {
                buf.extend_from_slice(b"* PREAUTH ");
                buf.extend_from_slice(text.as_deref().unwrap_or("PREAUTH").as_bytes());
            }
            Self::Bye { text } => {
                buf.extend_from_slice(b"* BYE ");
                buf.extend_from_slice(text.as_deref().unwrap_or("BYE").as_bytes());
            }
            Self::Continue { text } => {
                buf.extend_from_slice(b"+ ");
                buf.extend_from_slice(text.as_deref().unwrap_or_default().as_bytes());
            }
            Self::Capability(caps) => {
                buf.extend_from_slice(b"* CAPABILITY");
                for cap in caps {
                    buf.extend_from_slice(b" ");
                    buf.extend_from_slice(cap.as_bytes());
                }
            }
            Self::Raw(line) => {
                buf.extend_from_slice(line);
            }
        }
        buf.extend_from_slice(b"\r\n");
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

    fn encoded(response: &Response) -> String {
        String::from_utf8(response.encode()).unwrap()
    }

    #[test]
    fn test_tagged_ok() {
        let r = Response::ok("A1", "LOGIN completed");
        assert_eq!(encoded(&r), "A1 OK LOGIN completed\r\n");
    }

    #[test]
    fn test_tagged_bad_default_text() {
        let r = Response::Status {
            tag: Some("A2".to_string()),
            status: Status::Bad,
            text: None,
        };
        assert_eq!(encoded(&r), "A2 BAD BAD\r\n");
    }

    #[test]
    fn test_untagged_ok() {
        let r = Response::untagged_ok("IMAP4rev1 Service Ready");
        assert_eq!(encoded(&r), "* OK IMAP4rev1 Service Ready\r\n");
    }

    #[test]
    fn test_preauth() {
        let r = Response::Preauth {
            text: Some("IMAP4rev1 logged in".to_string()),
        };
        assert_eq!(encoded(&r), "* PREAUTH IMAP4rev1 logged in\r\n");
    }

    #[test]
    fn test_bye() {
        let r = Response::bye(Some("logout".to_string()));
        assert_eq!(encoded(&r), "* BYE logout\r\n");

        let r = Response::bye(None);
        assert_eq!(encoded(&r), "* BYE BYE\r\n");
    }

    #[test]
    fn test_continuation() {
        let r = Response::Continue { text: None };
        assert_eq!(encoded(&r), "+ \r\n");
        assert!(r.is_continuation());

        let r = Response::Continue {
            text: Some("ready".to_string()),
        };
        assert_eq!(encoded(&r), "+ ready\r\n");
    }

    #[test]
    fn test_capability() {
        let r = Response::Capability(vec!["IMAP4rev1".to_string()]);
        assert_eq!(encoded(&r), "* CAPABILITY IMAP4rev1\r\n");
    }

    #[test]
    fn test_raw() {
        let r = Response::raw(b"* 10 EXISTS".to_vec());
        assert_eq!(encoded(&r), "* 10 EXISTS\r\n");
        assert!(!r.is_continuation());
    }
}

//! # letterbox-imap
//!
//! An embeddable server-side IMAP4rev1 (RFC 3501) protocol engine: it
//! owns the wire protocol and delegates every domain decision to the
//! embedding application through the [`ImapHandler`] trait.
//!
//! ## Features
//!
//! - **Line framing**: CRLF-delimited command reassembly that is
//!   invariant under arbitrary TCP fragmentation
//! - **Recursive argument parsing**: quoted strings, parenthesized and
//!   bracketed lists, NIL, numbers, and `BODY[...]` section syntax
//! - **Session state machine**: per-state command legality enforced
//!   before any collaborator is consulted
//! - **Continuation sub-protocol**: `AUTHENTICATE PLAIN` with `+`
//!   requests and client-side `*` cancellation
//! - **One task per connection**: strictly sequential processing inside
//!   a connection, full isolation across connections
//!
//! ## Quick Start
//!
//! ```ignore
//! use letterbox_imap::{
//!     AuthDecision, Connection, HandlerError, ImapHandler, ImapServer,
//!     MailboxInfo, ServerConfig,
//! };
//!
//! struct App;
//!
//! impl ImapHandler for App {
//!     type Data = ();
//!
//!     async fn on_auth(
//!         &self,
//!         _conn: &mut Connection<()>,
//!         username: &str,
//!         password: &str,
//!     ) -> Result<AuthDecision, HandlerError> {
//!         if username == "user" && password == "pass" {
//!             Ok(AuthDecision::Accept(None))
//!         } else {
//!             Ok(AuthDecision::Reject(None))
//!         }
//!     }
//!
//!     async fn on_boxes(
//!         &self,
//!         _conn: &mut Connection<()>,
//!     ) -> Result<Vec<MailboxInfo>, HandlerError> {
//!         Ok(vec![MailboxInfo::new("INBOX")])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> letterbox_imap::Result<()> {
//!     ImapServer::new(App, ServerConfig::new(1143)).run().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌─────────────────────┐
//! │   NotAuthenticated  │ ─── LOGIN / AUTHENTICATE ───→ Authenticated
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    Authenticated    │ ─── SELECT / EXAMINE ───→ Selected
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      Selected       │ ─── CLOSE ───→ Authenticated
//! └─────────────────────┘
//! ```
//!
//! Any state may reach `Disconnected` via LOGOUT or socket closure.
//!
//! ## Modules
//!
//! - [`framing`]: CRLF line reassembly over a byte stream
//! - [`protocol`]: argument grammar, command envelope, responses,
//!   sequence sets, and the session state machine
//! - [`handler`]: the delegation trait and its supporting types
//! - [`server`]: accept loop, per-connection sessions, configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod framing;
pub mod handler;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};
pub use handler::{
    Admission, AuthDecision, HandlerError, ImapHandler, MailboxInfo, flatten_mailboxes,
};
pub use protocol::args::{Argument, parse_arguments};
pub use protocol::command::{Command, Verb, parse_command};
pub use protocol::response::{Response, Status};
pub use protocol::sequence::{SeqBound, SeqItem, SequenceSet};
pub use protocol::state::{SelectedState, SessionState};
pub use server::{Connection, ImapServer, Security, ServerConfig, ServerConfigBuilder};

/// Capabilities advertised by `* CAPABILITY` responses.
pub const CAPABILITIES: &[&str] = &["IMAP4rev1"];

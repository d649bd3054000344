//! Per-connection processing: the supervisor loop, command dispatch, and
//! the continuation sub-protocol.
//!
//! Each accepted socket gets one [`Session`] running on its own task.
//! Within a session everything is strictly sequential: a new command line
//! is never parsed while a prior command's response (including a pending
//! continuation) is outstanding, so no locks are needed.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::framing::LineBuffer;
use crate::handler::{Admission, AuthDecision, ImapHandler, flatten_mailboxes};
use crate::protocol::args::Argument;
use crate::protocol::command::{self, Command, Verb};
use crate::protocol::response::Response;
use crate::protocol::sequence::SequenceSet;
use crate::protocol::state::{SelectedState, SessionState};
use crate::server::connection::Connection;
use crate::{CAPABILITIES, Result};

/// A client aborts a pending continuation by sending this token alone.
const CANCEL_TOKEN: &[u8] = b"*";

/// Read chunk size for the socket.
const READ_CHUNK: usize = 4096;

/// One connection's processing context.
pub(crate) struct Session<H: ImapHandler> {
    stream: TcpStream,
    lines: LineBuffer,
    conn: Connection<H::Data>,
    handler: Arc<H>,
}

impl<H: ImapHandler> Session<H> {
    pub(crate) fn new(stream: TcpStream, conn: Connection<H::Data>, handler: Arc<H>) -> Self {
        Self {
            stream,
            lines: LineBuffer::new(),
            conn,
            handler,
        }
    }

    /// Drives the connection to completion and tears it down.
    ///
    /// The close collaborator fires exactly once, from here, regardless of
    /// how the connection ended.
    pub(crate) async fn run(mut self) {
        if let Err(error) = self.serve().await {
            debug!(conn = self.conn.id(), error = %error, "connection ended with error");
        }
        self.conn.state = SessionState::Disconnected;
        self.handler.on_close(&mut self.conn).await;
        info!(conn = self.conn.id(), "client disconnected");
    }

    async fn serve(&mut self) -> Result<()> {
        info!(conn = self.conn.id(), peer = %self.conn.peer(), "client connected");

        match self.handler.on_connection(&mut self.conn).await {
            Admission::Reject(reason) => {
                self.write(&Response::bye(reason)).await?;
                self.conn.state = SessionState::Disconnected;
                self.stream.shutdown().await?;
                return Ok(());
            }
            Admission::RequireLogin => {
                self.conn.state = SessionState::NotAuthenticated;
                self.write(&Response::untagged_ok("IMAP4rev1 Service Ready"))
                    .await?;
            }
            Admission::Preauth => {
                self.conn.state = SessionState::Authenticated;
                self.write(&Response::Preauth {
                    text: Some("IMAP4rev1 logged in".to_string()),
                })
                .await?;
            }
        }

        while !self.conn.state().is_disconnected() {
            let Some(line) = self.next_line().await? else {
                break; // peer closed
            };
            self.dispatch(&line).await?;
        }
        Ok(())
    }

    /// Waits for the next complete line, continuation-aware by virtue of
    /// being the single read point: whoever awaits it next gets the line.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.lines.next_line()? {
                return Ok(Some(line));
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.lines.feed(&chunk[..n]);
        }
    }

    async fn write(&mut self, response: &Response) -> Result<()> {
        self.stream.write_all(&response.encode()).await?;
        Ok(())
    }

    /// Encodes a burst of responses into one buffer and writes it whole.
    async fn write_many(&mut self, responses: &[Response]) -> Result<()> {
        let mut buf = BytesMut::new();
        for response in responses {
            response.encode_into(&mut buf);
        }
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Parses and executes one command line.
    ///
    /// Per-command failures (syntax, argument shape, state, handler faults)
    /// answer with a tagged `BAD`/`NO` and leave the connection open; only
    /// I/O errors propagate.
    async fn dispatch(&mut self, line: &[u8]) -> Result<()> {
        let cmd = match command::parse_command(line) {
            Ok(cmd) => cmd,
            Err(error) => {
                let tag = command::peek_tag(line);
                debug!(conn = self.conn.id(), %tag, %error, "unparsable command");
                return self
                    .write(&Response::bad(tag, format!("cannot parse command: {error}")))
                    .await;
            }
        };

        debug!(
            conn = self.conn.id(),
            tag = %cmd.tag,
            verb = %cmd.verb,
            uid = cmd.uid,
            "dispatch"
        );

        if let Some(denial) = self.precondition_failure(&cmd.verb) {
            return self.write(&Response::bad(cmd.tag, denial)).await;
        }

        match cmd.verb.clone() {
            Verb::Capability => self.cmd_capability(&cmd).await,
            Verb::Noop => self.cmd_noop(&cmd).await,
            Verb::Logout => self.cmd_logout(&cmd).await,
            Verb::StartTls => self.write(&Response::bad(cmd.tag, "TLS unsupported")).await,
            Verb::Authenticate => self.cmd_authenticate(&cmd).await,
            Verb::Login => self.cmd_login(&cmd).await,
            Verb::Select => self.cmd_select(&cmd, false).await,
            Verb::Examine => self.cmd_select(&cmd, true).await,
            Verb::List => self.cmd_list(&cmd, false).await,
            Verb::Lsub => self.cmd_list(&cmd, true).await,
            Verb::Status => self.cmd_status(&cmd).await,
            Verb::Fetch => self.cmd_fetch(&cmd).await,
            Verb::Close => self.cmd_close(&cmd).await,
            Verb::Create
            | Verb::Delete
            | Verb::Rename
            | Verb::Subscribe
            | Verb::Unsubscribe
            | Verb::Append
            | Verb::Check
            | Verb::Expunge
            | Verb::Search
            | Verb::Store
            | Verb::Copy => {
                // Accepted without delegation: the engine owns sequencing,
                // not mailbox mutation.
                self.write(&Response::ok(
                    cmd.tag.clone(),
                    format!("{} completed", cmd.verb.keyword()),
                ))
                .await
            }
            Verb::Uid | Verb::Unknown(_) => {
                self.write(&Response::bad(cmd.tag, "unknown command")).await
            }
        }
    }

    /// Checks the per-state legality table before any argument validation.
    ///
    /// Returns the denial text when the verb is illegal in the current
    /// state; external collaborators are never consulted for denied
    /// commands.
    fn precondition_failure(&self, verb: &Verb) -> Option<&'static str> {
        match verb {
            Verb::Capability
            | Verb::Noop
            | Verb::Logout
            | Verb::StartTls
            | Verb::Uid
            | Verb::Unknown(_) => None,
            Verb::Authenticate | Verb::Login => {
                if matches!(self.conn.state(), SessionState::NotAuthenticated) {
                    None
                } else {
                    Some("already authenticated")
                }
            }
            Verb::Close => {
                if self.conn.state().is_selected() {
                    None
                } else {
                    Some("no mailbox selected")
                }
            }
            _ => {
                if self.conn.state().is_authenticated() {
                    None
                } else {
                    Some("not authenticated")
                }
            }
        }
    }

    /// Validates the argument count, answering `BAD` on mismatch.
    ///
    /// Returns false when the command was already answered.
    async fn check_arg_count(&mut self, cmd: &Command, expected: usize) -> Result<bool> {
        if cmd.args.len() == expected {
            return Ok(true);
        }
        self.write(&Response::bad(
            cmd.tag.clone(),
            format!(
                "unexpected amount of arguments ({} instead of {})",
                cmd.args.len(),
                expected
            ),
        ))
        .await?;
        Ok(false)
    }

    async fn cmd_capability(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 0).await? {
            return Ok(());
        }
        self.write_many(&[
            Response::Capability(CAPABILITIES.iter().map(ToString::to_string).collect()),
            Response::ok(cmd.tag.clone(), "CAPABILITY completed"),
        ])
        .await
    }

    async fn cmd_noop(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 0).await? {
            return Ok(());
        }
        self.write(&Response::ok(cmd.tag.clone(), "NOOP completed"))
            .await
    }

    async fn cmd_logout(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 0).await? {
            return Ok(());
        }
        self.write_many(&[
            Response::bye(Some("logout".to_string())),
            Response::ok(cmd.tag.clone(), "LOGOUT completed"),
        ])
        .await?;
        self.conn.state = SessionState::Disconnected;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// AUTHENTICATE, currently PLAIN only (RFC 4616 exchange).
    ///
    /// Emitting the continuation request arms the raw-line wait: the next
    /// complete line is consumed here, verbatim, instead of being parsed as
    /// a command. At most one continuation is outstanding per connection,
    /// which holds structurally because this method awaits the reply before
    /// dispatch can touch the stream again.
    async fn cmd_authenticate(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 1).await? {
            return Ok(());
        }
        let mechanism = cmd.args[0].as_text().unwrap_or_default();
        if !mechanism.eq_ignore_ascii_case("PLAIN") {
            return self
                .write(&Response::no(
                    cmd.tag.clone(),
                    "unsupported authentication mechanism",
                ))
                .await;
        }

        self.write(&Response::Continue { text: None }).await?;

        let Some(reply) = self.next_line().await? else {
            // Peer vanished mid-exchange; unwind without further responses.
            self.conn.state = SessionState::Disconnected;
            return Ok(());
        };

        if reply == CANCEL_TOKEN {
            return self
                .write(&Response::bad(cmd.tag.clone(), "authentication cancelled"))
                .await;
        }

        let Some((username, password)) = decode_plain(&reply) else {
            return self
                .write(&Response::bad(
                    cmd.tag.clone(),
                    "invalid AUTHENTICATE PLAIN response",
                ))
                .await;
        };

        self.auth_attempt(&cmd.tag, &username, &password).await
    }

    async fn cmd_login(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 2).await? {
            return Ok(());
        }
        let (Some(username), Some(password)) = (cmd.args[0].as_text(), cmd.args[1].as_text())
        else {
            return self
                .write(&Response::bad(
                    cmd.tag.clone(),
                    "username and password must be strings",
                ))
                .await;
        };
        let (username, password) = (username.to_string(), password.to_string());
        self.auth_attempt(&cmd.tag, &username, &password).await
    }

    /// Shared LOGIN/AUTHENTICATE verdict handling.
    async fn auth_attempt(&mut self, tag: &str, username: &str, password: &str) -> Result<()> {
        match self
            .handler
            .on_auth(&mut self.conn, username, password)
            .await
        {
            Ok(AuthDecision::Accept(reason)) => {
                self.conn.state = SessionState::Authenticated;
                self.write(&Response::ok(
                    tag,
                    reason.unwrap_or_else(|| "authenticated".to_string()),
                ))
                .await
            }
            Ok(AuthDecision::Reject(reason)) => {
                self.write(&Response::no(
                    tag,
                    reason.unwrap_or_else(|| "unable to authenticate".to_string()),
                ))
                .await
            }
            Err(error) => {
                warn!(conn = self.conn.id(), %error, "auth handler fault");
                self.write(&Response::bad(tag, "unable to handle client input"))
                    .await
            }
        }
    }

    async fn cmd_select(&mut self, cmd: &Command, read_only: bool) -> Result<()> {
        if !self.check_arg_count(cmd, 1).await? {
            return Ok(());
        }
        let Some(name) = cmd.args[0].astring() else {
            return self
                .write(&Response::bad(cmd.tag.clone(), "expected a mailbox name"))
                .await;
        };
        let name = normalize_mailbox(&name);
        let verb = if read_only { "EXAMINE" } else { "SELECT" };

        let boxes = match self.handler.on_boxes(&mut self.conn).await {
            Ok(boxes) => boxes,
            Err(error) => {
                warn!(conn = self.conn.id(), %error, "mailbox handler fault");
                return self
                    .write(&Response::bad(cmd.tag.clone(), "unable to handle client input"))
                    .await;
            }
        };

        let flat = flatten_mailboxes(&boxes);
        let Some((path, info)) = flat.into_iter().find(|(path, _)| *path == name) else {
            // Deselect on failure, per RFC 3501 section 6.3.1.
            self.conn.state = SessionState::Authenticated;
            return self
                .write(&Response::no(cmd.tag.clone(), "no such mailbox"))
                .await;
        };

        let permanent = if read_only {
            // Examine is read-only regardless of declared permanent flags.
            String::new()
        } else {
            info.permanent_flags.join(" ")
        };
        self.write_many(&[
            Response::raw(format!("* {} EXISTS", info.messages).into_bytes()),
            Response::raw(format!("* {} RECENT", info.recent.unwrap_or(0)).into_bytes()),
            Response::raw(format!("* OK [UNSEEN {}] unseen", info.unseen).into_bytes()),
            Response::raw(format!("* FLAGS ({})", info.flags.join(" ")).into_bytes()),
            Response::raw(format!("* OK [PERMANENTFLAGS ({permanent})] flags permitted").into_bytes()),
            Response::ok(
                cmd.tag.clone(),
                format!(
                    "[{}] {verb} completed",
                    if read_only { "READ-ONLY" } else { "READ-WRITE" }
                ),
            ),
        ])
        .await?;

        // The transition takes effect only after the full preamble went out.
        self.conn.state = SessionState::Selected(SelectedState {
            mailbox: path,
            read_only,
        });
        Ok(())
    }

    /// LIST and LSUB. Pattern arguments are accepted but ignored; the
    /// collaborator's set is emitted unfiltered.
    async fn cmd_list(&mut self, cmd: &Command, lsub: bool) -> Result<()> {
        let keyword = if lsub { "LSUB" } else { "LIST" };

        let boxes = match self.handler.on_boxes(&mut self.conn).await {
            Ok(boxes) => boxes,
            Err(error) => {
                warn!(conn = self.conn.id(), %error, "mailbox handler fault");
                return self
                    .write(&Response::bad(cmd.tag.clone(), "unable to handle client input"))
                    .await;
            }
        };

        let mut responses = Vec::new();
        for (path, _) in flatten_mailboxes(&boxes) {
            responses.push(Response::raw(
                format!("* {keyword} () \"/\" {path}").into_bytes(),
            ));
        }
        responses.push(Response::ok(cmd.tag.clone(), format!("{keyword} completed")));
        self.write_many(&responses).await
    }

    async fn cmd_status(&mut self, cmd: &Command) -> Result<()> {
        let Some(name) = cmd.args.first().and_then(Argument::astring) else {
            return self
                .write(&Response::bad(cmd.tag.clone(), "expected a mailbox name"))
                .await;
        };
        let name = normalize_mailbox(&name);

        let boxes = match self.handler.on_boxes(&mut self.conn).await {
            Ok(boxes) => boxes,
            Err(error) => {
                warn!(conn = self.conn.id(), %error, "mailbox handler fault");
                return self
                    .write(&Response::bad(cmd.tag.clone(), "unable to handle client input"))
                    .await;
            }
        };

        let flat = flatten_mailboxes(&boxes);
        let Some((path, info)) = flat.into_iter().find(|(path, _)| *path == name) else {
            return self
                .write(&Response::no(cmd.tag.clone(), "no such mailbox"))
                .await;
        };

        self.write_many(&[
            Response::raw(
                format!(
                    "* STATUS {path} (MESSAGES {} RECENT {} UNSEEN {})",
                    info.messages,
                    info.recent.unwrap_or(0),
                    info.unseen
                )
                .into_bytes(),
            ),
            Response::ok(cmd.tag.clone(), "STATUS completed"),
        ])
        .await
    }

    /// FETCH and UID FETCH with the placeholder per-message line shape.
    async fn cmd_fetch(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 2).await? {
            return Ok(());
        }
        let (Some(set_text), Some(_items)) = (cmd.args[0].astring(), cmd.args[1].as_list())
        else {
            return self
                .write(&Response::bad(
                    cmd.tag.clone(),
                    "expected a sequence set and an item list",
                ))
                .await;
        };

        let set = match SequenceSet::parse(&set_text) {
            Ok(set) => set,
            Err(error) => {
                return self
                    .write(&Response::bad(cmd.tag.clone(), format!("{error}")))
                    .await;
            }
        };

        let highest = match self.conn.selected_mailbox().map(str::to_string) {
            Some(selected) => match self.handler.on_boxes(&mut self.conn).await {
                Ok(boxes) => flatten_mailboxes(&boxes)
                    .into_iter()
                    .find(|(path, _)| *path == selected)
                    .map_or(0, |(_, info)| info.messages),
                Err(error) => {
                    warn!(conn = self.conn.id(), %error, "mailbox handler fault");
                    return self
                        .write(&Response::bad(cmd.tag.clone(), "unable to handle client input"))
                        .await;
                }
            },
            None => 0,
        };

        let mut responses = Vec::new();
        for seq in set.expand(highest) {
            responses.push(Response::raw(
                format!("* {seq} FETCH (FLAGS (\\Seen) UID {seq})").into_bytes(),
            ));
        }
        responses.push(Response::ok(cmd.tag.clone(), "FETCH completed"));
        self.write_many(&responses).await
    }

    async fn cmd_close(&mut self, cmd: &Command) -> Result<()> {
        if !self.check_arg_count(cmd, 0).await? {
            return Ok(());
        }
        self.conn.state = SessionState::Authenticated;
        self.write(&Response::ok(cmd.tag.clone(), "CLOSE completed"))
            .await
    }
}

/// Case-insensitive match is reserved for the literal name INBOX.
fn normalize_mailbox(name: &str) -> String {
    if name.eq_ignore_ascii_case("INBOX") {
        "INBOX".to_string()
    } else {
        name.to_string()
    }
}

/// Decodes a base64 SASL PLAIN message (`authzid NUL authcid NUL passwd`)
/// into username and password.
fn decode_plain(reply: &[u8]) -> Option<(String, String)> {
    let decoded = BASE64.decode(reply).ok()?;
    let first = decoded.iter().position(|&b| b == 0)?;
    let second = first + 1 + decoded[first + 1..].iter().position(|&b| b == 0)?;
    let username = std::str::from_utf8(&decoded[first + 1..second]).ok()?;
    let password = std::str::from_utf8(&decoded[second + 1..]).ok()?;
    Some((username.to_string(), password.to_string()))
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
    fn test_normalize_mailbox() {
        assert_eq!(normalize_mailbox("inbox"), "INBOX");
        assert_eq!(normalize_mailbox("InBoX"), "INBOX");
        assert_eq!(normalize_mailbox("Archive"), "Archive");
        assert_eq!(normalize_mailbox("archive"), "archive");
    }

    #[test]
    fn test_decode_plain() {
        let message = BASE64.encode(b"\0alice\0sesame");
        let (username, password) = decode_plain(message.as_bytes()).unwrap();
        assert_eq!(username, "alice");
        assert_eq!(password, "sesame");
    }

    #[test]
    fn test_decode_plain_with_authzid() {
        let message = BASE64.encode(b"admin\0alice\0sesame");
        let (username, password) = decode_plain(message.as_bytes()).unwrap();
        assert_eq!(username, "alice");
        assert_eq!(password, "sesame");
    }

    #[test]
    fn test_decode_plain_rejects_garbage() {
        assert!(decode_plain(b"!!not-base64!!").is_none());

        let missing_nul = BASE64.encode(b"alice-sesame");
        assert!(decode_plain(missing_nul.as_bytes()).is_none());

        let one_nul = BASE64.encode(b"\0alice-sesame");
        assert!(decode_plain(one_nul.as_bytes()).is_none());
    }
}

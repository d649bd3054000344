//! End-to-end tests over a loopback socket.
//!
//! Each test binds port 0, runs the accept loop on a background task,
//! and talks to the engine exactly like an IMAP client would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};

use letterbox_imap::{
    Admission, AuthDecision, Connection, HandlerError, ImapHandler, ImapServer, MailboxInfo,
    ServerConfig,
};

/// Per-test behavior knobs for the shared handler.
#[derive(Default)]
struct TestHandler {
    preauth: bool,
    reject_reason: Option<String>,
    auth_faults: bool,
    closes: Arc<AtomicU32>,
}

impl ImapHandler for TestHandler {
    type Data = ();

    async fn on_connection(&self, _conn: &mut Connection<()>) -> Admission {
        if let Some(reason) = &self.reject_reason {
            Admission::Reject(Some(reason.clone()))
        } else if self.preauth {
            Admission::Preauth
        } else {
            Admission::RequireLogin
        }
    }

    async fn on_close(&self, _conn: &mut Connection<()>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_auth(
        &self,
        _conn: &mut Connection<()>,
        username: &str,
        password: &str,
    ) -> Result<AuthDecision, HandlerError> {
        if self.auth_faults {
            return Err("credential store offline".into());
        }
        if username == "alice" && password == "sesame" {
            Ok(AuthDecision::Accept(None))
        } else {
            Ok(AuthDecision::Reject(None))
        }
    }

    async fn on_boxes(&self, _conn: &mut Connection<()>) -> Result<Vec<MailboxInfo>, HandlerError> {
        let mut inbox = MailboxInfo::new("INBOX");
        inbox.messages = 3;
        inbox.unseen = 1;
        inbox.recent = Some(2);
        inbox.flags = vec!["\\Seen".to_string(), "\\Flagged".to_string()];
        inbox.permanent_flags = vec!["\\Seen".to_string()];
        inbox.children.push(MailboxInfo::new("Sent"));

        let mut archive = MailboxInfo::new("Archive");
        archive.children.push(MailboxInfo::new("2024"));

        Ok(vec![inbox, archive])
    }
}

struct Client {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
}

impl Client {
    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    async fn roundtrip(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }
}

async fn start(handler: TestHandler) -> Client {
    let server = ImapServer::new(handler, ServerConfig::new(0));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, writer) = tokio::io::split(stream);
    Client {
        reader: BufReader::new(read),
        writer,
    }
}

async fn start_logged_in(handler: TestHandler) -> Client {
    let mut client = start(handler).await;
    client.read_line().await;
    let reply = client.roundtrip("a0 LOGIN alice sesame").await;
    assert_eq!(reply, "a0 OK authenticated");
    client
}

#[tokio::test]
async fn greeting_and_capability() {
    let mut client = start(TestHandler::default()).await;
    assert_eq!(client.read_line().await, "* OK IMAP4rev1 Service Ready");

    client.send("a1 CAPABILITY").await;
    assert_eq!(client.read_line().await, "* CAPABILITY IMAP4rev1");
    assert_eq!(client.read_line().await, "a1 OK CAPABILITY completed");
}

#[tokio::test]
async fn noop_echoes_tag() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(client.roundtrip("xyzzy NOOP").await, "xyzzy OK NOOP completed");
}

#[tokio::test]
async fn argument_count_mismatch_is_bad() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 NOOP extra").await,
        "a1 BAD unexpected amount of arguments (1 instead of 0)"
    );
}

#[tokio::test]
async fn bare_tag_gets_bad() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    let reply = client.roundtrip("a1").await;
    assert!(reply.starts_with("a1 BAD "), "got {reply}");
}

#[tokio::test]
async fn empty_line_gets_star_bad() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    let reply = client.roundtrip("").await;
    assert!(reply.starts_with("* BAD "), "got {reply}");
}

#[tokio::test]
async fn starttls_is_refused() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 STARTTLS").await,
        "a1 BAD TLS unsupported"
    );
}

#[tokio::test]
async fn login_success_and_repeat_rejected() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 LOGIN alice sesame").await,
        "a1 OK authenticated"
    );
    assert_eq!(
        client.roundtrip("a2 LOGIN alice sesame").await,
        "a2 BAD already authenticated"
    );
}

#[tokio::test]
async fn login_bad_credentials() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 LOGIN alice wrong").await,
        "a1 NO unable to authenticate"
    );
    // Still unauthenticated, retry allowed.
    assert_eq!(
        client.roundtrip("a2 LOGIN alice sesame").await,
        "a2 OK authenticated"
    );
}

#[tokio::test]
async fn login_with_quoted_strings() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 LOGIN \"alice\" \"sesame\"").await,
        "a1 OK authenticated"
    );
}

#[tokio::test]
async fn commands_require_authentication() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 SELECT INBOX").await,
        "a1 BAD not authenticated"
    );
    assert_eq!(client.roundtrip("a2 LIST \"\" *").await, "a2 BAD not authenticated");
}

#[tokio::test]
async fn authenticate_plain_roundtrip() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;

    client.send("a1 AUTHENTICATE PLAIN").await;
    assert_eq!(client.read_line().await, "+");

    let message = BASE64.encode(b"\0alice\0sesame");
    assert_eq!(client.roundtrip(&message).await, "a1 OK authenticated");
}

#[tokio::test]
async fn authenticate_plain_pipelined_response() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;

    // Command and continuation reply arrive in a single write.
    let message = BASE64.encode(b"\0alice\0sesame");
    client
        .send(&format!("a1 AUTHENTICATE PLAIN\r\n{message}"))
        .await;
    assert_eq!(client.read_line().await, "+");
    assert_eq!(client.read_line().await, "a1 OK authenticated");
}

#[tokio::test]
async fn authenticate_cancelled_with_star() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;

    client.send("a1 AUTHENTICATE PLAIN").await;
    assert_eq!(client.read_line().await, "+");
    assert_eq!(
        client.roundtrip("*").await,
        "a1 BAD authentication cancelled"
    );
    // Session survives cancellation.
    assert_eq!(
        client.roundtrip("a2 LOGIN alice sesame").await,
        "a2 OK authenticated"
    );
}

#[tokio::test]
async fn authenticate_unsupported_mechanism() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 AUTHENTICATE CRAM-MD5").await,
        "a1 NO unsupported authentication mechanism"
    );
}

#[tokio::test]
async fn authenticate_bad_base64() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;

    client.send("a1 AUTHENTICATE PLAIN").await;
    assert_eq!(client.read_line().await, "+");
    assert_eq!(
        client.roundtrip("!!!").await,
        "a1 BAD invalid AUTHENTICATE PLAIN response"
    );
}

#[tokio::test]
async fn auth_handler_fault_is_contained() {
    let handler = TestHandler {
        auth_faults: true,
        ..TestHandler::default()
    };
    let mut client = start(handler).await;
    client.read_line().await;
    assert_eq!(
        client.roundtrip("a1 LOGIN alice sesame").await,
        "a1 BAD unable to handle client input"
    );
    // Connection stays up.
    assert_eq!(client.roundtrip("a2 NOOP").await, "a2 OK NOOP completed");
}

#[tokio::test]
async fn select_preamble() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 SELECT INBOX").await;
    assert_eq!(client.read_line().await, "* 3 EXISTS");
    assert_eq!(client.read_line().await, "* 2 RECENT");
    assert_eq!(client.read_line().await, "* OK [UNSEEN 1] unseen");
    assert_eq!(client.read_line().await, "* FLAGS (\\Seen \\Flagged)");
    assert_eq!(
        client.read_line().await,
        "* OK [PERMANENTFLAGS (\\Seen)] flags permitted"
    );
    assert_eq!(
        client.read_line().await,
        "a1 OK [READ-WRITE] SELECT completed"
    );
}

#[tokio::test]
async fn select_normalizes_inbox_case() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 SELECT inbox").await;
    let mut tagged = String::new();
    for _ in 0..6 {
        tagged = client.read_line().await;
    }
    assert_eq!(tagged, "a1 OK [READ-WRITE] SELECT completed");
}

#[tokio::test]
async fn examine_is_read_only() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 EXAMINE INBOX").await;
    client.read_line().await; // EXISTS
    client.read_line().await; // RECENT
    client.read_line().await; // UNSEEN
    client.read_line().await; // FLAGS
    assert_eq!(
        client.read_line().await,
        "* OK [PERMANENTFLAGS ()] flags permitted"
    );
    assert_eq!(
        client.read_line().await,
        "a1 OK [READ-ONLY] EXAMINE completed"
    );
}

#[tokio::test]
async fn select_unknown_mailbox() {
    let mut client = start_logged_in(TestHandler::default()).await;
    assert_eq!(
        client.roundtrip("a1 SELECT Nonexistent").await,
        "a1 NO no such mailbox"
    );
    // Selection failed, so CLOSE has nothing to close.
    assert_eq!(
        client.roundtrip("a2 CLOSE").await,
        "a2 BAD no mailbox selected"
    );
}

#[tokio::test]
async fn close_returns_to_authenticated() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 SELECT INBOX").await;
    for _ in 0..6 {
        client.read_line().await;
    }
    assert_eq!(client.roundtrip("a2 CLOSE").await, "a2 OK CLOSE completed");
    assert_eq!(
        client.roundtrip("a3 CLOSE").await,
        "a3 BAD no mailbox selected"
    );
}

#[tokio::test]
async fn list_flattens_hierarchy() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 LIST \"\" *").await;
    assert_eq!(client.read_line().await, "* LIST () \"/\" INBOX");
    assert_eq!(client.read_line().await, "* LIST () \"/\" INBOX/Sent");
    assert_eq!(client.read_line().await, "* LIST () \"/\" Archive");
    assert_eq!(client.read_line().await, "* LIST () \"/\" Archive/2024");
    assert_eq!(client.read_line().await, "a1 OK LIST completed");
}

#[tokio::test]
async fn lsub_mirrors_list() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 LSUB \"\" *").await;
    assert_eq!(client.read_line().await, "* LSUB () \"/\" INBOX");
    client.read_line().await;
    client.read_line().await;
    client.read_line().await;
    assert_eq!(client.read_line().await, "a1 OK LSUB completed");
}

#[tokio::test]
async fn status_reports_counts() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 STATUS INBOX (MESSAGES UNSEEN)").await;
    assert_eq!(
        client.read_line().await,
        "* STATUS INBOX (MESSAGES 3 RECENT 2 UNSEEN 1)"
    );
    assert_eq!(client.read_line().await, "a1 OK STATUS completed");
}

#[tokio::test]
async fn fetch_expands_sequence_set() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 SELECT INBOX").await;
    for _ in 0..6 {
        client.read_line().await;
    }

    client.send("a2 FETCH 1:2,5 (FLAGS)").await;
    assert_eq!(
        client.read_line().await,
        "* 1 FETCH (FLAGS (\\Seen) UID 1)"
    );
    assert_eq!(
        client.read_line().await,
        "* 2 FETCH (FLAGS (\\Seen) UID 2)"
    );
    assert_eq!(
        client.read_line().await,
        "* 5 FETCH (FLAGS (\\Seen) UID 5)"
    );
    assert_eq!(client.read_line().await, "a2 OK FETCH completed");
}

#[tokio::test]
async fn uid_fetch_folds_to_fetch() {
    let mut client = start_logged_in(TestHandler::default()).await;

    client.send("a1 SELECT INBOX").await;
    for _ in 0..6 {
        client.read_line().await;
    }

    // INBOX has 3 messages, so * resolves to 3.
    client.send("a2 UID FETCH 1:* (FLAGS)").await;
    assert_eq!(
        client.read_line().await,
        "* 1 FETCH (FLAGS (\\Seen) UID 1)"
    );
    client.read_line().await;
    assert_eq!(
        client.read_line().await,
        "* 3 FETCH (FLAGS (\\Seen) UID 3)"
    );
    assert_eq!(client.read_line().await, "a2 OK FETCH completed");
}

#[tokio::test]
async fn fetch_rejects_bad_sequence_set() {
    let mut client = start_logged_in(TestHandler::default()).await;
    let reply = client.roundtrip("a1 FETCH 1:x (FLAGS)").await;
    assert!(reply.starts_with("a1 BAD "), "got {reply}");
}

#[tokio::test]
async fn store_and_friends_are_acknowledged() {
    let mut client = start_logged_in(TestHandler::default()).await;
    assert_eq!(
        client.roundtrip("a1 STORE 1 +FLAGS (\\Seen)").await,
        "a1 OK STORE completed"
    );
    assert_eq!(
        client.roundtrip("a2 UID COPY 1 Archive").await,
        "a2 OK COPY completed"
    );
    assert_eq!(client.roundtrip("a3 CHECK").await, "a3 OK CHECK completed");
}

#[tokio::test]
async fn unknown_command_is_bad() {
    let mut client = start_logged_in(TestHandler::default()).await;
    assert_eq!(
        client.roundtrip("a1 FROBNICATE").await,
        "a1 BAD unknown command"
    );
}

#[tokio::test]
async fn fragmented_writes_reassemble() {
    let mut client = start(TestHandler::default()).await;
    client.read_line().await;

    for byte in b"a1 NOOP\r\n" {
        client.writer.write_all(&[*byte]).await.unwrap();
        client.writer.flush().await.unwrap();
    }
    assert_eq!(client.read_line().await, "a1 OK NOOP completed");

    // Two commands in one write get two answers in order.
    client.send("a2 NOOP\r\na3 CAPABILITY").await;
    assert_eq!(client.read_line().await, "a2 OK NOOP completed");
    assert_eq!(client.read_line().await, "* CAPABILITY IMAP4rev1");
    assert_eq!(client.read_line().await, "a3 OK CAPABILITY completed");
}

#[tokio::test]
async fn logout_says_bye_and_closes() {
    let closes = Arc::new(AtomicU32::new(0));
    let handler = TestHandler {
        closes: Arc::clone(&closes),
        ..TestHandler::default()
    };
    let mut client = start(handler).await;
    client.read_line().await;

    client.send("a1 LOGOUT").await;
    assert_eq!(client.read_line().await, "* BYE logout");
    assert_eq!(client.read_line().await, "a1 OK LOGOUT completed");

    // EOF follows.
    let mut rest = String::new();
    client.reader.read_line(&mut rest).await.unwrap();
    assert_eq!(rest, "");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn peer_close_fires_on_close_once() {
    let closes = Arc::new(AtomicU32::new(0));
    let handler = TestHandler {
        closes: Arc::clone(&closes),
        ..TestHandler::default()
    };
    let mut client = start(handler).await;
    client.read_line().await;

    client.writer.shutdown().await.unwrap();
    drop(client);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_connection_gets_bye() {
    let handler = TestHandler {
        reject_reason: Some("maintenance window".to_string()),
        ..TestHandler::default()
    };
    let mut client = start(handler).await;
    assert_eq!(client.read_line().await, "* BYE maintenance window");

    let mut rest = String::new();
    client.reader.read_line(&mut rest).await.unwrap();
    assert_eq!(rest, "");
}

#[tokio::test]
async fn preauth_greeting_skips_login() {
    let handler = TestHandler {
        preauth: true,
        ..TestHandler::default()
    };
    let mut client = start(handler).await;
    assert_eq!(client.read_line().await, "* PREAUTH IMAP4rev1 logged in");

    assert_eq!(
        client.roundtrip("a1 LOGIN alice sesame").await,
        "a1 BAD already authenticated"
    );
    client.send("a2 LIST \"\" *").await;
    assert_eq!(client.read_line().await, "* LIST () \"/\" INBOX");
}

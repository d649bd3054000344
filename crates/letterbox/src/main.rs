//! `letterbox` - demo IMAP server
//!
//! Serves a fixed demo account over the letterbox-imap engine so the
//! protocol can be exercised with any IMAP client:
//!
//! ```text
//! cargo run -p letterbox
//! openssl s_client -connect localhost:1143  # or plain netcat
//! a1 LOGIN demo demo
//! a2 SELECT INBOX
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use letterbox_imap::{
    AuthDecision, Connection, HandlerError, ImapHandler, ImapServer, MailboxInfo, ServerConfig,
};

const DEMO_USER: &str = "demo";
const DEMO_PASSWORD: &str = "demo";
const DEMO_PORT: u16 = 1143;

/// Serves one hardcoded account with a small mailbox hierarchy.
struct DemoHandler;

impl ImapHandler for DemoHandler {
    type Data = ();

    async fn on_auth(
        &self,
        conn: &mut Connection<()>,
        username: &str,
        password: &str,
    ) -> Result<AuthDecision, HandlerError> {
        if username == DEMO_USER && password == DEMO_PASSWORD {
            info!(conn = conn.id(), username, "demo login");
            Ok(AuthDecision::Accept(None))
        } else {
            Ok(AuthDecision::Reject(Some(
                "invalid credentials (try demo/demo)".to_string(),
            )))
        }
    }

    async fn on_boxes(&self, _conn: &mut Connection<()>) -> Result<Vec<MailboxInfo>, HandlerError> {
        let mut inbox = MailboxInfo::new("INBOX");
        inbox.messages = 4;
        inbox.unseen = 2;
        inbox.recent = Some(1);
        inbox.flags = vec![
            "\\Seen".to_string(),
            "\\Answered".to_string(),
            "\\Flagged".to_string(),
            "\\Deleted".to_string(),
            "\\Draft".to_string(),
        ];
        inbox.permanent_flags = vec!["\\Seen".to_string(), "\\Flagged".to_string()];

        let mut archive = MailboxInfo::new("Archive");
        archive.children.push(MailboxInfo::new("2025"));
        archive.children.push(MailboxInfo::new("2026"));

        Ok(vec![inbox, archive, MailboxInfo::new("Drafts")])
    }

    async fn on_close(&self, conn: &mut Connection<()>) {
        info!(conn = conn.id(), "demo session closed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "letterbox=debug,letterbox_imap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(port = DEMO_PORT, "starting letterbox demo server");

    let config = ServerConfig::builder()
        .addr("localhost")
        .port(DEMO_PORT)
        .build();
    ImapServer::new(DemoHandler, config).run().await?;
    Ok(())
}

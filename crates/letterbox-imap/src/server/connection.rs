//! Per-connection data model.

use std::net::SocketAddr;

use crate::protocol::SessionState;

/// One accepted client connection.
///
/// Created on TCP accept and dropped at teardown; the engine never keeps a
/// connection alive past its socket. The `data` slot belongs to the
/// embedding application and is never interpreted here.
#[derive(Debug)]
pub struct Connection<D> {
    id: u64,
    peer: SocketAddr,
    pub(crate) state: SessionState,
    /// Opaque caller-defined state, owned by the embedder.
    pub data: D,
}

impl<D: Default> Connection<D> {
    /// Creates a connection record for a freshly accepted socket.
    #[must_use]
    pub(crate) fn new(id: u64, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            state: SessionState::NotAuthenticated,
            data: D::default(),
        }
    }
}

impl<D> Connection<D> {
    /// Monotonically assigned connection identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Peer address and port.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Currently selected mailbox, if the state is selected or examined.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        self.state.selected_mailbox()
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
    use crate::protocol::SelectedState;

    fn peer() -> SocketAddr {
        "127.0.0.1:49152".parse().unwrap()
    }

    #[test]
    fn test_new_connection_is_unauthenticated() {
        let conn: Connection<()> = Connection::new(1, peer());
        assert_eq!(conn.id(), 1);
        assert_eq!(conn.peer(), peer());
        assert_eq!(conn.state(), &SessionState::NotAuthenticated);
        assert_eq!(conn.selected_mailbox(), None);
    }

    #[test]
    fn test_selected_mailbox_follows_state() {
        let mut conn: Connection<()> = Connection::new(2, peer());
        conn.state = SessionState::Selected(SelectedState {
            mailbox: "INBOX".to_string(),
            read_only: false,
        });
        assert_eq!(conn.selected_mailbox(), Some("INBOX"));
    }

    #[test]
    fn test_data_slot_is_caller_owned() {
        let mut conn: Connection<Vec<String>> = Connection::new(3, peer());
        conn.data.push("anything".to_string());
        assert_eq!(conn.data.len(), 1);
    }
}

//! Session state machine.
//!
//! Every connection is in exactly one of these states; transitions happen
//! only when specific commands succeed (LOGIN/AUTHENTICATE, SELECT/EXAMINE,
//! CLOSE, LOGOUT). The dispatcher checks command legality against the
//! current state before looking at arguments.

/// Authentication/selection state of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for credentials. Only CAPABILITY, NOOP, LOGOUT, STARTTLS,
    /// AUTHENTICATE and LOGIN are legal.
    #[default]
    NotAuthenticated,

    /// Logged in; mailbox commands are legal but none is selected.
    Authenticated,

    /// A mailbox is open, read-write (SELECT) or read-only (EXAMINE).
    Selected(SelectedState),

    /// The connection is finished; no further input is processed.
    Disconnected,
}

impl SessionState {
    /// Returns `true` once the client has authenticated (authenticated or
    /// selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected or examined.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns `true` once the connection is done.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// The selected mailbox name, if any.
    ///
    /// Non-`None` exactly while the state is selected or examined.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the open mailbox is read-only (EXAMINE).
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }
}

/// State carried while a mailbox is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the open mailbox.
    pub mailbox: String,
    /// Whether the mailbox was opened read-only (EXAMINE).
    pub read_only: bool,
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

    fn selected(read_only: bool) -> SessionState {
        SessionState::Selected(SelectedState {
            mailbox: "INBOX".to_string(),
            read_only,
        })
    }

    #[test]
    fn test_default_state() {
        assert_eq!(SessionState::default(), SessionState::NotAuthenticated);
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!SessionState::NotAuthenticated.is_authenticated());
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(selected(false).is_authenticated());
        assert!(selected(true).is_authenticated());
        assert!(!SessionState::Disconnected.is_authenticated());
    }

    #[test]
    fn test_is_selected() {
        assert!(!SessionState::NotAuthenticated.is_selected());
        assert!(!SessionState::Authenticated.is_selected());
        assert!(selected(false).is_selected());
        assert!(selected(true).is_selected());
    }

    #[test]
    fn test_selected_mailbox() {
        assert_eq!(SessionState::NotAuthenticated.selected_mailbox(), None);
        assert_eq!(SessionState::Authenticated.selected_mailbox(), None);
        assert_eq!(selected(false).selected_mailbox(), Some("INBOX"));
    }

    #[test]
    fn test_is_read_only() {
        assert!(!SessionState::Authenticated.is_read_only());
        assert!(!selected(false).is_read_only());
        assert!(selected(true).is_read_only());
    }
}

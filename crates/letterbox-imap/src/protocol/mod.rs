//! Wire-protocol building blocks: argument grammar, command lines,
//! response encoding, session states, and sequence sets.
//!
//! Everything in this module is pure; I/O and per-connection state live in
//! [`crate::server`].

pub mod args;
pub mod command;
pub mod response;
pub mod sequence;
pub mod state;

pub use args::Argument;
pub use command::{Command, Verb};
pub use response::{Response, Status};
pub use sequence::SequenceSet;
pub use state::{SelectedState, SessionState};

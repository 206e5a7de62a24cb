//! Shared data shapes and the collaborator interface consumed by the chat widget.
//!
//! Nothing in here performs I/O; the transport that owns sockets and message
//! persistence implements [`ChatService`].

pub mod error;
pub mod model;
pub mod service;

pub use error::ChatError;
pub use model::{Attachment, GroupMember, Message, RawReadBy, ScanStatus, User};
pub use service::{ChatEvent, ChatService};

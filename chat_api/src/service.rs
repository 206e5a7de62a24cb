use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{ChatError, GroupMember, Message};

/// Notifications pushed by the transport to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageReceived { group_id: String, message: Message },
    ReadStateChanged { group_id: String },
    PresenceChanged { user_id: String, online: bool },
}

/// Capabilities the widget needs from the chat transport.
///
/// Implementations own sockets, persistence, and the per-group message store;
/// the widget only reads from it and issues load/mark requests.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Loaded messages of a group, oldest first.
    fn messages(&self, group_id: &str) -> Vec<Message>;

    fn members(&self, group_id: &str) -> Vec<GroupMember>;

    /// Whether the transport is already loading messages for the group.
    fn is_loading(&self, group_id: &str) -> bool;

    fn is_online(&self, user_id: &str) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<ChatEvent>;

    /// Populate the store with `page` (1-based) of the group's history.
    async fn load_messages(&self, group_id: &str, page: u32, page_size: u32)
        -> Result<(), ChatError>;

    async fn mark_as_read(&self, group_id: &str, viewer_id: &str) -> Result<(), ChatError>;
}

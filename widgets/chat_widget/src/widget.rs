use std::sync::Arc;

use chat_api::{ChatError, ChatEvent, ChatService};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::pagination::{PaginationController, ScrollOutcome};
use crate::reads::{build_views, unread_count, MessageView};
use crate::viewport::Viewport;

/// One viewer's chat session: the active conversation, its paging and its
/// read-state projection.
pub struct ChatWidget<S, V> {
    service: Arc<S>,
    pagination: PaginationController<S, V>,
    viewer_id: String,
    active: Mutex<Option<String>>,
}

impl<S: ChatService, V: Viewport> ChatWidget<S, V> {
    pub fn new(service: Arc<S>, viewport: Arc<V>, viewer_id: &str, page_size: u32) -> Self {
        Self {
            pagination: PaginationController::new(service.clone(), viewport, page_size),
            service,
            viewer_id: viewer_id.to_string(),
            active: Mutex::new(None),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn active_group(&self) -> Option<String> {
        self.active.lock().clone()
    }

    pub fn pagination(&self) -> &PaginationController<S, V> {
        &self.pagination
    }

    /// Activate a conversation: reset paging, load the newest page and mark it read.
    pub async fn open_group(&self, group_id: &str) -> Result<(), ChatError> {
        *self.active.lock() = Some(group_id.to_string());
        self.pagination.set_active_group(group_id);
        self.service
            .load_messages(group_id, 1, self.pagination.page_size())
            .await?;
        self.service.mark_as_read(group_id, &self.viewer_id).await?;
        info!(group_id, viewer = %self.viewer_id, "conversation opened");
        Ok(())
    }

    /// Forward a scroll event. Failures are logged; the next scroll retries.
    pub async fn on_scroll(&self) -> ScrollOutcome {
        match self.pagination.on_scroll().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "older messages unavailable");
                ScrollOutcome::Ignored
            }
        }
    }

    /// React to a transport event.
    pub async fn handle_event(&self, event: &ChatEvent) -> Result<(), ChatError> {
        let Some(active) = self.active_group() else {
            return Ok(());
        };
        match event {
            ChatEvent::MessageReceived { group_id, message }
                if *group_id == active && message.sender_id != self.viewer_id =>
            {
                debug!(%group_id, message_id = %message.id, "incoming message in open conversation");
                self.service.mark_as_read(group_id, &self.viewer_id).await
            }
            ChatEvent::PresenceChanged { user_id, online } => {
                // seen-by rows query presence on every render
                debug!(%user_id, online, "presence changed");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Read projection of the active conversation's loaded messages.
    pub fn render(&self) -> Vec<MessageView> {
        let Some(group_id) = self.active_group() else {
            return Vec::new();
        };
        let messages = self.service.messages(&group_id);
        let members = self.service.members(&group_id);
        build_views(&messages, &members, &self.viewer_id, |id| {
            self.service.is_online(id)
        })
    }

    pub fn unread(&self) -> usize {
        self.active_group()
            .map(|g| unread_count(&self.service.messages(&g), &self.viewer_id))
            .unwrap_or(0)
    }
}

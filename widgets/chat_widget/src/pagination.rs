use std::sync::Arc;

use chat_api::{ChatError, ChatService};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::viewport::Viewport;

/// Result of a scroll notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// Not at the top, or no conversation is active.
    Ignored,
    /// A fetch is already outstanding.
    Busy,
    /// The given page was loaded and the scroll offset restored.
    Loaded { page: u32 },
    /// The conversation changed while the fetch was outstanding.
    Abandoned,
}

#[derive(Debug, Default)]
struct State {
    group_id: Option<String>,
    page: u32,
    fetching: bool,
    generation: u64,
}

/// Loads older messages when the list is scrolled to the top while keeping
/// the visible messages in place.
pub struct PaginationController<S, V> {
    service: Arc<S>,
    viewport: Arc<V>,
    page_size: u32,
    state: Mutex<State>,
}

impl<S: ChatService, V: Viewport> PaginationController<S, V> {
    pub fn new(service: Arc<S>, viewport: Arc<V>, page_size: u32) -> Self {
        Self {
            service,
            viewport,
            page_size,
            state: Mutex::new(State {
                page: 1,
                ..State::default()
            }),
        }
    }

    /// Switch conversation. Resets paging and invalidates any outstanding fetch.
    pub fn set_active_group(&self, group_id: &str) {
        let mut state = self.state.lock();
        state.group_id = Some(group_id.to_string());
        state.page = 1;
        state.fetching = false;
        state.generation += 1;
        debug!(group_id, generation = state.generation, "pagination reset");
    }

    pub fn page(&self) -> u32 {
        self.state.lock().page
    }

    pub fn is_fetching(&self) -> bool {
        self.state.lock().fetching
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Handle a scroll event of the message list.
    pub async fn on_scroll(&self) -> Result<ScrollOutcome, ChatError> {
        if self.viewport.scroll_top() != 0.0 {
            return Ok(ScrollOutcome::Ignored);
        }
        let (group_id, generation) = {
            let state = self.state.lock();
            match &state.group_id {
                Some(group_id) => (group_id.clone(), state.generation),
                None => return Ok(ScrollOutcome::Ignored),
            }
        };
        if self.service.is_loading(&group_id) {
            return Ok(ScrollOutcome::Busy);
        }
        let next_page = {
            let mut state = self.state.lock();
            if state.fetching || state.generation != generation {
                return Ok(ScrollOutcome::Busy);
            }
            state.fetching = true;
            state.page + 1
        };
        let previous_height = self.viewport.scroll_height();
        debug!(%group_id, page = next_page, "loading older messages");

        let result = self
            .service
            .load_messages(&group_id, next_page, self.page_size)
            .await;

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(%group_id, page = next_page, "conversation changed, dropping page");
                return Ok(ScrollOutcome::Abandoned);
            }
            state.fetching = false;
            if let Err(e) = result {
                warn!(%group_id, page = next_page, error = %e, "loading older messages failed");
                return Err(e);
            }
            state.page = next_page;
        }

        self.viewport.after_layout().await;
        if self.state.lock().generation != generation {
            return Ok(ScrollOutcome::Abandoned);
        }
        let new_height = self.viewport.scroll_height();
        self.viewport.set_scroll_top(new_height - previous_height);
        info!(%group_id, page = next_page, "older messages loaded");
        Ok(ScrollOutcome::Loaded { page: next_page })
    }
}

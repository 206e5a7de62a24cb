use std::sync::Arc;

use async_trait::async_trait;
use chat_api::ChatService;
use parking_lot::Mutex;

/// Scroll container hosting the message list.
#[async_trait]
pub trait Viewport: Send + Sync {
    fn scroll_top(&self) -> f64;
    fn scroll_height(&self) -> f64;
    fn set_scroll_top(&self, top: f64);
    /// Resolves once the host has laid out content inserted since the last pass.
    async fn after_layout(&self);
}

/// Terminal stand-in where each loaded message takes one fixed-height row.
pub struct RowViewport<S> {
    service: Arc<S>,
    group_id: Mutex<Option<String>>,
    row_height: f64,
    top: Mutex<f64>,
}

impl<S: ChatService> RowViewport<S> {
    pub fn new(service: Arc<S>, row_height: f64) -> Self {
        Self {
            service,
            group_id: Mutex::new(None),
            row_height,
            top: Mutex::new(0.0),
        }
    }

    /// Point the viewport at another group and scroll to its top.
    pub fn show_group(&self, group_id: &str) {
        *self.group_id.lock() = Some(group_id.to_string());
        *self.top.lock() = 0.0;
    }
}

#[async_trait]
impl<S: ChatService> Viewport for RowViewport<S> {
    fn scroll_top(&self) -> f64 {
        *self.top.lock()
    }

    fn scroll_height(&self) -> f64 {
        let rows = match self.group_id.lock().as_deref() {
            Some(group_id) => self.service.messages(group_id).len(),
            None => 0,
        };
        rows as f64 * self.row_height
    }

    fn set_scroll_top(&self, top: f64) {
        *self.top.lock() = top.max(0.0);
    }

    async fn after_layout(&self) {
        tokio::task::yield_now().await;
    }
}

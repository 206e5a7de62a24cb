use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chat_api::{ChatError, ChatEvent, ChatService, GroupMember, Message};
use chat_widget::{MemoryChatService, PaginationController, RowViewport, ScrollOutcome, Viewport};
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::{broadcast, Notify};

const ROW: f64 = 10.0;

/// Memory service with switchable failures, a forced loading flag and an
/// optional gate that holds page loads until released.
struct TestService {
    inner: MemoryChatService,
    fail: AtomicBool,
    loading: AtomicBool,
    gate: Option<Notify>,
    requested: Mutex<Vec<(String, u32)>>,
}

impl TestService {
    fn new(gated: bool) -> Self {
        let inner = MemoryChatService::new();
        inner.insert_group("g", vec![], history("g", 50));
        inner.insert_group("h", vec![], history("h", 50));
        Self {
            inner,
            fail: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            gate: gated.then(Notify::new),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn pages(&self) -> Vec<u32> {
        self.requested.lock().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait]
impl ChatService for TestService {
    fn messages(&self, group_id: &str) -> Vec<Message> {
        self.inner.messages(group_id)
    }

    fn members(&self, group_id: &str) -> Vec<GroupMember> {
        self.inner.members(group_id)
    }

    fn is_loading(&self, group_id: &str) -> bool {
        self.loading.load(Ordering::SeqCst) || self.inner.is_loading(group_id)
    }

    fn is_online(&self, user_id: &str) -> bool {
        self.inner.is_online(user_id)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.inner.subscribe()
    }

    async fn load_messages(
        &self,
        group_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(), ChatError> {
        self.requested.lock().push((group_id.to_string(), page));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::LoadFailed {
                group_id: group_id.to_string(),
                page,
                reason: "connection reset".into(),
            });
        }
        self.inner.load_messages(group_id, page, page_size).await
    }

    async fn mark_as_read(&self, group_id: &str, viewer_id: &str) -> Result<(), ChatError> {
        self.inner.mark_as_read(group_id, viewer_id).await
    }
}

fn history(group_id: &str, n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| Message {
            id: format!("{group_id}-{i}"),
            group_id: group_id.into(),
            sender_id: if i % 2 == 0 { "a".into() } else { "b".into() },
            content: Some(format!("message {i}")),
            attachments: vec![],
            created_at: OffsetDateTime::UNIX_EPOCH,
            read_by: None,
            edited_at: None,
            translations: None,
        })
        .collect()
}

/// Viewport whose measured height only catches up with the store once a
/// layout pass ran.
struct DeferredLayoutViewport {
    service: Arc<TestService>,
    laid_out_rows: Mutex<usize>,
    top: Mutex<f64>,
}

#[async_trait]
impl Viewport for DeferredLayoutViewport {
    fn scroll_top(&self) -> f64 {
        *self.top.lock()
    }

    fn scroll_height(&self) -> f64 {
        *self.laid_out_rows.lock() as f64 * ROW
    }

    fn set_scroll_top(&self, top: f64) {
        *self.top.lock() = top;
    }

    async fn after_layout(&self) {
        tokio::task::yield_now().await;
        *self.laid_out_rows.lock() = self.service.messages("g").len();
    }
}

type Controller = PaginationController<TestService, RowViewport<TestService>>;

async fn setup(gated: bool) -> (Arc<TestService>, Arc<RowViewport<TestService>>, Controller) {
    let service = Arc::new(TestService::new(gated));
    service.inner.load_messages("g", 1, 10).await.unwrap();
    let viewport = Arc::new(RowViewport::new(service.clone(), ROW));
    viewport.show_group("g");
    let controller = PaginationController::new(service.clone(), viewport.clone(), 10);
    controller.set_active_group("g");
    (service, viewport, controller)
}

#[tokio::test]
async fn loads_next_page_and_keeps_visual_position() {
    let (service, viewport, controller) = setup(false).await;
    assert_eq!(viewport.scroll_height(), 100.0);

    let outcome = controller.on_scroll().await.unwrap();
    assert_eq!(outcome, ScrollOutcome::Loaded { page: 2 });
    assert_eq!(controller.page(), 2);
    assert!(!controller.is_fetching());
    assert_eq!(service.messages("g").len(), 20);
    // previously visible top message sits where it was before the prepend
    assert_eq!(viewport.scroll_top(), 100.0);
}

#[tokio::test]
async fn ignores_scroll_away_from_top() {
    let (service, viewport, controller) = setup(false).await;
    viewport.set_scroll_top(5.0);
    assert_eq!(controller.on_scroll().await.unwrap(), ScrollOutcome::Ignored);
    assert!(service.pages().is_empty());
}

#[tokio::test]
async fn ignores_scroll_without_active_group() {
    let service = Arc::new(TestService::new(false));
    let viewport = Arc::new(RowViewport::new(service.clone(), ROW));
    let controller = PaginationController::new(service.clone(), viewport, 10);
    assert_eq!(controller.on_scroll().await.unwrap(), ScrollOutcome::Ignored);
    assert!(service.pages().is_empty());
}

#[tokio::test]
async fn pages_requested_in_order() {
    let (service, viewport, controller) = setup(false).await;
    for expected in 2..=4 {
        viewport.set_scroll_top(0.0);
        assert_eq!(
            controller.on_scroll().await.unwrap(),
            ScrollOutcome::Loaded { page: expected }
        );
    }
    assert_eq!(service.pages(), vec![2, 3, 4]);
}

#[tokio::test]
async fn failed_fetch_retries_same_page() {
    let (service, viewport, controller) = setup(false).await;
    service.fail.store(true, Ordering::SeqCst);

    let err = controller.on_scroll().await.unwrap_err();
    assert!(matches!(err, ChatError::LoadFailed { page: 2, .. }));
    assert_eq!(controller.page(), 1);
    assert!(!controller.is_fetching());
    assert_eq!(viewport.scroll_top(), 0.0);

    service.fail.store(false, Ordering::SeqCst);
    assert_eq!(
        controller.on_scroll().await.unwrap(),
        ScrollOutcome::Loaded { page: 2 }
    );
    assert_eq!(service.pages(), vec![2, 2]);
}

#[tokio::test]
async fn busy_while_collaborator_is_loading() {
    let (service, _viewport, controller) = setup(false).await;
    service.loading.store(true, Ordering::SeqCst);
    assert_eq!(controller.on_scroll().await.unwrap(), ScrollOutcome::Busy);
    assert!(service.pages().is_empty());
    assert!(!controller.is_fetching());
}

#[tokio::test]
async fn second_scroll_during_fetch_is_rejected() {
    let (service, _viewport, controller) = setup(true).await;
    let gate = service.gate.as_ref().unwrap();

    let (first, second) = tokio::join!(controller.on_scroll(), async {
        assert!(controller.is_fetching());
        let second = controller.on_scroll().await;
        gate.notify_one();
        second
    });
    assert_eq!(first.unwrap(), ScrollOutcome::Loaded { page: 2 });
    assert_eq!(second.unwrap(), ScrollOutcome::Busy);
    assert_eq!(service.pages(), vec![2]);
}

#[tokio::test]
async fn switching_group_abandons_outstanding_fetch() {
    let (service, viewport, controller) = setup(true).await;
    let gate = service.gate.as_ref().unwrap();

    let (outcome, _) = tokio::join!(controller.on_scroll(), async {
        controller.set_active_group("h");
        viewport.show_group("h");
        viewport.set_scroll_top(7.0);
        gate.notify_one();
    });
    assert_eq!(outcome.unwrap(), ScrollOutcome::Abandoned);
    assert_eq!(controller.page(), 1);
    assert!(!controller.is_fetching());
    assert_eq!(viewport.scroll_top(), 7.0);
}

#[tokio::test]
async fn offset_measured_after_layout_pass() {
    let service = Arc::new(TestService::new(false));
    service.inner.load_messages("g", 1, 10).await.unwrap();
    let viewport = Arc::new(DeferredLayoutViewport {
        service: service.clone(),
        laid_out_rows: Mutex::new(10),
        top: Mutex::new(0.0),
    });
    let controller = PaginationController::new(service.clone(), viewport.clone(), 10);
    controller.set_active_group("g");

    assert_eq!(
        controller.on_scroll().await.unwrap(),
        ScrollOutcome::Loaded { page: 2 }
    );
    assert_eq!(viewport.scroll_height(), 200.0);
    assert_eq!(viewport.scroll_top(), 200.0 - 100.0);
}

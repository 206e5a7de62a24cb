use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chat_api::{ChatError, ChatEvent, ChatService, GroupMember, Message, RawReadBy};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::presence::Presence;
use crate::reads::{normalize_readers, raw_entries, Exclusion};

/// Conversation dump used to seed the in-memory service.
#[derive(Debug, Deserialize)]
pub struct Transcript {
    pub group_id: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    /// Full history, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub online: Vec<String>,
}

impl Transcript {
    /// Read a JSON transcript from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading transcript {}", path.display()))?;
        serde_json::from_slice(&bytes).context("invalid transcript")
    }
}

struct GroupStore {
    history: Vec<Message>,
    /// Number of newest messages currently exposed.
    loaded: usize,
    members: Vec<GroupMember>,
}

impl GroupStore {
    fn window(&self) -> &[Message] {
        &self.history[self.history.len() - self.loaded..]
    }
}

/// `ChatService` backed by memory; stands in for the real transport.
pub struct MemoryChatService {
    groups: Mutex<HashMap<String, GroupStore>>,
    loading: Mutex<HashSet<String>>,
    presence: Presence,
    event_tx: broadcast::Sender<ChatEvent>,
}

impl Default for MemoryChatService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChatService {
    pub fn new() -> Self {
        Self::with_presence_debounce(Duration::from_secs(2))
    }

    /// Service whose users go offline `debounce` after their last connection closes.
    pub fn with_presence_debounce(debounce: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            groups: Mutex::new(HashMap::new()),
            loading: Mutex::new(HashSet::new()),
            presence: Presence::new(debounce),
            event_tx: tx,
        }
    }

    /// Seed a service with one conversation; listed users start online.
    pub fn from_transcript(transcript: Transcript) -> Self {
        let service = Self::new();
        for user_id in &transcript.online {
            service.connect_user(user_id);
        }
        service.insert_group(&transcript.group_id, transcript.members, transcript.messages);
        service
    }

    /// Register a group with its full history; nothing is loaded yet.
    pub fn insert_group(&self, group_id: &str, members: Vec<GroupMember>, history: Vec<Message>) {
        self.groups.lock().insert(
            group_id.to_string(),
            GroupStore {
                history,
                loaded: 0,
                members,
            },
        );
    }

    /// A connection for `user_id` opened.
    pub fn connect_user(&self, user_id: &str) {
        if self.presence.connect(user_id) {
            self.announce_presence(user_id, true);
        }
    }

    /// A connection for `user_id` closed; announces offline once the debounce
    /// elapsed without a reconnect.
    pub async fn disconnect_user(&self, user_id: &str) {
        if self.presence.disconnect(user_id).await {
            self.announce_presence(user_id, false);
        }
    }

    pub fn online_users(&self) -> Vec<String> {
        self.presence.snapshot()
    }

    fn announce_presence(&self, user_id: &str, online: bool) {
        debug!(user_id, online, "presence changed");
        let _ = self.event_tx.send(ChatEvent::PresenceChanged {
            user_id: user_id.to_string(),
            online,
        });
    }

    /// Deliver a new message as the transport would.
    pub fn push_message(&self, message: Message) -> Result<(), ChatError> {
        let group_id = message.group_id.clone();
        {
            let mut groups = self.groups.lock();
            let store = groups
                .get_mut(&group_id)
                .ok_or_else(|| ChatError::UnknownGroup(group_id.clone()))?;
            store.history.push(message.clone());
            store.loaded += 1;
        }
        let _ = self
            .event_tx
            .send(ChatEvent::MessageReceived { group_id, message });
        Ok(())
    }

    fn load_window(&self, group_id: &str, page: u32, page_size: u32) -> Result<(), ChatError> {
        if page == 0 || page_size == 0 {
            return Err(ChatError::LoadFailed {
                group_id: group_id.to_string(),
                page,
                reason: "page and page size start at 1".into(),
            });
        }
        let mut groups = self.groups.lock();
        let store = groups
            .get_mut(group_id)
            .ok_or_else(|| ChatError::UnknownGroup(group_id.to_string()))?;
        let wanted = (page as usize).saturating_mul(page_size as usize);
        store.loaded = store.loaded.max(wanted.min(store.history.len()));
        debug!(group_id, page, loaded = store.loaded, "window loaded");
        Ok(())
    }
}

#[async_trait]
impl ChatService for MemoryChatService {
    fn messages(&self, group_id: &str) -> Vec<Message> {
        self.groups
            .lock()
            .get(group_id)
            .map(|store| store.window().to_vec())
            .unwrap_or_default()
    }

    fn members(&self, group_id: &str) -> Vec<GroupMember> {
        self.groups
            .lock()
            .get(group_id)
            .map(|store| store.members.clone())
            .unwrap_or_default()
    }

    fn is_loading(&self, group_id: &str) -> bool {
        self.loading.lock().contains(group_id)
    }

    fn is_online(&self, user_id: &str) -> bool {
        self.presence.is_online(user_id)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    async fn load_messages(
        &self,
        group_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(), ChatError> {
        self.loading.lock().insert(group_id.to_string());
        let result = self.load_window(group_id, page, page_size);
        self.loading.lock().remove(group_id);
        result
    }

    async fn mark_as_read(&self, group_id: &str, viewer_id: &str) -> Result<(), ChatError> {
        let changed = {
            let mut groups = self.groups.lock();
            let store = groups
                .get_mut(group_id)
                .ok_or_else(|| ChatError::UnknownGroup(group_id.to_string()))?;
            let start = store.history.len() - store.loaded;
            let mut changed = 0;
            for message in &mut store.history[start..] {
                if message.sender_id == viewer_id {
                    continue;
                }
                if normalize_readers(message, viewer_id, Exclusion::Sender).contains(viewer_id) {
                    continue;
                }
                let mut entries = raw_entries(message);
                entries.push(Value::String(viewer_id.to_string()));
                message.read_by = Some(RawReadBy::List(entries));
                changed += 1;
            }
            changed
        };
        if changed > 0 {
            debug!(group_id, viewer_id, changed, "marked as read");
            let _ = self.event_tx.send(ChatEvent::ReadStateChanged {
                group_id: group_id.to_string(),
            });
        }
        Ok(())
    }
}

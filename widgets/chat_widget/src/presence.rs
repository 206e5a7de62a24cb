use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;

/// Online state derived from open connections per user.
pub struct Presence {
    counts: Mutex<HashMap<String, usize>>,
    debounce: Duration,
}

impl Presence {
    pub fn new(debounce: Duration) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            debounce,
        }
    }

    /// Register a connection. Returns true if the user transitioned to online.
    pub fn connect(&self, user_id: &str) -> bool {
        let mut guard = self.counts.lock();
        let c = guard.entry(user_id.to_string()).or_insert(0);
        *c += 1;
        *c == 1
    }

    /// Drop a connection. Returns true if the user is offline once the debounce elapsed.
    pub async fn disconnect(&self, user_id: &str) -> bool {
        {
            let mut guard = self.counts.lock();
            if let Some(c) = guard.get_mut(user_id) {
                *c = c.saturating_sub(1);
            }
        }
        sleep(self.debounce).await;
        let mut guard = self.counts.lock();
        match guard.get(user_id).copied() {
            Some(0) | None => {
                guard.remove(user_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.counts.lock().get(user_id).is_some_and(|c| *c > 0)
    }

    pub fn snapshot(&self) -> Vec<String> {
        let guard = self.counts.lock();
        let mut online: Vec<String> = guard
            .iter()
            .filter(|(_, c)| **c > 0)
            .map(|(id, _)| id.clone())
            .collect();
        online.sort();
        online
    }
}

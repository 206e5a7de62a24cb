use std::collections::{HashMap, HashSet};

use chat_api::{GroupMember, Message, RawReadBy};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Which ids are removed from a message's reader set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Drop only the message's sender.
    Sender,
    /// Drop the sender and the current viewer.
    SenderAndViewer,
}

/// Read icon shown on the viewer's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadIcon {
    /// No persistent icon; seen-by avatars take over once someone read it.
    None,
    /// Sent, not yet read by anyone else.
    SentUnread,
}

/// Member summary rendered in a "seen by" row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeenBy {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub online: bool,
}

/// Rendering projection of one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub index: usize,
    pub message_id: String,
    pub sender_id: String,
    pub own: bool,
    pub icon: ReadIcon,
    pub seen_by: Vec<SeenBy>,
}

/// Decode a raw `read_by` value into its listed entries, in insertion order.
/// A malformed encoded string yields an empty list.
pub fn raw_entries(message: &Message) -> Vec<Value> {
    match &message.read_by {
        None => Vec::new(),
        Some(RawReadBy::List(items)) => items.clone(),
        Some(RawReadBy::Encoded(s)) => match serde_json::from_str::<Vec<Value>>(s) {
            Ok(items) => items,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "ignoring malformed read_by");
                Vec::new()
            }
        },
    }
}

/// String form of a reader entry, or `None` for falsy entries.
///
/// Integral numbers print without a fraction (`1.0` -> `"1"`), nested lists
/// join their entries with commas, and objects are never ids.
fn entry_id(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (i != 0).then(|| i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().filter(|f| *f != 0.0).map(|f| f.to_string())
            }
        }
        Value::Bool(true) => Some("true".into()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|v| entry_id(v).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(",");
            (!joined.is_empty()).then_some(joined)
        }
        Value::Object(_) => None,
    }
}

/// Normalized reader ids of a message, never including its sender.
pub fn normalize_readers(message: &Message, viewer_id: &str, exclusion: Exclusion) -> HashSet<String> {
    raw_entries(message)
        .iter()
        .filter_map(entry_id)
        .filter(|id| *id != message.sender_id)
        .filter(|id| exclusion == Exclusion::Sender || id != viewer_id)
        .collect()
}

/// For each member, the index of the newest message they have read.
///
/// Messages must be visited oldest first so later indices overwrite earlier ones.
pub fn last_seen_index_per_member(messages: &[Message], viewer_id: &str) -> HashMap<String, usize> {
    let mut last_seen = HashMap::new();
    for (index, message) in messages.iter().enumerate() {
        for reader in normalize_readers(message, viewer_id, Exclusion::SenderAndViewer) {
            last_seen.insert(reader, index);
        }
    }
    last_seen
}

/// Members (other than the viewer) whose read position is exactly `index`,
/// sorted by full name.
pub fn members_who_last_saw<'a>(
    index: usize,
    members: &'a [GroupMember],
    last_seen: &HashMap<String, usize>,
    viewer_id: &str,
) -> Vec<&'a GroupMember> {
    let mut seen: Vec<&GroupMember> = members
        .iter()
        .filter(|m| m.user.id != viewer_id)
        .filter(|m| last_seen.get(&m.user.id) == Some(&index))
        .collect();
    seen.sort_by(|a, b| sort_name(a).cmp(&sort_name(b)));
    seen
}

fn sort_name(member: &GroupMember) -> String {
    format!("{} {}", member.user.first_name, member.user.last_name)
}

/// Icon for a message the viewer sent. Other people's messages get none.
pub fn own_message_read_icon(message: &Message, viewer_id: &str) -> ReadIcon {
    if message.sender_id != viewer_id {
        return ReadIcon::None;
    }
    if normalize_readers(message, viewer_id, Exclusion::SenderAndViewer).is_empty() {
        ReadIcon::SentUnread
    } else {
        ReadIcon::None
    }
}

/// Messages from others the viewer has not read yet.
pub fn unread_count(messages: &[Message], viewer_id: &str) -> usize {
    messages
        .iter()
        .filter(|m| m.sender_id != viewer_id)
        .filter(|m| !normalize_readers(m, viewer_id, Exclusion::Sender).contains(viewer_id))
        .count()
}

/// Build the per-message read projection for the loaded window.
pub fn build_views<F>(
    messages: &[Message],
    members: &[GroupMember],
    viewer_id: &str,
    is_online: F,
) -> Vec<MessageView>
where
    F: Fn(&str) -> bool,
{
    let last_seen = last_seen_index_per_member(messages, viewer_id);
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| MessageView {
            index,
            message_id: message.id.clone(),
            sender_id: message.sender_id.clone(),
            own: message.sender_id == viewer_id,
            icon: own_message_read_icon(message, viewer_id),
            seen_by: members_who_last_saw(index, members, &last_seen, viewer_id)
                .into_iter()
                .map(|m| SeenBy {
                    id: m.user.id.clone(),
                    display_name: m.user.full_name(),
                    avatar_url: m.user.avatar.clone(),
                    online: is_online(&m.user.id),
                })
                .collect(),
        })
        .collect()
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// First and last name joined by a space, trimmed when either is missing.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A user's membership in a group. Online state is not carried here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub id: String,
    pub group_id: String,
    pub user: User,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub joined_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Scanning,
    Ok,
    BlockedMalware,
    BlockedPii,
    ScanTimeout,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    pub scan_status: ScanStatus,
}

impl Attachment {
    /// Only attachments that passed the scan may be offered for download.
    pub fn is_available(&self) -> bool {
        self.scan_status == ScanStatus::Ok
    }
}

/// `read_by` as it arrives from the backend: either a JSON-encoded string or an
/// already decoded list. Resolved to reader ids in one place by the widget.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawReadBy {
    Encoded(String),
    List(Vec<Value>),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by: Option<RawReadBy>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub edited_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<BTreeMap<String, String>>,
}

impl Message {
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Text to show for the given language, falling back to the original content.
    pub fn display_content(&self, language: Option<&str>) -> Option<&str> {
        language
            .and_then(|lang| self.translations.as_ref()?.get(lang))
            .map(String::as_str)
            .or(self.content.as_deref())
    }
}

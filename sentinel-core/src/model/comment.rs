use chrono::{DateTime, Utc};

use crate::ids::CheckableHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CommentEntryType {
    User,
    Downtime,
    Flapping,
    Acknowledgement,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CommentSource {
    Internal,
    External,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Comment {
    pub comment_id: u64,
    pub target: CheckableHandle,
    pub entry_type: CommentEntryType,
    pub source: CommentSource,
    pub persistent: bool,
    pub expires: bool,
    pub expire_time: Option<DateTime<Utc>>,
    pub author: String,
    pub comment_data: String,
    pub entry_time: DateTime<Utc>,
}

impl Comment {
    /// Non-persistent, non-acknowledgement comments are discarded on restart
    /// (spec.md §3.7).
    pub fn survives_restart(&self) -> bool {
        self.persistent || self.entry_type == CommentEntryType::Acknowledgement
    }
}

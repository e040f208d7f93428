use chrono::{DateTime, Utc};

use crate::ids::CheckableHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AcknowledgementType {
    Normal,
    Sticky,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DowntimeKind {
    Host,
    Service,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Downtime {
    pub downtime_id: u64,
    pub kind: DowntimeKind,
    pub target: CheckableHandle,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: chrono::Duration,
    pub fixed: bool,
    pub triggered_by: Option<u64>,
    pub author: String,
    pub comment: String,
    pub is_in_effect: bool,
    /// Set once a flexible downtime activates; `start_time + duration` defines
    /// its effective end (spec.md §3.6).
    pub activated_at: Option<DateTime<Utc>>,
    pub comment_id: Option<u64>,
}

impl Downtime {
    pub fn effective_end(&self) -> DateTime<Utc> {
        if self.fixed {
            self.end_time
        } else {
            self.activated_at
                .map(|a| a + self.duration)
                .unwrap_or(self.end_time)
        }
    }

    /// Flexible downtimes are pending (not yet activated) within their window.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.fixed
            && !self.is_in_effect
            && self.activated_at.is_none()
            && now >= self.start_time
            && now < self.end_time
    }

    pub fn expired_unactivated(&self, now: DateTime<Utc>) -> bool {
        !self.fixed && self.activated_at.is_none() && now >= self.end_time
    }
}

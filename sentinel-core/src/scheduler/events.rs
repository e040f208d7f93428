use chrono::{DateTime, Utc};

use crate::ids::CheckableHandle;

/// Whether a reschedule must land inside the checkable's check period, or may
/// fire at any wall-clock time (spec.md §3.8 "timing-options enum").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimingOption {
    RespectCheckPeriod,
    Anytime,
}

/// Tagged timed-event payloads (spec.md §3.8). Payloads are handles into the
/// object arena, never raw pointers (spec.md §9 redesign note).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    ActiveHostCheck(crate::ids::HostHandle),
    ActiveServiceCheck(crate::ids::ServiceHandle),
    CheckReaper,
    LogRotation,
    RetentionSave,
    StatusSave,
    ExpireComment(u64),
    ExpireDowntime(u64),
    ScheduledDowntimeStart(u64),
    ScheduledDowntimeEnd(u64),
    OrphanCheck,
    SFreshnessCheck,
    HFreshnessCheck,
    CommandCheck,
    UserFunction(&'static str),
}

impl EventKind {
    pub fn checkable(&self) -> Option<CheckableHandle> {
        match self {
            EventKind::ActiveHostCheck(h) => Some(CheckableHandle::Host(*h)),
            EventKind::ActiveServiceCheck(s) => Some(CheckableHandle::Service(*s)),
            _ => None,
        }
    }

    /// Infrastructure events belong on the "high" queue (spec.md §4.4); all
    /// others are checkable-driven and belong on the "low" queue.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(
            self,
            EventKind::ActiveHostCheck(_) | EventKind::ActiveServiceCheck(_)
        )
    }
}

#[derive(Clone, Debug)]
pub struct TimedEvent {
    pub run_time: DateTime<Utc>,
    pub kind: EventKind,
    pub recurring: bool,
    pub interval: Option<chrono::Duration>,
    pub timing_option: TimingOption,
    /// Tie-break for events scheduled at the same instant (spec.md §4.4:
    /// "ties broken by insertion order").
    pub sequence: u64,
}

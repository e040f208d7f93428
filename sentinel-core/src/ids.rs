use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter for ids the spec requires to be strictly monotonic
/// (command ids, downtime ids, comment ids, notification ids). A `uuid::Uuid`
/// would satisfy "unique" but not "monotonic", so these stay plain counters.
#[derive(Debug, Default)]
pub struct IdSequence(AtomicU64);

impl IdSequence {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Next id that would be handed out, for retention snapshots.
    pub fn peek_next(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Restores the counter from a snapshot so ids stay monotonic across a
    /// restart (spec.md §4.10).
    pub fn restore(&self, next: u64) {
        self.0.store(next, Ordering::Relaxed);
    }
}

macro_rules! arena_handle {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_handle!(HostHandle);
arena_handle!(ServiceHandle);
arena_handle!(ContactHandle);
arena_handle!(ContactGroupHandle);
arena_handle!(TimePeriodHandle);
arena_handle!(CommandHandle);
arena_handle!(DependencyHandle);
arena_handle!(EscalationHandle);

/// A checkable is either a host or a service; this is the weak reference a
/// timed event's payload carries so the scheduler never embeds raw pointers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CheckableHandle {
    Host(HostHandle),
    Service(ServiceHandle),
}

impl fmt::Display for CheckableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckableHandle::Host(h) => write!(f, "host:{h}"),
            CheckableHandle::Service(s) => write!(f, "service:{s}"),
        }
    }
}

use crate::ids::{CheckableHandle, TimePeriodHandle};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DependencyType {
    Notification,
    Execution,
}

/// Host/service dependency (SPEC_FULL.md §3, grounded in
/// `original_source/inc/.../objects/servicedependency.hh`). A dependent
/// checkable's execution or notifications are gated on the master
/// checkable's state not matching any bit in `fail_on`.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub dependency_type: DependencyType,
    pub dependent: CheckableHandle,
    pub master: CheckableHandle,
    /// Bitmask over the master's possible states (encoded the same way as
    /// `Contact::notify_on_host`/`notify_on_service`).
    pub fail_on: u8,
    pub inherits_parent: bool,
    pub dependency_period: Option<TimePeriodHandle>,
}

impl Dependency {
    /// True when the master's current state bit is set in `fail_on`, meaning
    /// the dependency is currently unmet and the dependent should be gated.
    pub fn is_unmet(&self, master_state_bit: u8) -> bool {
        self.fail_on & master_state_bit != 0
    }
}

use crate::ids::{CommandHandle, TimePeriodHandle};

#[derive(Clone, Debug, Default)]
pub struct Contact {
    pub name: String,
    pub alias: String,
    pub host_notification_period: Option<TimePeriodHandle>,
    pub service_notification_period: Option<TimePeriodHandle>,
    /// Bitmask of host states this contact wants notified on, encoded as
    /// `1 << HostState as u8` plus the two synthetic bits for flapping and
    /// downtime notifications (spec.md §3.5).
    pub notify_on_host: u8,
    pub notify_on_service: u8,
    pub host_notifications_enabled: bool,
    pub service_notifications_enabled: bool,
    pub host_notification_commands: Vec<CommandHandle>,
    pub service_notification_commands: Vec<CommandHandle>,
    pub email: Option<String>,
    pub pager: Option<String>,
    pub addresses: Vec<String>,
    pub can_submit_commands: bool,
}

pub mod notify_bits {
    pub const UP_OK: u8 = 1 << 0;
    pub const DOWN_WARNING: u8 = 1 << 1;
    pub const UNREACHABLE_CRITICAL: u8 = 1 << 2;
    pub const UNKNOWN: u8 = 1 << 3;
    pub const FLAPPING: u8 = 1 << 4;
    pub const DOWNTIME: u8 = 1 << 5;
}

impl Contact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host_notifications_enabled: true,
            service_notifications_enabled: true,
            can_submit_commands: false,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ContactGroup {
    pub name: String,
    pub alias: String,
    pub members: Vec<crate::ids::ContactHandle>,
}

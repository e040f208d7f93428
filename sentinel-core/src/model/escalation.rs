use crate::ids::{CheckableHandle, ContactGroupHandle, ContactHandle, TimePeriodHandle};

/// Notification escalation (SPEC_FULL.md §3, grounded in
/// `original_source/inc/.../objects/...escalation.hh` and spec.md §4.9/§9).
/// Replaces the default contact set while
/// `current_notification_number ∈ [first_notification, last_notification]`
/// (`last_notification == 0` means unbounded).
#[derive(Clone, Debug)]
pub struct Escalation {
    pub target: CheckableHandle,
    pub first_notification: u32,
    pub last_notification: u32,
    pub escalation_period: Option<TimePeriodHandle>,
    pub escalation_options: u8,
    pub contacts: Vec<ContactHandle>,
    pub contact_groups: Vec<ContactGroupHandle>,
}

impl Escalation {
    pub fn matches_notification_number(&self, n: u32) -> bool {
        n >= self.first_notification && (self.last_notification == 0 || n <= self.last_notification)
    }

    /// Span length used to rank overlapping escalations: earliest `first`,
    /// then longest span wins (spec.md §9 "Notification/escalation overlay").
    pub fn span(&self) -> u32 {
        if self.last_notification == 0 {
            u32::MAX
        } else {
            self.last_notification - self.first_notification
        }
    }
}

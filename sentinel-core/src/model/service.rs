use super::checkable::CheckableCommon;
use crate::ids::HostHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    pub const fn up_ok() -> Self {
        ServiceState::Ok
    }

    /// Raw exit-code mapping for services (spec.md §4.5): {0,1,2,3} -> {OK,
    /// WARNING, CRITICAL, UNKNOWN}; anything else maps to UNKNOWN.
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => ServiceState::Ok,
            1 => ServiceState::Warning,
            2 => ServiceState::Critical,
            _ => ServiceState::Unknown,
        }
    }
}

/// Service identity is `(host_name, description)` per spec.md §3.3.
#[derive(Clone, Debug)]
pub struct Service {
    pub host: HostHandle,
    pub description: String,
    pub common: CheckableCommon<ServiceState>,
    /// Records whether the hosting host was non-UP at the last service
    /// check; used to suppress certain service notifications (spec.md §3.3).
    pub host_problem_at_last_check: bool,
}

impl Service {
    pub fn new(host: HostHandle, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            host,
            common: CheckableCommon::new(description.clone(), ServiceState::up_ok()),
            description,
            host_problem_at_last_check: false,
        }
    }
}

use std::collections::BTreeSet;

use super::checkable::CheckableCommon;
use crate::ids::HostHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HostState {
    Up,
    Down,
    Unreachable,
}

impl HostState {
    pub const fn up_ok() -> Self {
        HostState::Up
    }

    /// Raw exit-code mapping for hosts (spec.md §4.5): 0 -> Up, nonzero -> Down
    /// (subject to the reachability rewrite applied separately).
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            HostState::Up
        } else {
            HostState::Down
        }
    }
}

#[derive(Clone, Debug)]
pub struct Host {
    pub name: String,
    pub common: CheckableCommon<HostState>,
    /// Parent DAG edges; cycles are rejected at load time (spec.md §3.2).
    pub parent_hosts: BTreeSet<HostHandle>,
    pub child_hosts: BTreeSet<HostHandle>,
    pub circular_path_checked: bool,
    pub contains_circular_path: bool,
}

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            common: CheckableCommon::new(name.clone(), HostState::up_ok()),
            name,
            parent_hosts: BTreeSet::new(),
            child_hosts: BTreeSet::new(),
            circular_path_checked: false,
            contains_circular_path: false,
        }
    }
}

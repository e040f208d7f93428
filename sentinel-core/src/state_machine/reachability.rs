//! Host reachability rewrite (spec.md §4.5 step 2): a host whose raw probe
//! failed is DOWN only if every parent is UP; otherwise it's UNREACHABLE
//! because the real cause is upstream.

use crate::ids::HostHandle;
use crate::model::{HostState, ObjectGraph};

pub fn rewrite(graph: &ObjectGraph, handle: HostHandle, probed: HostState) -> HostState {
    if probed == HostState::Up {
        return probed;
    }
    let host = graph.host(handle);
    let all_parents_up = host
        .parent_hosts
        .iter()
        .all(|&p| graph.host(p).common.current_state == HostState::Up);
    if host.parent_hosts.is_empty() || all_parents_up {
        HostState::Down
    } else {
        HostState::Unreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Host;

    #[test]
    fn orphan_host_is_down_not_unreachable() {
        let mut graph = ObjectGraph::new();
        let h = graph.add_host(Host::new("standalone"));
        assert_eq!(rewrite(&graph, h, HostState::Down), HostState::Down);
    }

    #[test]
    fn child_of_down_parent_is_unreachable() {
        let mut graph = ObjectGraph::new();
        let mut parent = Host::new("parent");
        parent.common.current_state = HostState::Down;
        let parent_handle = graph.add_host(parent);
        let mut child = Host::new("child");
        child.parent_hosts.insert(parent_handle);
        let child_handle = graph.add_host(child);
        assert_eq!(rewrite(&graph, child_handle, HostState::Down), HostState::Unreachable);
    }
}

//! Uniform accessors over `CheckableHandle`, since `Host` and `Service`
//! carry distinct state-type parameters on `CheckableCommon<S>` and can't
//! share a trait object without erasing that type. Every downstream module
//! that needs to treat a host and a service the same way (flap detector
//! excepted, which is already generic) goes through here instead of
//! re-deriving the match arms.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use std::collections::HashSet;

use crate::ids::{CheckableHandle, CommandHandle, ContactHandle, HostHandle, TimePeriodHandle};
use crate::model::contact::notify_bits;
use crate::model::dependency::DependencyType;
use crate::model::downtime::AcknowledgementType;
use crate::model::{HostState, ObjectGraph, ServiceState, StateType};

fn host_state_bit(state: HostState) -> u8 {
    match state {
        HostState::Up => notify_bits::UP_OK,
        HostState::Down => notify_bits::DOWN_WARNING,
        HostState::Unreachable => notify_bits::UNREACHABLE_CRITICAL,
    }
}

fn service_state_bit(state: ServiceState) -> u8 {
    match state {
        ServiceState::Ok => notify_bits::UP_OK,
        ServiceState::Warning => notify_bits::DOWN_WARNING,
        ServiceState::Critical => notify_bits::UNREACHABLE_CRITICAL,
        ServiceState::Unknown => notify_bits::UNKNOWN,
    }
}

pub fn display_name(graph: &ObjectGraph, c: CheckableHandle) -> String {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.display_name.clone(),
        CheckableHandle::Service(s) => graph.service(s).common.display_name.clone(),
    }
}

pub fn notifications_enabled(graph: &ObjectGraph, c: CheckableHandle) -> bool {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.notifications_enabled,
        CheckableHandle::Service(s) => graph.service(s).common.notifications_enabled,
    }
}

pub fn state_type(graph: &ObjectGraph, c: CheckableHandle) -> StateType {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.state_type,
        CheckableHandle::Service(s) => graph.service(s).common.state_type,
    }
}

pub fn notification_period(graph: &ObjectGraph, c: CheckableHandle) -> Option<TimePeriodHandle> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.notification_period,
        CheckableHandle::Service(s) => graph.service(s).common.notification_period,
    }
}

pub fn scheduled_downtime_depth(graph: &ObjectGraph, c: CheckableHandle) -> i32 {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.scheduled_downtime_depth,
        CheckableHandle::Service(s) => graph.service(s).common.scheduled_downtime_depth,
    }
}

pub fn is_flapping(graph: &ObjectGraph, c: CheckableHandle) -> bool {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.is_flapping,
        CheckableHandle::Service(s) => graph.service(s).common.is_flapping,
    }
}

pub fn acknowledgement(graph: &ObjectGraph, c: CheckableHandle) -> Option<AcknowledgementType> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.acknowledgement,
        CheckableHandle::Service(s) => graph.service(s).common.acknowledgement,
    }
}

pub fn current_state_bit(graph: &ObjectGraph, c: CheckableHandle) -> u8 {
    match c {
        CheckableHandle::Host(h) => host_state_bit(graph.host(h).common.current_state),
        CheckableHandle::Service(s) => service_state_bit(graph.service(s).common.current_state),
    }
}

pub fn last_state_change(graph: &ObjectGraph, c: CheckableHandle) -> Option<DateTime<Utc>> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.last_state_change,
        CheckableHandle::Service(s) => graph.service(s).common.last_state_change,
    }
}

pub fn first_notification_delay(graph: &ObjectGraph, c: CheckableHandle) -> chrono::Duration {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.first_notification_delay,
        CheckableHandle::Service(s) => graph.service(s).common.first_notification_delay,
    }
}

pub fn last_notification(graph: &ObjectGraph, c: CheckableHandle) -> Option<DateTime<Utc>> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.last_notification,
        CheckableHandle::Service(s) => graph.service(s).common.last_notification,
    }
}

pub fn notification_interval(graph: &ObjectGraph, c: CheckableHandle) -> chrono::Duration {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.notification_interval,
        CheckableHandle::Service(s) => graph.service(s).common.notification_interval,
    }
}

pub fn current_notification_number(graph: &ObjectGraph, c: CheckableHandle) -> u32 {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.current_notification_number,
        CheckableHandle::Service(s) => graph.service(s).common.current_notification_number,
    }
}

/// The host that governs clause 8 of the eligibility gate: for a host, the
/// host itself; for a service, its owning host.
pub fn owning_host(graph: &ObjectGraph, c: CheckableHandle) -> HostHandle {
    match c {
        CheckableHandle::Host(h) => h,
        CheckableHandle::Service(s) => graph.service(s).host,
    }
}

pub fn host_is_up(graph: &ObjectGraph, host: HostHandle) -> bool {
    graph.host(host).common.current_state == HostState::Up
}

pub fn check_command(graph: &ObjectGraph, c: CheckableHandle) -> Option<CommandHandle> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.check_command,
        CheckableHandle::Service(s) => graph.service(s).common.check_command,
    }
}

pub fn custom_variables(graph: &ObjectGraph, c: CheckableHandle) -> HashMap<String, String> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.custom_variables.clone(),
        CheckableHandle::Service(s) => graph.service(s).common.custom_variables.clone(),
    }
}

/// Union of direct contacts and the members of direct contact-groups,
/// deduplicated by identity (spec.md §3.5).
pub fn effective_contacts(graph: &ObjectGraph, c: CheckableHandle) -> Vec<ContactHandle> {
    let (contacts, groups): (&[ContactHandle], &[crate::ids::ContactGroupHandle]) = match c {
        CheckableHandle::Host(h) => (&graph.host(h).common.contacts, &graph.host(h).common.contact_groups),
        CheckableHandle::Service(s) => (
            &graph.service(s).common.contacts,
            &graph.service(s).common.contact_groups,
        ),
    };
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::new();
    for &contact in contacts {
        if seen.insert(contact) {
            result.push(contact);
        }
    }
    for &group in groups {
        for &member in &graph.contact_group(group).members {
            if seen.insert(member) {
                result.push(member);
            }
        }
    }
    result
}

pub fn checks_enabled(graph: &ObjectGraph, c: CheckableHandle) -> bool {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.checks_enabled,
        CheckableHandle::Service(s) => graph.service(s).common.checks_enabled,
    }
}

pub fn set_modified(graph: &mut ObjectGraph, c: CheckableHandle, bit: u32) {
    match c {
        CheckableHandle::Host(h) => graph.host_mut(h).common.set_modified(bit),
        CheckableHandle::Service(s) => graph.service_mut(s).common.set_modified(bit),
    }
}

pub fn adjust_downtime_depth(graph: &mut ObjectGraph, c: CheckableHandle, delta: i32) {
    match c {
        CheckableHandle::Host(h) => {
            let depth = &mut graph.host_mut(h).common.scheduled_downtime_depth;
            *depth = (*depth + delta).max(0);
        }
        CheckableHandle::Service(s) => {
            let depth = &mut graph.service_mut(s).common.scheduled_downtime_depth;
            *depth = (*depth + delta).max(0);
        }
    }
}

pub fn set_acknowledgement(graph: &mut ObjectGraph, c: CheckableHandle, ack: Option<AcknowledgementType>) {
    match c {
        CheckableHandle::Host(h) => graph.host_mut(h).common.acknowledgement = ack,
        CheckableHandle::Service(s) => graph.service_mut(s).common.acknowledgement = ack,
    }
}

pub fn set_flapping_comment_id(graph: &mut ObjectGraph, c: CheckableHandle, id: Option<u64>) {
    match c {
        CheckableHandle::Host(h) => graph.host_mut(h).common.flapping_comment_id = id,
        CheckableHandle::Service(s) => graph.service_mut(s).common.flapping_comment_id = id,
    }
}

pub fn flapping_comment_id(graph: &ObjectGraph, c: CheckableHandle) -> Option<u64> {
    match c {
        CheckableHandle::Host(h) => graph.host(h).common.flapping_comment_id,
        CheckableHandle::Service(s) => graph.service(s).common.flapping_comment_id,
    }
}

/// Post-dispatch notification bookkeeping (spec.md §4.9): bump the
/// notification number, stamp the id/timestamp, and arm the re-notification
/// timer.
pub fn record_notification_sent(
    graph: &mut ObjectGraph,
    c: CheckableHandle,
    now: DateTime<Utc>,
    interval: chrono::Duration,
    id: u64,
) {
    match c {
        CheckableHandle::Host(h) => {
            let common = &mut graph.host_mut(h).common;
            common.current_notification_number += 1;
            common.current_notification_id = Some(id);
            common.last_notification = Some(now);
            common.next_notification = if interval.is_zero() { None } else { Some(now + interval) };
        }
        CheckableHandle::Service(s) => {
            let common = &mut graph.service_mut(s).common;
            common.current_notification_number += 1;
            common.current_notification_id = Some(id);
            common.last_notification = Some(now);
            common.next_notification = if interval.is_zero() { None } else { Some(now + interval) };
        }
    }
}

pub fn reset_notification_number(graph: &mut ObjectGraph, c: CheckableHandle) {
    match c {
        CheckableHandle::Host(h) => graph.host_mut(h).common.current_notification_number = 0,
        CheckableHandle::Service(s) => graph.service_mut(s).common.current_notification_number = 0,
    }
}

/// True when no execution dependency of `c` is unmet (SPEC_FULL.md §3
/// Dependency: "gate whether a checkable is actively checked at all").
pub fn execution_dependencies_met(graph: &ObjectGraph, now: DateTime<Utc>, c: CheckableHandle) -> bool {
    let mut visited = HashSet::new();
    !has_unmet_dependency(graph, now, c, DependencyType::Execution, &mut visited)
}

/// True when no notification dependency of `c` is unmet (SPEC_FULL.md §3
/// Dependency, spec.md §4.9 clause 12).
pub fn notification_dependencies_met(graph: &ObjectGraph, now: DateTime<Utc>, c: CheckableHandle) -> bool {
    let mut visited = HashSet::new();
    !has_unmet_dependency(graph, now, c, DependencyType::Notification, &mut visited)
}

fn has_unmet_dependency(
    graph: &ObjectGraph,
    now: DateTime<Utc>,
    dependent: CheckableHandle,
    kind: DependencyType,
    visited: &mut HashSet<CheckableHandle>,
) -> bool {
    if !visited.insert(dependent) {
        return false; // cyclic dependency chain; treat as met rather than loop.
    }
    graph
        .dependencies
        .iter()
        .filter(|d| d.dependent == dependent && d.dependency_type == kind)
        .any(|d| {
            if let Some(period) = d.dependency_period {
                if !crate::time_period::is_valid(graph, now, period) {
                    return false;
                }
            }
            let master_bit = current_state_bit(graph, d.master);
            d.is_unmet(master_bit)
                || (d.inherits_parent && has_unmet_dependency(graph, now, d.master, kind, visited))
        })
}

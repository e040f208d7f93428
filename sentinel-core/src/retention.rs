//! Retention snapshot/restore (spec.md §4.10): only runtime status survives
//! a restart. Objects themselves come back from a fresh config load, so a
//! snapshot records status keyed by stable object identity (host name,
//! `(host name, description)`) rather than serializing the graph itself.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::EngineContext;
use crate::error::Result;
use crate::model::comment::Comment;
use crate::model::downtime::Downtime;
use crate::model::{HostState, ServiceState, StateType};

/// Per-checkable fields the spec requires to survive a restart (spec.md
/// §3.1 "retained attributes", §4.10); everything else comes back to its
/// config-file default on the next load.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostStatus {
    pub name: String,
    pub current_state: HostState,
    pub last_state: HostState,
    pub last_hard_state: HostState,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub percent_state_change: f64,
    pub is_flapping: bool,
    pub flapping_comment_id: Option<u64>,
    pub current_notification_number: u32,
    pub last_notification: Option<DateTime<Utc>>,
    pub scheduled_downtime_depth: i32,
    pub acknowledgement: Option<crate::model::downtime::AcknowledgementType>,
    pub checks_enabled: bool,
    pub notifications_enabled: bool,
    pub modified_attributes: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub host_name: String,
    pub description: String,
    pub current_state: ServiceState,
    pub last_state: ServiceState,
    pub last_hard_state: ServiceState,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub percent_state_change: f64,
    pub is_flapping: bool,
    pub flapping_comment_id: Option<u64>,
    pub current_notification_number: u32,
    pub last_notification: Option<DateTime<Utc>>,
    pub scheduled_downtime_depth: i32,
    pub acknowledgement: Option<crate::model::downtime::AcknowledgementType>,
    pub checks_enabled: bool,
    pub notifications_enabled: bool,
    pub modified_attributes: u32,
    pub host_problem_at_last_check: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionSnapshot {
    pub saved_at: DateTime<Utc>,
    pub hosts: Vec<HostStatus>,
    pub services: Vec<ServiceStatus>,
    pub downtimes: Vec<Downtime>,
    pub comments: Vec<Comment>,
    pub next_downtime_id: u64,
    pub next_comment_id: u64,
    pub next_notification_id: u64,
    pub enable_notifications: bool,
}

/// Builds a snapshot from the live engine state (spec.md §4.10 "periodic
/// save" and "save on clean shutdown").
pub fn snapshot(ctx: &EngineContext) -> RetentionSnapshot {
    let hosts = ctx
        .graph
        .hosts
        .iter()
        .map(|host| {
            let c = &host.common;
            HostStatus {
                name: host.name.clone(),
                current_state: c.current_state,
                last_state: c.last_state,
                last_hard_state: c.last_hard_state,
                state_type: c.state_type,
                current_attempt: c.current_attempt,
                has_been_checked: c.has_been_checked,
                last_state_change: c.last_state_change,
                last_hard_state_change: c.last_hard_state_change,
                last_check: c.last_check,
                plugin_output: c.plugin_output.clone(),
                long_plugin_output: c.long_plugin_output.clone(),
                perf_data: c.perf_data.clone(),
                percent_state_change: c.percent_state_change,
                is_flapping: c.is_flapping,
                flapping_comment_id: c.flapping_comment_id,
                current_notification_number: c.current_notification_number,
                last_notification: c.last_notification,
                scheduled_downtime_depth: c.scheduled_downtime_depth,
                acknowledgement: c.acknowledgement,
                checks_enabled: c.checks_enabled,
                notifications_enabled: c.notifications_enabled,
                modified_attributes: c.modified_attributes,
            }
        })
        .collect();

    let services = ctx
        .graph
        .services
        .iter()
        .map(|service| {
            let c = &service.common;
            ServiceStatus {
                host_name: ctx.graph.host(service.host).name.clone(),
                description: service.description.clone(),
                current_state: c.current_state,
                last_state: c.last_state,
                last_hard_state: c.last_hard_state,
                state_type: c.state_type,
                current_attempt: c.current_attempt,
                has_been_checked: c.has_been_checked,
                last_state_change: c.last_state_change,
                last_hard_state_change: c.last_hard_state_change,
                last_check: c.last_check,
                plugin_output: c.plugin_output.clone(),
                long_plugin_output: c.long_plugin_output.clone(),
                perf_data: c.perf_data.clone(),
                percent_state_change: c.percent_state_change,
                is_flapping: c.is_flapping,
                flapping_comment_id: c.flapping_comment_id,
                current_notification_number: c.current_notification_number,
                last_notification: c.last_notification,
                scheduled_downtime_depth: c.scheduled_downtime_depth,
                acknowledgement: c.acknowledgement,
                checks_enabled: c.checks_enabled,
                notifications_enabled: c.notifications_enabled,
                modified_attributes: c.modified_attributes,
                host_problem_at_last_check: service.host_problem_at_last_check,
            }
        })
        .collect();

    RetentionSnapshot {
        saved_at: ctx.now,
        hosts,
        services,
        downtimes: ctx.downtimes.clone(),
        comments: ctx.comments.iter().filter(|c| c.survives_restart()).cloned().collect(),
        next_downtime_id: ctx.downtime_ids.peek_next(),
        next_comment_id: ctx.comment_ids.peek_next(),
        next_notification_id: ctx.notification_ids.peek_next(),
        enable_notifications: ctx.enable_notifications,
    }
}

/// Re-applies a snapshot onto a freshly loaded `ObjectGraph`, matching
/// records by name; a host or service present in the snapshot but absent
/// from the new config is dropped silently (spec.md §4.10 "reconciliation
/// against the freshly parsed config").
pub fn restore(ctx: &mut EngineContext, snapshot: RetentionSnapshot) {
    for status in snapshot.hosts {
        let Some(handle) = ctx.graph.find_host(&status.name) else {
            continue;
        };
        apply_host_status(ctx.graph.host_mut(handle), status);
    }

    for status in snapshot.services {
        let Some(host_handle) = ctx.graph.find_host(&status.host_name) else {
            continue;
        };
        let Some(handle) = ctx.graph.find_service(host_handle, &status.description) else {
            continue;
        };
        apply_service_status(ctx.graph.service_mut(handle), status);
    }

    ctx.downtimes = snapshot.downtimes;
    ctx.comments = snapshot.comments;
    ctx.enable_notifications = snapshot.enable_notifications;
    ctx.downtime_ids.restore(snapshot.next_downtime_id);
    ctx.comment_ids.restore(snapshot.next_comment_id);
    ctx.notification_ids.restore(snapshot.next_notification_id);
}

fn apply_host_status(host: &mut crate::model::Host, status: HostStatus) {
    let c = &mut host.common;
    c.current_state = status.current_state;
    c.last_state = status.last_state;
    c.last_hard_state = status.last_hard_state;
    c.state_type = status.state_type;
    c.current_attempt = status.current_attempt;
    c.has_been_checked = status.has_been_checked;
    c.last_state_change = status.last_state_change;
    c.last_hard_state_change = status.last_hard_state_change;
    c.last_check = status.last_check;
    c.plugin_output = status.plugin_output;
    c.long_plugin_output = status.long_plugin_output;
    c.perf_data = status.perf_data;
    c.percent_state_change = status.percent_state_change;
    c.is_flapping = status.is_flapping;
    c.flapping_comment_id = status.flapping_comment_id;
    c.current_notification_number = status.current_notification_number;
    c.last_notification = status.last_notification;
    c.scheduled_downtime_depth = status.scheduled_downtime_depth;
    c.acknowledgement = status.acknowledgement;
    c.checks_enabled = status.checks_enabled;
    c.notifications_enabled = status.notifications_enabled;
    c.modified_attributes = status.modified_attributes;
}

fn apply_service_status(service: &mut crate::model::Service, status: ServiceStatus) {
    service.host_problem_at_last_check = status.host_problem_at_last_check;
    let c = &mut service.common;
    c.current_state = status.current_state;
    c.last_state = status.last_state;
    c.last_hard_state = status.last_hard_state;
    c.state_type = status.state_type;
    c.current_attempt = status.current_attempt;
    c.has_been_checked = status.has_been_checked;
    c.last_state_change = status.last_state_change;
    c.last_hard_state_change = status.last_hard_state_change;
    c.last_check = status.last_check;
    c.plugin_output = status.plugin_output;
    c.long_plugin_output = status.long_plugin_output;
    c.perf_data = status.perf_data;
    c.percent_state_change = status.percent_state_change;
    c.is_flapping = status.is_flapping;
    c.flapping_comment_id = status.flapping_comment_id;
    c.current_notification_number = status.current_notification_number;
    c.last_notification = status.last_notification;
    c.scheduled_downtime_depth = status.scheduled_downtime_depth;
    c.acknowledgement = status.acknowledgement;
    c.checks_enabled = status.checks_enabled;
    c.notifications_enabled = status.notifications_enabled;
    c.modified_attributes = status.modified_attributes;
}

/// Writes the snapshot to `path` via write-temp-then-rename, so a crash
/// mid-write never leaves a half-written retention file behind.
pub fn save_to_file(snapshot: &RetentionSnapshot, path: &Path) -> Result<()> {
    let encoded = bincode::serialize(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, encoded)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_from_file(path: &Path) -> Result<RetentionSnapshot> {
    let bytes = std::fs::read(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bincode() {
        let snap = RetentionSnapshot {
            saved_at: Utc::now(),
            hosts: vec![],
            services: vec![],
            downtimes: vec![],
            comments: vec![],
            next_downtime_id: 4,
            next_comment_id: 9,
            next_notification_id: 1,
            enable_notifications: true,
        };
        let encoded = bincode::serialize(&snap).unwrap();
        let decoded: RetentionSnapshot = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.next_downtime_id, 4);
        assert_eq!(decoded.next_comment_id, 9);
    }
}

//! Notification engine (component E, spec.md §4.9): eligibility gate,
//! escalation overlay, contact resolution, dispatch.

pub mod macros;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::checkable_ops as ops;
use crate::context::EngineContext;
use crate::ids::CheckableHandle;

/// Notification kinds. Problem/recovery are the steady-state cases; the rest
/// bypass some eligibility clauses, as called out in spec.md §4.9 clauses
/// 5 and 6.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationKind {
    Problem,
    Recovery,
    Acknowledgement,
    FlappingStart,
    FlappingStop,
    DowntimeStart,
    DowntimeEnd,
}

impl NotificationKind {
    fn bypasses_downtime_gate(self) -> bool {
        matches!(self, NotificationKind::DowntimeStart | NotificationKind::DowntimeEnd)
    }

    fn bypasses_flapping_gate(self) -> bool {
        matches!(self, NotificationKind::FlappingStart | NotificationKind::FlappingStop)
    }

    fn is_recovery_or_ack(self) -> bool {
        matches!(self, NotificationKind::Recovery | NotificationKind::Acknowledgement)
    }

    fn is_renotification_subject(self) -> bool {
        matches!(self, NotificationKind::Problem)
    }
}

/// Entry point invoked by the state machine, flap detector, downtime
/// manager, and ack tracker on qualifying transitions (spec.md §4.9).
pub async fn notify(ctx: &mut EngineContext, checkable: CheckableHandle, kind: NotificationKind) {
    if !eligible(ctx, checkable, kind) {
        return;
    }

    let contacts = resolve_contacts(ctx, checkable, kind);
    if contacts.is_empty() {
        return;
    }

    let mut values = base_macros(ctx, checkable);
    values.insert("NOTIFICATIONTYPE".to_string(), format!("{kind:?}").to_uppercase());

    for contact_handle in contacts {
        let contact = ctx.graph.contact(contact_handle).clone();
        let commands = match checkable {
            CheckableHandle::Host(_) => &contact.host_notification_commands,
            CheckableHandle::Service(_) => &contact.service_notification_commands,
        };
        let mut contact_values = values.clone();
        contact_values.insert("CONTACTNAME".to_string(), contact.name.clone());
        contact_values.insert("CONTACTEMAIL".to_string(), contact.email.clone().unwrap_or_default());

        for &cmd_handle in commands {
            let cmd = ctx.graph.command(cmd_handle);
            let cmdline = macros::expand(&cmd.command_line, &contact_values, &ctx.config.illegal_output_chars);
            let connector = cmd.connector.clone();
            let argv: Vec<String> = cmdline.split_whitespace().map(str::to_string).collect();
            let result = ctx
                .dispatch
                .execute(
                    connector.as_deref(),
                    &argv,
                    &cmdline,
                    ctx.config.command_timeout,
                    -1,
                )
                .await;
            if result.exit_status != crate::executor::ExitStatus::Normal || result.exit_code != 0 {
                warn!(
                    contact = %contact.name,
                    checkable = %checkable,
                    output = %result.plugin_output,
                    "notification command did not complete cleanly"
                );
            }
        }
    }

    post_dispatch(ctx, checkable, kind);
}

fn eligible(ctx: &EngineContext, checkable: CheckableHandle, kind: NotificationKind) -> bool {
    let graph = &ctx.graph;

    // 1. Global enable_notifications.
    if !ctx.enable_notifications {
        return false;
    }
    // 2. Checkable notifications_enabled.
    if !ops::notifications_enabled(graph, checkable) {
        return false;
    }
    // 3. state_type == HARD (recovery/ack/flapping/downtime notifications are
    // sent on their own triggering transitions, which are always HARD by
    // construction in the callers below).
    if ops::state_type(graph, checkable) != crate::model::StateType::Hard {
        return false;
    }
    // 4. notification_period valid now.
    if let Some(period) = ops::notification_period(graph, checkable) {
        if !crate::time_period::is_valid(graph, ctx.now, period) {
            return false;
        }
    }
    // 5. Not in downtime, except downtime-start/stop.
    if !kind.bypasses_downtime_gate() && ops::scheduled_downtime_depth(graph, checkable) > 0 {
        return false;
    }
    // 6. Not flapping, except flapping-start/stop.
    if !kind.bypasses_flapping_gate() && ops::is_flapping(graph, checkable) {
        return false;
    }
    // 7. Target-state bit set in notify_on (approximated here via contact
    // resolution below, since the bitmask is per-contact; checkable-level
    // stalk/notify gating doesn't have its own bit, so this clause is folded
    // into per-contact filtering in resolve_contacts).

    // 8. For services: host must be UP, or this is a recovery and the host
    // was not UP at last check.
    if let CheckableHandle::Service(s) = checkable {
        let host_up = ops::host_is_up(graph, ops::owning_host(graph, checkable));
        let host_problem_at_last_check = graph.service(s).host_problem_at_last_check;
        if !host_up && !(kind == NotificationKind::Recovery && host_problem_at_last_check) {
            return false;
        }
    }

    // 9. First notification delay.
    if kind.is_renotification_subject() && ops::current_notification_number(graph, checkable) == 0 {
        if let Some(last_change) = ops::last_state_change(graph, checkable) {
            if ctx.now < last_change + ops::first_notification_delay(graph, checkable) {
                return false;
            }
        }
    }

    // 10. Re-notification timer.
    if kind.is_renotification_subject() && ops::current_notification_number(graph, checkable) > 0 {
        let interval = ops::notification_interval(graph, checkable);
        if interval.is_zero() {
            return false;
        }
        if let Some(last) = ops::last_notification(graph, checkable) {
            if ctx.now < last + interval {
                return false;
            }
        }
    }

    // 11. Acknowledged non-recovery/ack notifications are suppressed.
    if ops::acknowledgement(graph, checkable).is_some() && !kind.is_recovery_or_ack() {
        return false;
    }

    // 12. No unmet notification dependency.
    if !ops::notification_dependencies_met(graph, ctx.now, checkable) {
        return false;
    }

    true
}

/// Escalation overlay: when one or more escalations match the current
/// notification number, period, and state, the highest-priority match
/// (earliest `first_notification`, then longest span) replaces the default
/// contact set (spec.md §4.9, §9).
fn resolve_contacts(ctx: &EngineContext, checkable: CheckableHandle, kind: NotificationKind) -> Vec<crate::ids::ContactHandle> {
    let graph = &ctx.graph;
    let number = ops::current_notification_number(graph, checkable);
    let state_bit = ops::current_state_bit(graph, checkable);

    let mut matching: Vec<&crate::model::Escalation> = graph
        .escalations
        .iter()
        .filter(|e| e.target == checkable)
        .filter(|e| e.matches_notification_number(number))
        .filter(|e| e.escalation_options & state_bit != 0 || kind.is_recovery_or_ack())
        .filter(|e| match e.escalation_period {
            Some(p) => crate::time_period::is_valid(graph, ctx.now, p),
            None => true,
        })
        .collect();
    matching.sort_by(|a, b| a.first_notification.cmp(&b.first_notification).then(b.span().cmp(&a.span())));

    let candidates: Vec<crate::ids::ContactHandle> = match matching.first() {
        Some(esc) => {
            let mut contacts = esc.contacts.clone();
            for &group in &esc.contact_groups {
                for &member in &graph.contact_group(group).members {
                    if !contacts.contains(&member) {
                        contacts.push(member);
                    }
                }
            }
            contacts
        }
        None => ops::effective_contacts(graph, checkable),
    };

    candidates
        .into_iter()
        .filter(|&contact_handle| contact_is_eligible(graph, ctx.now, contact_handle, checkable, state_bit))
        .collect()
}

fn contact_is_eligible(
    graph: &crate::model::ObjectGraph,
    now: DateTime<Utc>,
    contact_handle: crate::ids::ContactHandle,
    checkable: CheckableHandle,
    state_bit: u8,
) -> bool {
    let contact = graph.contact(contact_handle);
    let (enabled, notify_on, period) = match checkable {
        CheckableHandle::Host(_) => (
            contact.host_notifications_enabled,
            contact.notify_on_host,
            contact.host_notification_period,
        ),
        CheckableHandle::Service(_) => (
            contact.service_notifications_enabled,
            contact.notify_on_service,
            contact.service_notification_period,
        ),
    };
    if !enabled {
        return false;
    }
    if notify_on & state_bit == 0 {
        return false;
    }
    match period {
        Some(p) => crate::time_period::is_valid(graph, now, p),
        None => true,
    }
}

fn base_macros(ctx: &EngineContext, checkable: CheckableHandle) -> HashMap<String, String> {
    let graph = &ctx.graph;
    let mut values = HashMap::new();
    values.insert("DISPLAYNAME".to_string(), ops::display_name(graph, checkable));
    values.insert("LONGDATETIME".to_string(), ctx.now.to_rfc2822());
    match checkable {
        CheckableHandle::Host(h) => {
            let host = graph.host(h);
            values.insert("HOSTNAME".to_string(), host.name.clone());
            values.insert("HOSTOUTPUT".to_string(), host.common.plugin_output.clone());
        }
        CheckableHandle::Service(s) => {
            let service = graph.service(s);
            let host = graph.host(service.host);
            values.insert("HOSTNAME".to_string(), host.name.clone());
            values.insert("SERVICEDESC".to_string(), service.description.clone());
            values.insert("SERVICEOUTPUT".to_string(), service.common.plugin_output.clone());
        }
    }
    for (k, v) in ops::custom_variables(graph, checkable) {
        values.insert(format!("_{k}"), v);
    }
    values
}

fn post_dispatch(ctx: &mut EngineContext, checkable: CheckableHandle, kind: NotificationKind) {
    if kind == NotificationKind::Recovery {
        ops::reset_notification_number(&mut ctx.graph, checkable);
        return;
    }
    let id = ctx.notification_ids.next();
    let interval = ops::notification_interval(&ctx.graph, checkable);
    ops::record_notification_sent(&mut ctx.graph, checkable, ctx.now, interval, id);
}

//! Checkable state machine (spec.md §4.5): the transition algorithm shared
//! by hosts and services. Host and service logic are written as parallel
//! functions rather than one generic function — `CheckableCommon<S>` erases
//! which concrete state enum is in play, but the host reachability rewrite
//! and service host-gating are each specific to one side.

pub mod flap;
pub mod reachability;

use chrono::{DateTime, Utc};

use crate::context::EngineContext;
use crate::executor::CheckResult;
use crate::ids::{CheckableHandle, HostHandle, ServiceHandle};
use crate::model::{CheckType, HostState, ServiceState, StateType};
use crate::notification::NotificationKind;

pub async fn process_check_result(
    ctx: &mut EngineContext,
    checkable: CheckableHandle,
    result: CheckResult,
    check_type: CheckType,
    scheduled_for: DateTime<Utc>,
) {
    match checkable {
        CheckableHandle::Host(h) => process_host(ctx, h, result, check_type, scheduled_for).await,
        CheckableHandle::Service(s) => process_service(ctx, s, result, check_type, scheduled_for).await,
    }
}

async fn process_host(
    ctx: &mut EngineContext,
    handle: HostHandle,
    result: CheckResult,
    check_type: CheckType,
    scheduled_for: DateTime<Utc>,
) {
    let raw = HostState::from_exit_code(result.exit_code);
    let probed = reachability::rewrite(&ctx.graph, handle, raw);

    let (old_state, old_state_type, old_output) = {
        let common = &ctx.graph.host(handle).common;
        (common.current_state, common.state_type, common.plugin_output.clone())
    };

    let (current_attempt, new_state_type) = advance_attempt_counter(
        old_state,
        old_state_type,
        probed,
        ctx.graph.host(handle).common.current_attempt,
        ctx.graph.host(handle).common.max_attempts,
        probed == HostState::Up,
    );

    let state_changed = probed != old_state;
    let promoted_hard = new_state_type == StateType::Hard;
    let recovery = promoted_hard && probed == HostState::Up && old_state != HostState::Up;

    {
        let host = ctx.graph.host_mut(handle);
        let common = &mut host.common;
        common.last_state = old_state;
        common.current_state = probed;
        common.state_type = new_state_type;
        common.current_attempt = current_attempt;
        common.has_been_checked = true;
        common.last_check = Some(result.start_time);
        common.latency = result.latency(scheduled_for).num_milliseconds() as f64 / 1000.0;
        common.execution_time = result.execution_time().num_milliseconds() as f64 / 1000.0;
        common.plugin_output = result.plugin_output.clone();
        common.long_plugin_output = result.long_plugin_output.clone();
        common.perf_data = result.perf_data.clone();
        if state_changed {
            common.last_state_change = Some(ctx.now);
        }
        if promoted_hard && (state_changed || common.last_hard_state != probed) {
            common.last_hard_state_change = Some(ctx.now);
            common.last_hard_state = probed;
        }
        common.last_time_in_state.insert(format!("{probed:?}"), ctx.now);
    }

    tracing::trace!(?check_type, "applying check result");

    stalk_log(ctx, CheckableHandle::Host(handle), &old_output, probed != old_state);

    let flap_transition = flap::record_and_evaluate(&mut ctx.graph.host_mut(handle).common, probed);
    apply_flap_transition(ctx, CheckableHandle::Host(handle), flap_transition).await;

    crate::downtime_manager::maybe_activate_flexible(ctx, CheckableHandle::Host(handle), probed != HostState::Up);
    crate::ack::on_transition(ctx, CheckableHandle::Host(handle), recovery, state_changed);

    if promoted_hard {
        if recovery {
            crate::notification::notify(ctx, CheckableHandle::Host(handle), NotificationKind::Recovery).await;
        } else if probed != HostState::Up {
            // Covers both the first HARD problem and later re-notifications;
            // `notify`'s eligibility gate (clauses 9/10) decides whether a
            // message actually goes out this call.
            crate::notification::notify(ctx, CheckableHandle::Host(handle), NotificationKind::Problem).await;
        }
    }

    if promoted_hard {
        propagate_host_hard_transition(ctx, handle);
    }
}

async fn process_service(
    ctx: &mut EngineContext,
    handle: ServiceHandle,
    result: CheckResult,
    check_type: CheckType,
    scheduled_for: DateTime<Utc>,
) {
    let raw = ServiceState::from_exit_code(result.exit_code);

    let (old_state, old_state_type, old_output) = {
        let common = &ctx.graph.service(handle).common;
        (common.current_state, common.state_type, common.plugin_output.clone())
    };

    let (current_attempt, new_state_type) = advance_attempt_counter(
        old_state,
        old_state_type,
        raw,
        ctx.graph.service(handle).common.current_attempt,
        ctx.graph.service(handle).common.max_attempts,
        raw == ServiceState::Ok,
    );

    let state_changed = raw != old_state;
    let promoted_hard = new_state_type == StateType::Hard;
    let recovery = promoted_hard && raw == ServiceState::Ok && old_state != ServiceState::Ok;

    let host_handle = ctx.graph.service(handle).host;
    let host_problem = !crate::checkable_ops::host_is_up(&ctx.graph, host_handle);

    {
        let service = ctx.graph.service_mut(handle);
        service.host_problem_at_last_check = host_problem;
        let common = &mut service.common;
        common.last_state = old_state;
        common.current_state = raw;
        common.state_type = new_state_type;
        common.current_attempt = current_attempt;
        common.has_been_checked = true;
        common.last_check = Some(result.start_time);
        common.latency = result.latency(scheduled_for).num_milliseconds() as f64 / 1000.0;
        common.execution_time = result.execution_time().num_milliseconds() as f64 / 1000.0;
        common.plugin_output = result.plugin_output.clone();
        common.long_plugin_output = result.long_plugin_output.clone();
        common.perf_data = result.perf_data.clone();
        if state_changed {
            common.last_state_change = Some(ctx.now);
        }
        if promoted_hard && (state_changed || common.last_hard_state != raw) {
            common.last_hard_state_change = Some(ctx.now);
            common.last_hard_state = raw;
        }
        common.last_time_in_state.insert(format!("{raw:?}"), ctx.now);
    }

    tracing::trace!(?check_type, "applying check result");

    stalk_log(ctx, CheckableHandle::Service(handle), &old_output, raw != old_state);

    let flap_transition = flap::record_and_evaluate(&mut ctx.graph.service_mut(handle).common, raw);
    apply_flap_transition(ctx, CheckableHandle::Service(handle), flap_transition).await;

    crate::downtime_manager::maybe_activate_flexible(ctx, CheckableHandle::Service(handle), raw != ServiceState::Ok);
    crate::ack::on_transition(ctx, CheckableHandle::Service(handle), recovery, state_changed);

    if promoted_hard {
        if recovery {
            crate::notification::notify(ctx, CheckableHandle::Service(handle), NotificationKind::Recovery).await;
        } else if raw != ServiceState::Ok {
            crate::notification::notify(ctx, CheckableHandle::Service(handle), NotificationKind::Problem).await;
        }
    }
}

/// Spec.md §4.5 step 3 (attempt counter) followed by step 4 (state-type
/// promotion), generic across host/service state enums. `probed_is_up_ok`
/// tells the counter whether `probed_state` is the recovered state, since
/// that's the one case the spec singles out by meaning rather than equality.
fn advance_attempt_counter<S: Copy + PartialEq>(
    old_state: S,
    old_state_type: StateType,
    probed_state: S,
    current_attempt: u32,
    max_attempts: u32,
    probed_is_up_ok: bool,
) -> (u32, StateType) {
    let next_attempt = if probed_state == old_state && probed_is_up_ok && old_state_type == StateType::Hard {
        1 // steady-state recovery
    } else if probed_state == old_state && old_state_type == StateType::Soft {
        (current_attempt + 1).min(max_attempts)
    } else if probed_state != old_state {
        1 // any fresh transition restarts the attempt count
    } else {
        // Steady-state HARD problem (e.g. repeated HARD DOWN): attempt count
        // holds at whatever it already settled on.
        current_attempt.clamp(1, max_attempts)
    };

    let state_type = if next_attempt >= max_attempts || probed_is_up_ok {
        StateType::Hard
    } else {
        StateType::Soft
    };
    (next_attempt, state_type)
}

fn stalk_log(ctx: &EngineContext, checkable: CheckableHandle, old_output: &str, state_changed: bool) {
    if state_changed {
        return;
    }
    let stalked = match checkable {
        CheckableHandle::Host(h) => {
            let common = &ctx.graph.host(h).common;
            common.stalk_on.contains(&common.current_state) && common.plugin_output != old_output
        }
        CheckableHandle::Service(s) => {
            let common = &ctx.graph.service(s).common;
            common.stalk_on.contains(&common.current_state) && common.plugin_output != old_output
        }
    };
    if stalked {
        tracing::info!(checkable = %checkable, "stalked output change with no state change");
    }
}

async fn apply_flap_transition(ctx: &mut EngineContext, checkable: CheckableHandle, transition: flap::FlapTransition) {
    use crate::model::comment::{Comment, CommentEntryType, CommentSource};
    match transition {
        flap::FlapTransition::None => {}
        flap::FlapTransition::Started => {
            let comment = Comment {
                comment_id: ctx.comment_ids.next(),
                target: checkable,
                entry_type: CommentEntryType::Flapping,
                source: CommentSource::Internal,
                persistent: false,
                expires: false,
                expire_time: None,
                author: "sentinel".to_string(),
                comment_data: "started flapping".to_string(),
                entry_time: ctx.now,
            };
            let id = ctx.add_comment(comment);
            crate::checkable_ops::set_flapping_comment_id(&mut ctx.graph, checkable, Some(id));
            crate::notification::notify(ctx, checkable, NotificationKind::FlappingStart).await;
        }
        flap::FlapTransition::Stopped => {
            if let Some(id) = crate::checkable_ops::flapping_comment_id(&ctx.graph, checkable) {
                ctx.remove_comment(id);
            }
            crate::checkable_ops::set_flapping_comment_id(&mut ctx.graph, checkable, None);
            crate::notification::notify(ctx, checkable, NotificationKind::FlappingStop).await;
        }
    }
}

/// Spec.md §4.5 step 8: a host hard-transition reschedules its child hosts
/// (reachability may have changed) and its own hosted services
/// (`host_problem_at_last_check` flips).
fn propagate_host_hard_transition(ctx: &mut EngineContext, handle: HostHandle) {
    let children: Vec<HostHandle> = ctx.graph.host(handle).child_hosts.iter().copied().collect();
    for child in children {
        crate::scheduler::schedule_immediate_host_recheck(ctx, child);
    }
    let services: Vec<ServiceHandle> = ctx.graph.services_of(handle).collect();
    for service in services {
        crate::scheduler::schedule_immediate_service_recheck(ctx, service);
    }
}

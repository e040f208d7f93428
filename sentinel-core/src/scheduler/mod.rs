//! Scheduler (component B, spec.md §4.4): a single-threaded event loop over
//! two priority queues, the one place wall-clock time and the object graph
//! meet.

pub mod events;

pub use events::{EventKind, TimedEvent, TimingOption};

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::context::{EngineContext, ReapedResult};
use crate::ids::{CheckableHandle, HostHandle, IdSequence, ServiceHandle};
use crate::model::{CheckType, StateType};

static EVENT_SEQUENCE: IdSequence = IdSequence::new();

/// Min-heap ordering key: earliest `run_time` first, ties broken by
/// insertion `sequence` (spec.md §4.4).
#[derive(Clone, Debug)]
struct QueuedEvent(TimedEvent);

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.run_time == other.0.run_time && self.0.sequence == other.0.sequence
    }
}
impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest event.
        other
            .0
            .run_time
            .cmp(&self.0.run_time)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}
impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Dual high/low priority queues (spec.md §4.4: "the 'high' queue holds
/// always-recurring infrastructure events; the 'low' queue holds checkable
/// events; on each tick the earliest across both is selected").
#[derive(Default)]
pub struct EventQueue {
    high: BinaryHeap<QueuedEvent>,
    low: BinaryHeap<QueuedEvent>,
}

impl EventQueue {
    pub fn schedule(
        &mut self,
        run_time: DateTime<Utc>,
        kind: EventKind,
        recurring: bool,
        interval: Option<chrono::Duration>,
        timing_option: TimingOption,
    ) {
        let event = TimedEvent {
            run_time,
            kind,
            recurring,
            interval,
            timing_option,
            sequence: EVENT_SEQUENCE.next(),
        };
        if event.kind.is_infrastructure() {
            self.high.push(QueuedEvent(event));
        } else {
            self.low.push(QueuedEvent(event));
        }
    }

    fn peek_earliest(&self) -> Option<&TimedEvent> {
        match (self.high.peek(), self.low.peek()) {
            (Some(h), Some(l)) => {
                if h.0.run_time <= l.0.run_time {
                    Some(&h.0)
                } else {
                    Some(&l.0)
                }
            }
            (Some(h), None) => Some(&h.0),
            (None, Some(l)) => Some(&l.0),
            (None, None) => None,
        }
    }

    /// Pops whichever queue currently holds the earliest event.
    fn pop_earliest(&mut self) -> Option<TimedEvent> {
        let take_high = match (self.high.peek(), self.low.peek()) {
            (Some(h), Some(l)) => h.0.run_time <= l.0.run_time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if take_high {
            self.high.pop().map(|q| q.0)
        } else {
            self.low.pop().map(|q| q.0)
        }
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }
}

/// Computes the active-check interval in wall-clock seconds for the
/// checkable's current `state_type` (spec.md §4.4: retry interval while
/// SOFT, check interval once HARD).
fn interval_seconds(state_type: StateType, check_interval: f64, retry_interval: f64, interval_length: u32) -> i64 {
    let units = match state_type {
        StateType::Soft => retry_interval,
        StateType::Hard => check_interval,
    };
    (units * interval_length as f64).round() as i64
}

/// Computes and clamps the next run time against the checkable's
/// `check_period`, advancing to `next_valid` if the raw candidate falls
/// outside it (spec.md §4.4).
fn next_check_time(
    ctx: &EngineContext,
    raw_next: DateTime<Utc>,
    check_period: Option<crate::ids::TimePeriodHandle>,
) -> DateTime<Utc> {
    match check_period {
        Some(tp) if !crate::time_period::is_valid(&ctx.graph, raw_next, tp) => {
            crate::time_period::next_valid(&ctx.graph, raw_next, tp).unwrap_or(raw_next)
        }
        _ => raw_next,
    }
}

/// Schedules (or reschedules) the next active check for a host, honoring
/// `checks_enabled`/`should_be_scheduled` gating (spec.md §4.4, §3.1).
pub fn schedule_host_check(ctx: &mut EngineContext, handle: HostHandle) {
    let host = ctx.graph.host(handle);
    if !host.common.checks_enabled || !host.common.should_be_scheduled {
        return;
    }
    let last = host.common.last_check.unwrap_or(ctx.now);
    let secs = interval_seconds(
        host.common.state_type,
        host.common.check_interval,
        host.common.retry_interval,
        ctx.config.interval_length,
    );
    let raw_next = last + chrono::Duration::seconds(secs.max(1));
    let next = next_check_time(ctx, raw_next, host.common.check_period);
    ctx.graph.host_mut(handle).common.next_check = Some(next);
    ctx.events.schedule(
        next,
        EventKind::ActiveHostCheck(handle),
        false,
        None,
        TimingOption::RespectCheckPeriod,
    );
}

pub fn schedule_service_check(ctx: &mut EngineContext, handle: ServiceHandle) {
    let service = ctx.graph.service(handle);
    if !service.common.checks_enabled || !service.common.should_be_scheduled {
        return;
    }
    let last = service.common.last_check.unwrap_or(ctx.now);
    let secs = interval_seconds(
        service.common.state_type,
        service.common.check_interval,
        service.common.retry_interval,
        ctx.config.interval_length,
    );
    let raw_next = last + chrono::Duration::seconds(secs.max(1));
    let next = next_check_time(ctx, raw_next, service.common.check_period);
    ctx.graph.service_mut(handle).common.next_check = Some(next);
    ctx.events.schedule(
        next,
        EventKind::ActiveServiceCheck(handle),
        false,
        None,
        TimingOption::RespectCheckPeriod,
    );
}

/// Forces an immediate re-check regardless of the normal interval cadence
/// (spec.md §4.5 step 8: host-dependent re-checks on a parent's hard
/// transition).
pub fn schedule_immediate_host_recheck(ctx: &mut EngineContext, handle: HostHandle) {
    let host = ctx.graph.host(handle);
    if !host.common.checks_enabled || !host.common.should_be_scheduled {
        return;
    }
    ctx.graph.host_mut(handle).common.next_check = Some(ctx.now);
    ctx.events.schedule(
        ctx.now,
        EventKind::ActiveHostCheck(handle),
        false,
        None,
        TimingOption::Anytime,
    );
}

pub fn schedule_immediate_service_recheck(ctx: &mut EngineContext, handle: ServiceHandle) {
    let service = ctx.graph.service(handle);
    if !service.common.checks_enabled || !service.common.should_be_scheduled {
        return;
    }
    ctx.graph.service_mut(handle).common.next_check = Some(ctx.now);
    ctx.events.schedule(
        ctx.now,
        EventKind::ActiveServiceCheck(handle),
        false,
        None,
        TimingOption::Anytime,
    );
}

/// Distributes first checks across `max(max_check_spread_minutes, 1)`
/// minutes on cold start (spec.md §4.4 "Initial spread"), so every
/// checkable doesn't fire its first check in the same instant.
pub fn spread_initial_checks(ctx: &mut EngineContext) {
    let spread_minutes = ctx.config.max_check_spread_minutes.max(1) as i64;
    let host_handles: Vec<HostHandle> = (0..ctx.graph.hosts.len() as u32).map(HostHandle).collect();
    let total = host_handles.len().max(1);
    for (i, handle) in host_handles.into_iter().enumerate() {
        let offset_secs = (spread_minutes * 60 * i as i64) / total as i64;
        ctx.graph.host_mut(handle).common.last_check =
            Some(ctx.now - chrono::Duration::seconds(offset_secs));
        schedule_host_check(ctx, handle);
    }

    let service_handles: Vec<ServiceHandle> =
        (0..ctx.graph.services.len() as u32).map(ServiceHandle).collect();
    let total = service_handles.len().max(1);
    for (i, handle) in service_handles.into_iter().enumerate() {
        let offset_secs = (spread_minutes * 60 * i as i64) / total as i64;
        ctx.graph.service_mut(handle).common.last_check =
            Some(ctx.now - chrono::Duration::seconds(offset_secs));
        schedule_service_check(ctx, handle);
    }

    // Recurring infrastructure events.
    ctx.events.schedule(
        ctx.now + ctx.config.check_reaper_interval,
        EventKind::CheckReaper,
        true,
        Some(ctx.config.check_reaper_interval),
        TimingOption::Anytime,
    );
    ctx.events.schedule(
        ctx.now + ctx.config.orphan_check_interval,
        EventKind::OrphanCheck,
        true,
        Some(ctx.config.orphan_check_interval),
        TimingOption::Anytime,
    );
    ctx.events.schedule(
        ctx.now + ctx.config.freshness_check_interval,
        EventKind::SFreshnessCheck,
        true,
        Some(ctx.config.freshness_check_interval),
        TimingOption::Anytime,
    );
    ctx.events.schedule(
        ctx.now + ctx.config.freshness_check_interval,
        EventKind::HFreshnessCheck,
        true,
        Some(ctx.config.freshness_check_interval),
        TimingOption::Anytime,
    );
    ctx.events.schedule(
        ctx.now + ctx.config.retention_save_interval,
        EventKind::RetentionSave,
        true,
        Some(ctx.config.retention_save_interval),
        TimingOption::Anytime,
    );
    ctx.events.schedule(
        ctx.now + ctx.config.status_save_interval,
        EventKind::StatusSave,
        true,
        Some(ctx.config.status_save_interval),
        TimingOption::Anytime,
    );
}

/// Launches a check in the background without blocking the tick loop; the
/// result arrives on `ctx.result_tx` and is applied by a later CHECK_REAPER
/// sweep (spec.md §4.4: "results are applied in the order they are reaped").
fn launch_check(ctx: &EngineContext, checkable: CheckableHandle, scheduled_for: DateTime<Utc>) {
    if !crate::checkable_ops::execution_dependencies_met(&ctx.graph, ctx.now, checkable) {
        tracing::debug!(checkable = %checkable, "execution dependency unmet, skipping check");
        return;
    }

    let (connector, argv, cmdline, timeout, timeout_exit_code) = match checkable {
        CheckableHandle::Host(h) => {
            let host = ctx.graph.host(h);
            let Some(cmd_handle) = host.common.check_command else { return };
            let cmd = ctx.graph.command(cmd_handle);
            (
                cmd.connector.clone(),
                host.common.check_command_args.clone(),
                cmd.command_line.clone(),
                ctx.config.command_timeout,
                ctx.config.host_timeout_state,
            )
        }
        CheckableHandle::Service(s) => {
            let service = ctx.graph.service(s);
            let Some(cmd_handle) = service.common.check_command else { return };
            let cmd = ctx.graph.command(cmd_handle);
            (
                cmd.connector.clone(),
                service.common.check_command_args.clone(),
                cmd.command_line.clone(),
                ctx.config.command_timeout,
                ctx.config.service_timeout_state,
            )
        }
    };

    let dispatch = ctx.dispatch.clone();
    let tx = ctx.result_tx.clone();
    tokio::spawn(async move {
        let result = dispatch
            .execute(connector.as_deref(), &argv, &cmdline, timeout, timeout_exit_code)
            .await;
        let _ = tx
            .send(ReapedResult {
                checkable,
                result,
                check_type: CheckType::Active,
                scheduled_for,
            })
            .await;
    });
}

/// CHECK_REAPER: drains whatever results have arrived without blocking, and
/// feeds each to the state machine (spec.md §4.4, §4.5).
pub async fn reap_results(ctx: &mut EngineContext) {
    let mut reaped = Vec::new();
    while let Ok(r) = ctx.result_rx.try_recv() {
        reaped.push(r);
    }
    for r in reaped {
        crate::state_machine::process_check_result(ctx, r.checkable, r.result, r.check_type, r.scheduled_for).await;
    }
}

/// OrphanCheck: a checkable whose `next_check` is more than twice its
/// interval in the past has no in-flight result pending; reschedule it
/// immediately (spec.md §4.4 "Orphan detection").
pub fn check_orphans(ctx: &mut EngineContext) {
    let hosts: Vec<HostHandle> = (0..ctx.graph.hosts.len() as u32).map(HostHandle).collect();
    for handle in hosts {
        let host = ctx.graph.host(handle);
        let Some(next_check) = host.common.next_check else { continue };
        if !host.common.checks_enabled {
            continue;
        }
        let secs = interval_seconds(
            host.common.state_type,
            host.common.check_interval,
            host.common.retry_interval,
            ctx.config.interval_length,
        );
        if ctx.now - next_check > chrono::Duration::seconds(secs.max(1) * 2) {
            tracing::warn!(host = %host.name, "orphaned host check, rescheduling");
            schedule_host_check(ctx, handle);
        }
    }

    let services: Vec<ServiceHandle> = (0..ctx.graph.services.len() as u32).map(ServiceHandle).collect();
    for handle in services {
        let service = ctx.graph.service(handle);
        let Some(next_check) = service.common.next_check else { continue };
        if !service.common.checks_enabled {
            continue;
        }
        let secs = interval_seconds(
            service.common.state_type,
            service.common.check_interval,
            service.common.retry_interval,
            ctx.config.interval_length,
        );
        if ctx.now - next_check > chrono::Duration::seconds(secs.max(1) * 2) {
            tracing::warn!(service = %service.description, "orphaned service check, rescheduling");
            schedule_service_check(ctx, handle);
        }
    }
}

/// Freshness check: when `check_freshness` is set and the last result is
/// older than `freshness_threshold + additional_freshness_latency`,
/// synthesize a passive result declaring staleness (spec.md §4.4).
pub async fn check_freshness(ctx: &mut EngineContext, hosts: bool) {
    let latency = ctx.config.additional_freshness_latency;
    if hosts {
        let handles: Vec<HostHandle> = (0..ctx.graph.hosts.len() as u32).map(HostHandle).collect();
        for handle in handles {
            let host = ctx.graph.host(handle);
            if !host.common.check_freshness {
                continue;
            }
            let stale_after = host.common.freshness_threshold + latency;
            let last = host.common.last_check.unwrap_or(ctx.now);
            if ctx.now - last > stale_after {
                tracing::info!(host = %host.name, "host result is stale, synthesizing passive result");
                let result = crate::executor::CheckResult {
                    command_id: 0,
                    exit_code: ctx.config.host_timeout_state,
                    exit_status: crate::executor::ExitStatus::Timeout,
                    start_time: ctx.now,
                    end_time: ctx.now,
                    plugin_output: "results are stale".to_string(),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                };
                crate::state_machine::process_check_result(
                    ctx,
                    CheckableHandle::Host(handle),
                    result,
                    CheckType::Passive,
                    ctx.now,
                )
                .await;
            }
        }
    } else {
        let handles: Vec<ServiceHandle> = (0..ctx.graph.services.len() as u32).map(ServiceHandle).collect();
        for handle in handles {
            let service = ctx.graph.service(handle);
            if !service.common.check_freshness {
                continue;
            }
            let stale_after = service.common.freshness_threshold + latency;
            let last = service.common.last_check.unwrap_or(ctx.now);
            if ctx.now - last > stale_after {
                tracing::info!(service = %service.description, "service result is stale, synthesizing passive result");
                let result = crate::executor::CheckResult {
                    command_id: 0,
                    exit_code: ctx.config.service_timeout_state,
                    exit_status: crate::executor::ExitStatus::Timeout,
                    start_time: ctx.now,
                    end_time: ctx.now,
                    plugin_output: "results are stale".to_string(),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                };
                crate::state_machine::process_check_result(
                    ctx,
                    CheckableHandle::Service(handle),
                    result,
                    CheckType::Passive,
                    ctx.now,
                )
                .await;
            }
        }
    }
}

/// Runs one iteration of the scheduler tick (spec.md §4.4 steps 1-5): peek
/// the earliest event across both queues, sleep until it's due (draining the
/// external command queue while waiting), pop it, dispatch, and reschedule
/// if recurring.
pub async fn tick(ctx: &mut EngineContext) {
    ctx.tick_now();

    let wake_at = ctx.events.peek_earliest().map(|e| e.run_time);
    let sleep_for = match wake_at {
        Some(at) if at > ctx.now => (at - ctx.now).to_std().unwrap_or(ctx.config.sleep_time),
        Some(_) => std::time::Duration::ZERO,
        None => ctx.config.sleep_time,
    }
    .min(ctx.config.sleep_time.max(std::time::Duration::from_millis(50)));

    if !sleep_for.is_zero() {
        tokio::time::sleep(sleep_for).await;
        ctx.tick_now();
    }

    crate::commands::drain(ctx).await;

    let Some(event) = ctx.events.pop_earliest() else { return };
    if event.run_time > ctx.now {
        // Not due yet; put it back and wait for the next tick.
        ctx.events.schedule(
            event.run_time,
            event.kind,
            event.recurring,
            event.interval,
            event.timing_option,
        );
        return;
    }

    dispatch_event(ctx, &event).await;

    if event.recurring {
        if let Some(interval) = event.interval {
            ctx.events.schedule(
                event.run_time + interval,
                event.kind,
                true,
                Some(interval),
                event.timing_option,
            );
        }
    }
}

async fn dispatch_event(ctx: &mut EngineContext, event: &TimedEvent) {
    match event.kind {
        EventKind::ActiveHostCheck(h) => {
            launch_check(ctx, CheckableHandle::Host(h), event.run_time);
            schedule_host_check(ctx, h);
        }
        EventKind::ActiveServiceCheck(s) => {
            launch_check(ctx, CheckableHandle::Service(s), event.run_time);
            schedule_service_check(ctx, s);
        }
        EventKind::CheckReaper => reap_results(ctx).await,
        EventKind::OrphanCheck => check_orphans(ctx),
        EventKind::SFreshnessCheck => check_freshness(ctx, false).await,
        EventKind::HFreshnessCheck => check_freshness(ctx, true).await,
        EventKind::ExpireComment(id) => {
            ctx.remove_comment(id);
        }
        EventKind::ExpireDowntime(id) => {
            crate::downtime_manager::expire_downtime(ctx, id);
        }
        EventKind::ScheduledDowntimeStart(id) => {
            crate::downtime_manager::activate_downtime(ctx, id);
        }
        EventKind::ScheduledDowntimeEnd(id) => {
            crate::downtime_manager::stop_downtime_notifying(ctx, id).await;
        }
        EventKind::RetentionSave | EventKind::StatusSave | EventKind::LogRotation | EventKind::CommandCheck => {
            // Handled by the server binary's own periodic writers; the core
            // crate only needs to keep the slot occupied in the queue so
            // infrastructure cadence stays uniform.
        }
        EventKind::UserFunction(name) => {
            tracing::debug!(name, "user function event fired (no-op in this build)");
        }
    }
}

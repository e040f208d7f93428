//! End-to-end scenarios driving the checkable state machine through a bare
//! `EngineContext`, the way a single CHECK_REAPER sweep would apply a batch
//! of reaped results (spec.md §4.4, §4.5).

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sentinel_core::executor::{CheckResult, Dispatch, ExitStatus};
use sentinel_core::ids::CheckableHandle;
use sentinel_core::model::downtime::{AcknowledgementType, Downtime, DowntimeKind};
use sentinel_core::model::{CheckType, Host, HostState, ObjectGraph, Service, ServiceState, StateType};
use sentinel_core::{ack, downtime_manager, state_machine, EngineConfig, EngineContext};

fn bare_ctx(graph: ObjectGraph) -> EngineContext {
    EngineContext::new(graph, Dispatch::new(HashMap::new()), EngineConfig::default())
}

fn ok_result(exit_code: i32, at: chrono::DateTime<Utc>) -> CheckResult {
    CheckResult {
        command_id: 1,
        exit_code,
        exit_status: ExitStatus::Normal,
        start_time: at,
        end_time: at,
        plugin_output: "synthetic".to_string(),
        long_plugin_output: String::new(),
        perf_data: String::new(),
    }
}

/// SOFT -> SOFT -> HARD on three consecutive failures with `max_attempts = 3`
/// (spec.md §4.5 steps 3-4).
#[tokio::test]
async fn service_escalates_soft_to_hard_over_max_attempts() {
    let mut graph = ObjectGraph::new();
    let host = graph.add_host(Host::new("web01"));
    let mut service = Service::new(host, "https");
    service.common.max_attempts = 3;
    let svc = graph.add_service(service);
    let mut ctx = bare_ctx(graph);
    let target = CheckableHandle::Service(svc);

    for attempt in 1..=2 {
        state_machine::process_check_result(&mut ctx, target, ok_result(2, ctx.now), CheckType::Active, ctx.now).await;
        let common = &ctx.graph.service(svc).common;
        assert_eq!(common.state_type, StateType::Soft, "attempt {attempt} should still be SOFT");
        assert_eq!(common.current_attempt, attempt);
        assert_eq!(common.current_state, ServiceState::Critical);
    }

    state_machine::process_check_result(&mut ctx, target, ok_result(2, ctx.now), CheckType::Active, ctx.now).await;
    let common = &ctx.graph.service(svc).common;
    assert_eq!(common.state_type, StateType::Hard);
    assert_eq!(common.current_attempt, 3);
    assert_eq!(common.current_state, ServiceState::Critical);
}

/// A normal acknowledgement clears on any state change, even one that isn't
/// a recovery; a sticky acknowledgement survives until the checkable
/// actually recovers (spec.md §4.8).
#[tokio::test]
async fn normal_ack_clears_on_any_change_sticky_ack_waits_for_recovery() {
    let mut graph = ObjectGraph::new();
    let host = graph.add_host(Host::new("web01"));
    let mut service = Service::new(host, "https");
    service.common.max_attempts = 1; // every result is HARD immediately
    let svc = graph.add_service(service);
    let mut ctx = bare_ctx(graph);
    let target = CheckableHandle::Service(svc);

    state_machine::process_check_result(&mut ctx, target, ok_result(2, ctx.now), CheckType::Active, ctx.now).await;
    ack::acknowledge(&mut ctx, target, AcknowledgementType::Normal, "alice".to_string(), "looking".to_string()).await;
    assert!(ctx.graph.service(svc).common.is_acknowledged());

    // Critical -> Warning is a state change but not a recovery; the normal
    // ack should clear anyway.
    state_machine::process_check_result(&mut ctx, target, ok_result(1, ctx.now), CheckType::Active, ctx.now).await;
    assert!(!ctx.graph.service(svc).common.is_acknowledged());

    ack::acknowledge(&mut ctx, target, AcknowledgementType::Sticky, "bob".to_string(), "paging on-call".to_string()).await;
    state_machine::process_check_result(&mut ctx, target, ok_result(2, ctx.now), CheckType::Active, ctx.now).await;
    assert!(ctx.graph.service(svc).common.is_acknowledged(), "sticky ack survives a non-recovery change");

    state_machine::process_check_result(&mut ctx, target, ok_result(0, ctx.now), CheckType::Active, ctx.now).await;
    assert!(!ctx.graph.service(svc).common.is_acknowledged(), "sticky ack clears on recovery");
}

/// A child of a DOWN parent probes as UNREACHABLE rather than DOWN, and the
/// parent's HARD transition immediately reschedules the child (spec.md
/// §4.5 steps 2 and 8).
#[tokio::test]
async fn host_reachability_propagates_to_children() {
    let mut graph = ObjectGraph::new();
    let mut parent = Host::new("gateway");
    parent.common.max_attempts = 1;
    let parent_handle = graph.add_host(parent);
    let mut child = Host::new("rack-switch");
    child.common.max_attempts = 1;
    child.parent_hosts.insert(parent_handle);
    let child_handle = graph.add_host(child);
    graph.validate_host_dag().unwrap();
    let mut ctx = bare_ctx(graph);

    state_machine::process_check_result(
        &mut ctx,
        CheckableHandle::Host(parent_handle),
        ok_result(2, ctx.now),
        CheckType::Active,
        ctx.now,
    )
    .await;
    assert_eq!(ctx.graph.host(parent_handle).common.current_state, HostState::Down);
    assert_eq!(ctx.graph.host(parent_handle).common.state_type, StateType::Hard);

    // The child was never actually probed, but its next check should now be
    // scheduled immediately rather than waiting out its interval.
    assert!(ctx.events.len() >= 1);

    state_machine::process_check_result(
        &mut ctx,
        CheckableHandle::Host(child_handle),
        ok_result(2, ctx.now),
        CheckType::Active,
        ctx.now,
    )
    .await;
    assert_eq!(ctx.graph.host(child_handle).common.current_state, HostState::Unreachable);
}

/// A flexible downtime stays dormant until the first non-OK result inside
/// its window, then activates and raises the scheduled-downtime depth
/// (spec.md §4.7).
#[tokio::test]
async fn flexible_downtime_activates_on_first_problem_result() {
    let mut graph = ObjectGraph::new();
    let host = graph.add_host(Host::new("web01"));
    let svc = graph.add_service(Service::new(host, "https"));
    let mut ctx = bare_ctx(graph);
    let target = CheckableHandle::Service(svc);

    let downtime = Downtime {
        downtime_id: 0,
        kind: DowntimeKind::Service,
        target,
        start_time: ctx.now - Duration::minutes(1),
        end_time: ctx.now + Duration::hours(1),
        duration: Duration::minutes(30),
        fixed: false,
        triggered_by: None,
        author: "alice".to_string(),
        comment: "maintenance window".to_string(),
        is_in_effect: false,
        activated_at: None,
        comment_id: None,
    };
    downtime_manager::schedule(&mut ctx, downtime);
    assert_eq!(ctx.graph.service(svc).common.scheduled_downtime_depth, 0);

    state_machine::process_check_result(&mut ctx, target, ok_result(0, ctx.now), CheckType::Active, ctx.now).await;
    assert_eq!(
        ctx.graph.service(svc).common.scheduled_downtime_depth,
        0,
        "an OK result must not activate a flexible downtime"
    );

    state_machine::process_check_result(&mut ctx, target, ok_result(2, ctx.now), CheckType::Active, ctx.now).await;
    assert_eq!(ctx.graph.service(svc).common.scheduled_downtime_depth, 1);
    assert!(ctx.downtimes.iter().any(|d| d.is_in_effect));
}

/// Twenty-one alternating observations push `percent_state_change` above the
/// high threshold and flip `is_flapping` (spec.md §4.6).
#[tokio::test]
async fn alternating_results_trigger_flap_detection() {
    let mut graph = ObjectGraph::new();
    let host = graph.add_host(Host::new("web01"));
    let mut service = Service::new(host, "https");
    service.common.flap_detection_enabled = true;
    service.common.max_attempts = 1;
    let svc = graph.add_service(service);
    let mut ctx = bare_ctx(graph);
    let target = CheckableHandle::Service(svc);

    for i in 0..30 {
        let exit_code = if i % 2 == 0 { 0 } else { 2 };
        state_machine::process_check_result(&mut ctx, target, ok_result(exit_code, ctx.now), CheckType::Active, ctx.now)
            .await;
    }

    assert!(ctx.graph.service(svc).common.is_flapping);
    assert!(ctx.graph.service(svc).common.percent_state_change > ctx.graph.service(svc).common.high_flap_threshold);
}

/// A stale result (as the freshness checker synthesizes when a plugin never
/// reports back, the same outcome a hung connector produces) carries
/// `ExitStatus::Timeout` and the configured timeout state, and the state
/// machine applies it like any other result (spec.md §4.2 step 4, §4.4
/// "Freshness checking").
#[tokio::test]
async fn stale_result_applies_configured_timeout_state() {
    let mut graph = ObjectGraph::new();
    let mut host = Host::new("web01");
    host.common.max_attempts = 1;
    let h = graph.add_host(host);
    let mut ctx = bare_ctx(graph);

    let timeout_result = CheckResult {
        command_id: 0,
        exit_code: ctx.config.host_timeout_state,
        exit_status: ExitStatus::Timeout,
        start_time: ctx.now,
        end_time: ctx.now,
        plugin_output: "results are stale".to_string(),
        long_plugin_output: String::new(),
        perf_data: String::new(),
    };
    state_machine::process_check_result(
        &mut ctx,
        CheckableHandle::Host(h),
        timeout_result,
        CheckType::Passive,
        ctx.now,
    )
    .await;

    assert_eq!(ctx.graph.host(h).common.current_state, HostState::Down);
    assert_eq!(ctx.graph.host(h).common.state_type, StateType::Hard);
    assert_eq!(ctx.graph.host(h).common.plugin_output, "results are stale");
}

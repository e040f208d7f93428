//! External command queue (spec.md §4.11): the one legitimate thread
//! boundary in the core. Producers push through a short-lived mutex;
//! the scheduler drains the queue once per tick and applies every command on
//! its own thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::checkable_ops as ops;
use crate::context::EngineContext;
use crate::ids::CheckableHandle;
use crate::model::checkable::modified_attributes;
use crate::model::comment::{Comment, CommentEntryType, CommentSource};
use crate::model::downtime::{AcknowledgementType, Downtime, DowntimeKind};
use crate::model::CheckType;

/// Typed external commands (spec.md §4.11 and §6), covering the
/// representative command families: global/per-checkable enable-disable,
/// passive result submission, downtime scheduling/cancellation,
/// acknowledgement, comment management, and process control.
#[derive(Clone, Debug)]
pub enum ExternalCommand {
    EnableHostChecks(CheckableHandle),
    DisableHostChecks(CheckableHandle),
    EnableNotifications,
    DisableNotifications,
    EnableCheckableNotifications(CheckableHandle),
    DisableCheckableNotifications(CheckableHandle),
    ProcessCheckResult {
        target: CheckableHandle,
        exit_code: i32,
        output: String,
        check_time: DateTime<Utc>,
    },
    ScheduleDowntime {
        target: CheckableHandle,
        kind: DowntimeKind,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        fixed: bool,
        triggered_by: Option<u64>,
        duration: chrono::Duration,
        author: String,
        comment: String,
    },
    DelDowntime(u64),
    AcknowledgeProblem {
        target: CheckableHandle,
        ack_type: AcknowledgementType,
        author: String,
        comment: String,
    },
    RemoveAcknowledgement(CheckableHandle),
    AddComment {
        target: CheckableHandle,
        author: String,
        comment: String,
    },
    DelComment(u64),
    RestartProgram,
    ShutdownProgram,
}

/// Single mutex-protected ingress queue, pushed to from any number of
/// producers (the FIFO reader, the CLI via IPC) and drained only from the
/// scheduler thread (spec.md §4.11, §5).
#[derive(Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<Vec<ExternalCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: ExternalCommand) {
        self.inner.lock().push(command);
    }

    fn drain_all(&self) -> Vec<ExternalCommand> {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Drains the queue and applies every command on the scheduler thread
/// (spec.md §4.11 "the scheduler drains the queue at the top of each tick").
pub async fn drain(ctx: &mut EngineContext) {
    let commands = ctx.command_queue.drain_all();
    for command in commands {
        apply(ctx, command).await;
    }
}

async fn apply(ctx: &mut EngineContext, command: ExternalCommand) {
    match command {
        ExternalCommand::EnableHostChecks(target) => set_checks_enabled(ctx, target, true),
        ExternalCommand::DisableHostChecks(target) => set_checks_enabled(ctx, target, false),
        ExternalCommand::EnableNotifications => {
            ctx.enable_notifications = true;
        }
        ExternalCommand::DisableNotifications => {
            ctx.enable_notifications = false;
        }
        ExternalCommand::EnableCheckableNotifications(target) => set_notifications_enabled(ctx, target, true),
        ExternalCommand::DisableCheckableNotifications(target) => set_notifications_enabled(ctx, target, false),
        ExternalCommand::ProcessCheckResult { target, exit_code, output, check_time } => {
            // Passive submissions go through the same transition algorithm
            // as active results (spec.md §4.5 "Freshness results follow the
            // same path"); scheduling is irrelevant here since nothing was
            // dequeued for this invocation.
            let result = crate::executor::CheckResult {
                command_id: 0,
                exit_code,
                exit_status: crate::executor::ExitStatus::Normal,
                start_time: check_time,
                end_time: check_time,
                plugin_output: output,
                long_plugin_output: String::new(),
                perf_data: String::new(),
            };
            let (plugin_output, long_plugin_output, perf_data) = crate::executor::parse_output(&result.plugin_output);
            let result = crate::executor::CheckResult {
                plugin_output,
                long_plugin_output,
                perf_data,
                ..result
            };
            let _ = ctx
                .result_tx
                .send(crate::context::ReapedResult {
                    checkable: target,
                    result,
                    check_type: CheckType::Passive,
                    scheduled_for: check_time,
                })
                .await;
        }
        ExternalCommand::ScheduleDowntime {
            target,
            kind,
            start_time,
            end_time,
            fixed,
            triggered_by,
            duration,
            author,
            comment,
        } => {
            let downtime = Downtime {
                downtime_id: 0,
                kind,
                target,
                start_time,
                end_time,
                duration,
                fixed,
                triggered_by,
                author,
                comment,
                is_in_effect: false,
                activated_at: None,
                comment_id: None,
            };
            crate::downtime_manager::schedule(ctx, downtime);
        }
        ExternalCommand::DelDowntime(id) => crate::downtime_manager::expire_downtime(ctx, id),
        ExternalCommand::AcknowledgeProblem { target, ack_type, author, comment } => {
            crate::ack::acknowledge(ctx, target, ack_type, author, comment).await;
        }
        ExternalCommand::RemoveAcknowledgement(target) => crate::ack::remove(ctx, target),
        ExternalCommand::AddComment { target, author, comment } => {
            let c = Comment {
                comment_id: ctx.comment_ids.next(),
                target,
                entry_type: CommentEntryType::User,
                source: CommentSource::External,
                persistent: true,
                expires: false,
                expire_time: None,
                author,
                comment_data: comment,
                entry_time: ctx.now,
            };
            ctx.add_comment(c);
        }
        ExternalCommand::DelComment(id) => ctx.remove_comment(id),
        ExternalCommand::RestartProgram => ctx.signals.request_restart(),
        ExternalCommand::ShutdownProgram => ctx.signals.request_shutdown(),
    }
}

fn set_checks_enabled(ctx: &mut EngineContext, target: CheckableHandle, enabled: bool) {
    match target {
        CheckableHandle::Host(h) => ctx.graph.host_mut(h).common.checks_enabled = enabled,
        CheckableHandle::Service(s) => ctx.graph.service_mut(s).common.checks_enabled = enabled,
    }
    ops::set_modified(&mut ctx.graph, target, modified_attributes::ACTIVE_CHECKS_ENABLED);
}

fn set_notifications_enabled(ctx: &mut EngineContext, target: CheckableHandle, enabled: bool) {
    match target {
        CheckableHandle::Host(h) => ctx.graph.host_mut(h).common.notifications_enabled = enabled,
        CheckableHandle::Service(s) => ctx.graph.service_mut(s).common.notifications_enabled = enabled,
    }
    ops::set_modified(&mut ctx.graph, target, modified_attributes::NOTIFICATIONS_ENABLED);
}

/// Parses one FIFO line of the form `[timestamp] COMMAND_NAME;arg1;arg2;...`
/// into the handful of command kinds that can be fully resolved without the
/// object graph (id-addressed variants); checkable-addressed commands are
/// resolved by the FIFO reader in `sentinel-server`, which has graph access.
pub fn parse_line(line: &str) -> Option<(DateTime<Utc>, String, Vec<String>)> {
    let line = line.trim();
    let rest = line.strip_prefix('[')?;
    let (ts, rest) = rest.split_once(']')?;
    let timestamp = ts.trim().parse::<i64>().ok()?;
    let time = DateTime::from_timestamp(timestamp, 0)?;
    let mut parts = rest.trim().split(';');
    let name = parts.next()?.to_string();
    let args = parts.map(str::to_string).collect();
    Some((time, name, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_command_line() {
        let (time, name, args) = parse_line("[1700000000] SCHEDULE_HOST_DOWNTIME;web01;1700003600;1700007200").unwrap();
        assert_eq!(time.timestamp(), 1700000000);
        assert_eq!(name, "SCHEDULE_HOST_DOWNTIME");
        assert_eq!(args, vec!["web01", "1700003600", "1700007200"]);
    }

    #[test]
    fn rejects_a_line_with_no_timestamp_brackets() {
        assert!(parse_line("SCHEDULE_HOST_DOWNTIME;web01").is_none());
    }

    #[test]
    fn queue_drains_in_fifo_order() {
        let queue = CommandQueue::new();
        queue.push(ExternalCommand::RestartProgram);
        queue.push(ExternalCommand::ShutdownProgram);
        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(queue.drain_all().is_empty());
    }
}

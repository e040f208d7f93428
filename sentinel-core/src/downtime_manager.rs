//! Downtime manager (spec.md §4.7): fixed downtimes activate on a timer,
//! flexible downtimes activate on the next non-OK/non-UP result inside their
//! window, and triggered downtimes cascade with their trigger.

use crate::checkable_ops as ops;
use crate::context::EngineContext;
use crate::ids::CheckableHandle;
use crate::model::comment::{Comment, CommentEntryType, CommentSource};
use crate::model::downtime::Downtime;
use crate::notification::NotificationKind;
use crate::scheduler::{EventKind, TimingOption};

/// Schedules a new downtime and its fixed-activation / flexible-expiry
/// timer events. Returns the new downtime's id.
pub fn schedule(ctx: &mut EngineContext, mut downtime: Downtime) -> u64 {
    let id = ctx.downtime_ids.next();
    downtime.downtime_id = id;
    let fixed = downtime.fixed;
    let start_time = downtime.start_time;
    let end_time = downtime.end_time;
    ctx.downtimes.push(downtime);

    if fixed {
        ctx.events.schedule(
            start_time,
            EventKind::ScheduledDowntimeStart(id),
            false,
            None,
            TimingOption::Anytime,
        );
        ctx.events.schedule(
            end_time,
            EventKind::ScheduledDowntimeEnd(id),
            false,
            None,
            TimingOption::Anytime,
        );
    } else {
        // Flexible: activation is driven by `maybe_activate_flexible` at
        // check-result time; the end-time event only cleans up if it never
        // activated (spec.md §4.7 "expired-but-never-activated").
        ctx.events.schedule(
            end_time,
            EventKind::ExpireDowntime(id),
            false,
            None,
            TimingOption::Anytime,
        );
    }
    id
}

/// Called by the scheduler's `ScheduledDowntimeStart` event (fixed
/// downtimes only).
pub fn activate_downtime(ctx: &mut EngineContext, id: u64) {
    start_downtime(ctx, id);
}

fn start_downtime(ctx: &mut EngineContext, id: u64) {
    let Some(downtime) = ctx.downtimes.iter().find(|d| d.downtime_id == id) else { return };
    if downtime.is_in_effect {
        return;
    }
    let target = downtime.target;
    let author = downtime.author.clone();
    let comment_data = downtime.comment.clone();

    let comment = Comment {
        comment_id: ctx.comment_ids.next(),
        target,
        entry_type: CommentEntryType::Downtime,
        source: CommentSource::Internal,
        persistent: true,
        expires: false,
        expire_time: None,
        author,
        comment_data,
        entry_time: ctx.now,
    };
    let comment_id = ctx.add_comment(comment);

    if let Some(d) = ctx.downtime_mut(id) {
        d.is_in_effect = true;
        d.activated_at = Some(ctx.now);
        d.comment_id = Some(comment_id);
    }
    ops::adjust_downtime_depth(&mut ctx.graph, target, 1);

    // Triggered children start immediately (spec.md §4.7).
    let triggered: Vec<u64> = ctx
        .downtimes
        .iter()
        .filter(|d| d.triggered_by == Some(id))
        .map(|d| d.downtime_id)
        .collect();
    for child_id in triggered {
        start_downtime(ctx, child_id);
    }
}

/// Called once per completed check result (spec.md §4.7): activates any
/// pending flexible downtime on the first non-OK/non-UP observation inside
/// its window.
pub fn maybe_activate_flexible(ctx: &mut EngineContext, checkable: CheckableHandle, is_problem_state: bool) {
    if !is_problem_state {
        return;
    }
    let pending: Vec<u64> = ctx
        .downtimes
        .iter()
        .filter(|d| d.target == checkable && d.is_pending(ctx.now))
        .map(|d| d.downtime_id)
        .collect();
    for id in pending {
        start_downtime(ctx, id);
    }
}

/// Stops a downtime, decrementing depth and deleting its comment
/// (spec.md §4.7). `expired` distinguishes an unactivated-flexible cleanup
/// from a normal stop for logging only.
pub fn stop_downtime(ctx: &mut EngineContext, id: u64, expired: bool) {
    let Some(idx) = ctx.downtimes.iter().position(|d| d.downtime_id == id) else { return };
    let downtime = ctx.downtimes[idx].clone_for_stop();
    if !downtime.is_in_effect {
        if expired {
            tracing::debug!(downtime_id = id, "flexible downtime expired without ever activating");
        }
        ctx.downtimes.remove(idx);
        return;
    }

    ops::adjust_downtime_depth(&mut ctx.graph, downtime.target, -1);
    if let Some(comment_id) = downtime.comment_id {
        ctx.remove_comment(comment_id);
    }
    ctx.downtimes.remove(idx);

    // Notification dispatch happens without holding the removed downtime
    // borrowed; callers awaiting this synchronously use `stop_downtime_async`.
    let _ = downtime;
}

/// Async wrapper that also sends the downtime-stop notification (spec.md
/// §4.7). Kept separate from `stop_downtime` so the purely synchronous path
/// used by `expire_downtime`/event dispatch doesn't need an executor.
pub async fn stop_downtime_notifying(ctx: &mut EngineContext, id: u64) {
    let target = ctx.downtimes.iter().find(|d| d.downtime_id == id).map(|d| d.target);
    stop_downtime(ctx, id, false);
    if let Some(target) = target {
        crate::notification::notify(ctx, target, NotificationKind::DowntimeEnd).await;
    }
}

/// Scheduler-driven expiry of a never-activated flexible downtime
/// (spec.md §4.7).
pub fn expire_downtime(ctx: &mut EngineContext, id: u64) {
    if let Some(downtime) = ctx.downtimes.iter().find(|d| d.downtime_id == id) {
        if downtime.expired_unactivated(ctx.now) {
            stop_downtime(ctx, id, true);
        }
    }
}

impl Downtime {
    /// Shallow clone used only to read fields after removal without
    /// fighting the borrow checker over `ctx.downtimes`.
    fn clone_for_stop(&self) -> Downtime {
        self.clone()
    }
}

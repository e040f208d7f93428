//! Acknowledgement tracker (spec.md §4.8): normal acknowledgements clear on
//! any state change away from the acknowledged state (including recovery);
//! sticky acknowledgements clear only on recovery to the up/ok state.

use crate::checkable_ops as ops;
use crate::context::EngineContext;
use crate::ids::CheckableHandle;
use crate::model::comment::{Comment, CommentEntryType, CommentSource};
use crate::model::downtime::AcknowledgementType;

/// Sets an acknowledgement, emitting an acknowledgement comment and
/// notification (spec.md §4.8).
pub async fn acknowledge(
    ctx: &mut EngineContext,
    checkable: CheckableHandle,
    ack_type: AcknowledgementType,
    author: String,
    comment_data: String,
) {
    ops::set_acknowledgement(&mut ctx.graph, checkable, Some(ack_type));
    let comment = Comment {
        comment_id: ctx.comment_ids.next(),
        target: checkable,
        entry_type: CommentEntryType::Acknowledgement,
        source: CommentSource::Internal,
        persistent: true,
        expires: false,
        expire_time: None,
        author,
        comment_data,
        entry_time: ctx.now,
    };
    ctx.add_comment(comment);
    ops::set_modified(&mut ctx.graph, checkable, crate::model::checkable::modified_attributes::NOTIFICATIONS_ENABLED);
    crate::notification::notify(ctx, checkable, crate::notification::NotificationKind::Acknowledgement).await;
}

/// Explicit removal via the `REMOVE_*_ACKNOWLEDGEMENT` external command.
pub fn remove(ctx: &mut EngineContext, checkable: CheckableHandle) {
    clear_and_purge_comment(ctx, checkable);
}

/// Called by the state machine after every transition (spec.md §4.5 step 6,
/// §4.8): decides whether the current acknowledgement, if any, should clear.
pub fn on_transition(ctx: &mut EngineContext, checkable: CheckableHandle, recovered: bool, state_changed: bool) {
    let Some(ack_type) = ops::acknowledgement(&ctx.graph, checkable) else {
        return;
    };
    let should_clear = match ack_type {
        AcknowledgementType::Sticky => recovered,
        AcknowledgementType::Normal => state_changed,
    };
    if should_clear {
        clear_and_purge_comment(ctx, checkable);
    }
}

fn clear_and_purge_comment(ctx: &mut EngineContext, checkable: CheckableHandle) {
    ops::set_acknowledgement(&mut ctx.graph, checkable, None);
    let to_remove: Vec<u64> = ctx
        .comments
        .iter()
        .filter(|c| c.target == checkable && c.entry_type == CommentEntryType::Acknowledgement)
        .map(|c| c.comment_id)
        .collect();
    for id in to_remove {
        ctx.remove_comment(id);
    }
}

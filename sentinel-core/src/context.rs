use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::commands::CommandQueue;
use crate::executor::{CheckResult, Dispatch};
use crate::ids::{CheckableHandle, IdSequence};
use crate::model::{Comment, Downtime, ObjectGraph};
use crate::scheduler::EventQueue;

/// Engine-wide tunables that are configuration in the original source but
/// plain fields here, since config-file parsing is out of scope (spec.md
/// §1) and `sentinel-config` hands these over already resolved.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Seconds represented by one "interval unit" in `check_interval`/
    /// `retry_interval` (spec.md §3.1).
    pub interval_length: u32,
    pub sleep_time: std::time::Duration,
    pub max_check_spread_minutes: u32,
    pub orphan_check_interval: chrono::Duration,
    pub freshness_check_interval: chrono::Duration,
    pub additional_freshness_latency: chrono::Duration,
    pub check_reaper_interval: chrono::Duration,
    pub retention_save_interval: chrono::Duration,
    pub status_save_interval: chrono::Duration,
    pub service_timeout_state: i32,
    pub host_timeout_state: i32,
    pub command_timeout: std::time::Duration,
    pub illegal_output_chars: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_length: 60,
            sleep_time: std::time::Duration::from_millis(500),
            max_check_spread_minutes: 5,
            orphan_check_interval: chrono::Duration::minutes(1),
            freshness_check_interval: chrono::Duration::minutes(1),
            additional_freshness_latency: chrono::Duration::seconds(15),
            check_reaper_interval: chrono::Duration::seconds(1),
            retention_save_interval: chrono::Duration::minutes(1),
            status_save_interval: chrono::Duration::seconds(30),
            service_timeout_state: 3, // UNKNOWN
            host_timeout_state: 1,    // DOWN
            command_timeout: std::time::Duration::from_secs(60),
            illegal_output_chars: "`~$&|'\"<>".to_string(),
        }
    }
}

/// One completed check invocation, reaped from a background task by the
/// CHECK_REAPER event (spec.md §4.4: "Results are applied in the order they
/// are reaped, not in the order checks were launched").
pub struct ReapedResult {
    pub checkable: CheckableHandle,
    pub result: CheckResult,
    pub check_type: crate::model::CheckType,
    pub scheduled_for: DateTime<Utc>,
}

/// Process-wide signal flags, the only state that legitimately lives outside
/// `EngineContext` (spec.md §9 redesign note: "process-wide state is limited
/// to signal flags... examined at the top of the scheduler tick").
#[derive(Clone, Debug, Default)]
pub struct SignalFlags {
    pub shutdown: Arc<AtomicBool>,
    pub restart: Arc<AtomicBool>,
}

impl SignalFlags {
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }
}

/// The single struct threaded explicitly through every component (spec.md
/// §9: "Re-architect as a single `engine_context` struct ... instead of
/// process-wide globals"). Owned exclusively by the scheduler thread; no
/// locks guard its fields (spec.md §5).
pub struct EngineContext {
    pub graph: ObjectGraph,
    pub events: EventQueue,
    pub dispatch: Dispatch,
    pub config: EngineConfig,
    pub signals: SignalFlags,
    pub command_queue: CommandQueue,

    pub downtimes: Vec<Downtime>,
    pub downtime_ids: IdSequence,
    pub comments: Vec<Comment>,
    pub comment_ids: IdSequence,
    pub notification_ids: IdSequence,

    pub enable_notifications: bool,

    pub result_tx: mpsc::Sender<ReapedResult>,
    pub result_rx: mpsc::Receiver<ReapedResult>,

    pub now: DateTime<Utc>,
}

impl EngineContext {
    pub fn new(graph: ObjectGraph, dispatch: Dispatch, config: EngineConfig) -> Self {
        let (result_tx, result_rx) = mpsc::channel(4096);
        Self {
            graph,
            events: EventQueue::default(),
            dispatch,
            config,
            signals: SignalFlags::default(),
            command_queue: CommandQueue::new(),
            downtimes: Vec::new(),
            downtime_ids: IdSequence::new(),
            comments: Vec::new(),
            comment_ids: IdSequence::new(),
            notification_ids: IdSequence::new(),
            enable_notifications: true,
            result_tx,
            result_rx,
            now: Utc::now(),
        }
    }

    pub fn tick_now(&mut self) {
        self.now = Utc::now();
    }

    pub fn add_comment(&mut self, comment: Comment) -> u64 {
        let id = comment.comment_id;
        self.comments.push(comment);
        id
    }

    pub fn remove_comment(&mut self, comment_id: u64) {
        self.comments.retain(|c| c.comment_id != comment_id);
    }

    pub fn downtime_mut(&mut self, id: u64) -> Option<&mut Downtime> {
        self.downtimes.iter_mut().find(|d| d.downtime_id == id)
    }
}

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::ids::{CommandHandle, ContactGroupHandle, ContactHandle, TimePeriodHandle};

/// Size of the rolling state-history ring used by the flap detector (spec.md §3.1, §4.6).
pub const STATE_HISTORY_SIZE: usize = 21;

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StateType {
    Soft,
    Hard,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckType {
    Active,
    Passive,
}

/// Bits set whenever a runtime command alters a retained attribute (spec.md §3.1).
pub mod modified_attributes {
    pub const NOTIFICATIONS_ENABLED: u32 = 1 << 0;
    pub const ACTIVE_CHECKS_ENABLED: u32 = 1 << 1;
    pub const PASSIVE_CHECKS_ENABLED: u32 = 1 << 2;
    pub const EVENT_HANDLER_ENABLED: u32 = 1 << 3;
    pub const FLAP_DETECTION_ENABLED: u32 = 1 << 4;
    pub const OBSESS_OVER: u32 = 1 << 5;
    pub const CHECK_COMMAND: u32 = 1 << 6;
    pub const CHECK_PERIOD: u32 = 1 << 7;
    pub const NOTIFICATION_PERIOD: u32 = 1 << 8;
    pub const CHECK_INTERVAL: u32 = 1 << 9;
    pub const RETRY_INTERVAL: u32 = 1 << 10;
    pub const MAX_ATTEMPTS: u32 = 1 << 11;
    pub const EVENT_HANDLER_COMMAND: u32 = 1 << 12;
}

/// State history ring buffer: fixed capacity, newest entry overwrites the
/// oldest (spec.md §3.1 "ring buffer of last N states ... with head index").
#[derive(Clone, Debug)]
pub struct StateHistory<S> {
    buf: [Option<S>; STATE_HISTORY_SIZE],
    head: usize,
    len: usize,
}

impl<S: Copy> Default for StateHistory<S> {
    fn default() -> Self {
        Self {
            buf: [None; STATE_HISTORY_SIZE],
            head: 0,
            len: 0,
        }
    }
}

impl<S: Copy> StateHistory<S> {
    pub fn push(&mut self, state: S) {
        self.buf[self.head] = Some(state);
        self.head = (self.head + 1) % STATE_HISTORY_SIZE;
        if self.len < STATE_HISTORY_SIZE {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates oldest to newest.
    pub fn iter_oldest_to_newest(&self) -> impl Iterator<Item = S> + '_ {
        let start = if self.len < STATE_HISTORY_SIZE {
            0
        } else {
            self.head
        };
        (0..self.len).map(move |i| self.buf[(start + i) % STATE_HISTORY_SIZE].unwrap())
    }
}

/// Fields common to hosts and services (spec.md §3.1). Composed into `Host`
/// and `Service` rather than inherited — there is no base class in Rust, and
/// the teacher repo favors composition + shared trait accessors
/// (`ferrex-core/src/scan/orchestration/job.rs` does the same with payload enums).
#[derive(Clone, Debug)]
pub struct CheckableCommon<S: Copy> {
    pub display_name: String,
    pub check_command: Option<CommandHandle>,
    pub check_command_args: Vec<String>,
    pub check_period: Option<TimePeriodHandle>,
    pub event_handler: Option<CommandHandle>,
    pub notification_period: Option<TimePeriodHandle>,
    /// Direct notification recipients; effective recipients are this set
    /// union the members of `contact_groups`, deduplicated (spec.md §3.5).
    pub contacts: Vec<ContactHandle>,
    pub contact_groups: Vec<ContactGroupHandle>,

    pub check_interval: f64,
    pub retry_interval: f64,
    pub max_attempts: u32,
    pub first_notification_delay: chrono::Duration,
    pub notification_interval: chrono::Duration,

    pub checks_enabled: bool,
    pub accept_passive_checks: bool,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,
    pub notifications_enabled: bool,
    pub obsess_over: bool,
    pub check_freshness: bool,
    pub freshness_threshold: chrono::Duration,
    pub stalk_on: Vec<S>,
    pub retain_status_information: bool,
    pub retain_nonstatus_information: bool,

    pub current_state: S,
    pub last_state: S,
    pub last_hard_state: S,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,

    pub state_history: StateHistory<S>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub last_time_in_state: HashMap<String, DateTime<Utc>>,

    pub plugin_output: String,
    pub long_plugin_output: String,
    pub perf_data: String,
    pub latency: f64,
    pub execution_time: f64,

    pub percent_state_change: f64,
    pub is_flapping: bool,
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub flapping_comment_id: Option<u64>,

    pub current_notification_number: u32,
    pub current_notification_id: Option<u64>,
    pub last_notification: Option<DateTime<Utc>>,
    pub next_notification: Option<DateTime<Utc>>,
    pub notified_on: Vec<S>,

    pub scheduled_downtime_depth: i32,
    pub pending_flex_downtime: u32,

    pub acknowledgement: Option<crate::model::downtime::AcknowledgementType>,

    pub modified_attributes: u32,

    pub last_check: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub should_be_scheduled: bool,

    pub custom_variables: HashMap<String, String>,
}

impl<S: Copy + PartialEq> CheckableCommon<S> {
    pub fn new(display_name: String, up_ok_state: S) -> Self {
        Self {
            display_name,
            check_command: None,
            check_command_args: Vec::new(),
            check_period: None,
            event_handler: None,
            notification_period: None,
            contacts: Vec::new(),
            contact_groups: Vec::new(),
            check_interval: 5.0,
            retry_interval: 1.0,
            max_attempts: 3,
            first_notification_delay: chrono::Duration::zero(),
            notification_interval: chrono::Duration::minutes(30),
            checks_enabled: true,
            accept_passive_checks: true,
            event_handler_enabled: false,
            flap_detection_enabled: false,
            notifications_enabled: true,
            obsess_over: false,
            check_freshness: false,
            freshness_threshold: chrono::Duration::zero(),
            stalk_on: Vec::new(),
            retain_status_information: true,
            retain_nonstatus_information: true,
            current_state: up_ok_state,
            last_state: up_ok_state,
            last_hard_state: up_ok_state,
            state_type: StateType::Hard,
            current_attempt: 1,
            has_been_checked: false,
            state_history: StateHistory::default(),
            last_state_change: None,
            last_hard_state_change: None,
            last_time_in_state: HashMap::new(),
            plugin_output: String::new(),
            long_plugin_output: String::new(),
            perf_data: String::new(),
            latency: 0.0,
            execution_time: 0.0,
            percent_state_change: 0.0,
            is_flapping: false,
            low_flap_threshold: 20.0,
            high_flap_threshold: 25.0,
            flapping_comment_id: None,
            current_notification_number: 0,
            current_notification_id: None,
            last_notification: None,
            next_notification: None,
            notified_on: Vec::new(),
            scheduled_downtime_depth: 0,
            pending_flex_downtime: 0,
            acknowledgement: None,
            modified_attributes: 0,
            last_check: None,
            next_check: None,
            should_be_scheduled: true,
            custom_variables: HashMap::new(),
        }
    }

    pub fn in_downtime(&self) -> bool {
        self.scheduled_downtime_depth > 0
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement.is_some()
    }

    pub fn set_modified(&mut self, bit: u32) {
        self.modified_attributes |= bit;
    }

    /// `next_check >= last_check` invariant helper (spec.md §3.1).
    pub fn validate_schedule_invariant(&self) -> bool {
        match (self.last_check, self.next_check) {
            (Some(last), Some(next)) if self.should_be_scheduled && self.checks_enabled => {
                next >= last
            }
            _ => true,
        }
    }
}

//! Deserialized shape of a sentinel config file, before resolution into a
//! `sentinel_core::model::ObjectGraph` by [`crate::loader`].
//!
//! Objects reference each other by name (`check_command = "check-ping"`,
//! `host_name = "web01"`); the loader resolves those names against the
//! graph as it builds it, in an order that respects the dependencies below.

use std::collections::HashMap;

use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Default)]
pub struct RawConfig {
    #[serde(default)]
    pub engine: RawEngine,
    #[serde(default, rename = "connector")]
    pub connectors: Vec<RawConnector>,
    #[serde(default, rename = "command")]
    pub commands: Vec<RawCommand>,
    #[serde(default, rename = "time_period")]
    pub time_periods: Vec<RawTimePeriod>,
    #[serde(default, rename = "contact")]
    pub contacts: Vec<RawContact>,
    #[serde(default, rename = "contact_group")]
    pub contact_groups: Vec<RawContactGroup>,
    #[serde(default, rename = "host")]
    pub hosts: Vec<RawHost>,
    #[serde(default, rename = "service")]
    pub services: Vec<RawService>,
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<RawDependency>,
    #[serde(default, rename = "escalation")]
    pub escalations: Vec<RawEscalation>,
}

/// `[engine]` table: process-wide tunables (spec.md §3.1) plus the file
/// paths the server needs but the core has no opinion on.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RawEngine {
    pub interval_length: Option<u32>,
    pub sleep_time_ms: Option<u64>,
    pub max_check_spread_minutes: Option<u32>,
    pub orphan_check_interval_secs: Option<i64>,
    pub freshness_check_interval_secs: Option<i64>,
    pub additional_freshness_latency_secs: Option<i64>,
    pub check_reaper_interval_secs: Option<i64>,
    pub retention_save_interval_secs: Option<i64>,
    pub status_save_interval_secs: Option<i64>,
    pub service_timeout_state: Option<i32>,
    pub host_timeout_state: Option<i32>,
    pub command_timeout_secs: Option<u64>,
    pub illegal_output_chars: Option<String>,
    pub enable_notifications: Option<bool>,
    pub retention_file: Option<String>,
    pub status_file: Option<String>,
    pub command_file: Option<String>,
}

/// A named connector helper process (spec.md §4.3); `[[command]]` entries
/// reference one by name in their `connector` field.
#[derive(Debug, Deserialize)]
pub struct RawConnector {
    pub name: String,
    pub helper_path: String,
}

#[derive(Debug, Deserialize)]
pub struct RawCommand {
    pub name: String,
    pub line: String,
    #[serde(default)]
    pub connector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTimePeriod {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub sunday: Vec<String>,
    #[serde(default)]
    pub monday: Vec<String>,
    #[serde(default)]
    pub tuesday: Vec<String>,
    #[serde(default)]
    pub wednesday: Vec<String>,
    #[serde(default)]
    pub thursday: Vec<String>,
    #[serde(default)]
    pub friday: Vec<String>,
    #[serde(default)]
    pub saturday: Vec<String>,
    #[serde(default, rename = "exception")]
    pub exceptions: Vec<RawException>,
    /// Names of other `[[time_period]]` entries whose valid times are
    /// subtracted from this one (spec.md §3.4 "exclusions").
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawException {
    /// One of `calendar_date`, `month_date`, `month_day`, `month_week_day`,
    /// `week_day`.
    pub kind: String,
    #[serde(default)]
    pub start_year: Option<i32>,
    #[serde(default)]
    pub start_month: Option<u32>,
    #[serde(default)]
    pub start_day: Option<i32>,
    #[serde(default)]
    pub start_weekday: Option<u32>,
    #[serde(default)]
    pub end_year: Option<i32>,
    #[serde(default)]
    pub end_month: Option<u32>,
    #[serde(default)]
    pub end_day: Option<i32>,
    #[serde(default)]
    pub end_weekday: Option<u32>,
    #[serde(default)]
    pub skip_interval: Option<u32>,
    #[serde(default)]
    pub ranges: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawContact {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub pager: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub host_notification_period: Option<String>,
    #[serde(default)]
    pub service_notification_period: Option<String>,
    #[serde(default)]
    pub notify_on_host: Vec<String>,
    #[serde(default)]
    pub notify_on_service: Vec<String>,
    #[serde(default = "default_true")]
    pub host_notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub service_notifications_enabled: bool,
    #[serde(default)]
    pub host_notification_commands: Vec<String>,
    #[serde(default)]
    pub service_notification_commands: Vec<String>,
    #[serde(default)]
    pub can_submit_commands: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawContactGroup {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawHost {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub check_command: Option<String>,
    #[serde(default)]
    pub check_command_args: Vec<String>,
    #[serde(default)]
    pub check_period: Option<String>,
    #[serde(default)]
    pub event_handler: Option<String>,
    #[serde(default)]
    pub notification_period: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default)]
    pub check_interval: Option<f64>,
    #[serde(default)]
    pub retry_interval: Option<f64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub first_notification_delay_secs: Option<i64>,
    #[serde(default)]
    pub notification_interval_secs: Option<i64>,
    #[serde(default = "default_true")]
    pub checks_enabled: bool,
    #[serde(default = "default_true")]
    pub accept_passive_checks: bool,
    #[serde(default)]
    pub event_handler_enabled: bool,
    #[serde(default)]
    pub flap_detection_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub obsess_over: bool,
    #[serde(default)]
    pub check_freshness: bool,
    #[serde(default)]
    pub freshness_threshold_secs: Option<i64>,
    #[serde(default)]
    pub stalk_on: Vec<String>,
    #[serde(default)]
    pub low_flap_threshold: Option<f64>,
    #[serde(default)]
    pub high_flap_threshold: Option<f64>,
    #[serde(default)]
    pub custom_variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RawService {
    pub host_name: String,
    pub description: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub check_command: Option<String>,
    #[serde(default)]
    pub check_command_args: Vec<String>,
    #[serde(default)]
    pub check_period: Option<String>,
    #[serde(default)]
    pub event_handler: Option<String>,
    #[serde(default)]
    pub notification_period: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default)]
    pub check_interval: Option<f64>,
    #[serde(default)]
    pub retry_interval: Option<f64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub first_notification_delay_secs: Option<i64>,
    #[serde(default)]
    pub notification_interval_secs: Option<i64>,
    #[serde(default = "default_true")]
    pub checks_enabled: bool,
    #[serde(default = "default_true")]
    pub accept_passive_checks: bool,
    #[serde(default)]
    pub event_handler_enabled: bool,
    #[serde(default)]
    pub flap_detection_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub obsess_over: bool,
    #[serde(default)]
    pub check_freshness: bool,
    #[serde(default)]
    pub freshness_threshold_secs: Option<i64>,
    #[serde(default)]
    pub stalk_on: Vec<String>,
    #[serde(default)]
    pub low_flap_threshold: Option<f64>,
    #[serde(default)]
    pub high_flap_threshold: Option<f64>,
    #[serde(default)]
    pub custom_variables: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RawDependency {
    /// `"execution"` or `"notification"`.
    pub kind: String,
    pub dependent_host: String,
    #[serde(default)]
    pub dependent_service: Option<String>,
    pub master_host: String,
    #[serde(default)]
    pub master_service: Option<String>,
    #[serde(default)]
    pub fail_on: Vec<String>,
    #[serde(default)]
    pub inherits_parent: bool,
    #[serde(default)]
    pub dependency_period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawEscalation {
    pub target_host: String,
    #[serde(default)]
    pub target_service: Option<String>,
    #[serde(default)]
    pub first_notification: u32,
    #[serde(default)]
    pub last_notification: u32,
    #[serde(default)]
    pub escalation_period: Option<String>,
    #[serde(default)]
    pub escalation_options: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
}

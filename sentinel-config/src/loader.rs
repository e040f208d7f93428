//! Builds a validated `ObjectGraph` from a parsed [`RawConfig`].
//!
//! Objects are inserted in an order that lets later passes resolve
//! name references against the graph directly (`ObjectGraph::find_*`)
//! rather than through an intermediate name table: commands and time
//! periods first (time-period exclusions are patched in a second pass,
//! since a period can exclude one declared later in the file), then
//! contacts and contact groups, then hosts (parent edges patched in a
//! second pass for the same reason), then services, then dependencies
//! and escalations, which can reference anything above.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sentinel_core::ids::{
    CheckableHandle, CommandHandle, ContactGroupHandle, ContactHandle, HostHandle,
    TimePeriodHandle,
};
use sentinel_core::model::{
    CommandDef, Contact, ContactGroup, DateRange, DateRangeKind, Dependency, DependencyType,
    Escalation, Host, HostState, ObjectGraph, Service, ServiceState, TimePeriod, TimeRange,
};
use sentinel_core::EngineConfig;

use crate::error::{ConfigError, Result};
use crate::models::{
    RawConfig, RawContact, RawContactGroup, RawDependency, RawEngine, RawEscalation, RawHost,
    RawService, RawTimePeriod,
};

/// Everything a server process needs after loading: the validated graph,
/// the resolved engine tunables, and the handful of settings that are
/// process concerns rather than scheduler concerns.
#[derive(Debug)]
pub struct LoadedConfig {
    pub graph: ObjectGraph,
    pub engine: EngineConfig,
    /// Connector helper processes by name, ready to hand to
    /// `sentinel_core::executor::Dispatch::new`.
    pub connectors: HashMap<String, String>,
    pub enable_notifications: bool,
    pub retention_file: Option<PathBuf>,
    pub status_file: Option<PathBuf>,
    pub command_file: Option<PathBuf>,
}

pub fn load_file(path: &Path) -> Result<LoadedConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text)
}

pub fn load_str(text: &str) -> Result<LoadedConfig> {
    let raw: RawConfig = toml::from_str(text)?;
    let mut graph = ObjectGraph::new();

    for c in &raw.commands {
        graph.add_command(CommandDef {
            name: c.name.clone(),
            command_line: c.line.clone(),
            connector: c.connector.clone(),
        });
    }

    let period_handles = load_time_periods(&mut graph, &raw.time_periods)?;
    patch_time_period_exclusions(&mut graph, &raw.time_periods, &period_handles)?;

    for c in &raw.contacts {
        let contact = build_contact(&graph, c)?;
        graph.add_contact(contact);
    }

    for g in &raw.contact_groups {
        let members = resolve_contacts(&graph, &g.members)?;
        graph.add_contact_group(ContactGroup {
            name: g.name.clone(),
            alias: g.alias.clone().unwrap_or_default(),
            members,
        });
    }

    for h in &raw.hosts {
        let host = build_host(&graph, h)?;
        graph.add_host(host);
    }
    patch_host_parents(&mut graph, &raw.hosts)?;

    for s in &raw.services {
        let service = build_service(&graph, s)?;
        graph.add_service(service);
    }

    for d in &raw.dependencies {
        let dep = build_dependency(&graph, d)?;
        graph.add_dependency(dep);
    }

    for e in &raw.escalations {
        let esc = build_escalation(&graph, e)?;
        graph.add_escalation(esc);
    }

    graph.validate_host_dag()?;
    graph.validate_time_period_exclusions()?;

    let engine = resolve_engine_config(&raw.engine);
    let connectors = raw
        .connectors
        .iter()
        .map(|c| (c.name.clone(), c.helper_path.clone()))
        .collect();

    Ok(LoadedConfig {
        enable_notifications: raw.engine.enable_notifications.unwrap_or(true),
        retention_file: raw.engine.retention_file.as_ref().map(PathBuf::from),
        status_file: raw.engine.status_file.as_ref().map(PathBuf::from),
        command_file: raw.engine.command_file.as_ref().map(PathBuf::from),
        graph,
        engine,
        connectors,
    })
}

fn resolve_engine_config(raw: &RawEngine) -> EngineConfig {
    let default = EngineConfig::default();
    EngineConfig {
        interval_length: raw.interval_length.unwrap_or(default.interval_length),
        sleep_time: raw
            .sleep_time_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or(default.sleep_time),
        max_check_spread_minutes: raw
            .max_check_spread_minutes
            .unwrap_or(default.max_check_spread_minutes),
        orphan_check_interval: raw
            .orphan_check_interval_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.orphan_check_interval),
        freshness_check_interval: raw
            .freshness_check_interval_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.freshness_check_interval),
        additional_freshness_latency: raw
            .additional_freshness_latency_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.additional_freshness_latency),
        check_reaper_interval: raw
            .check_reaper_interval_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.check_reaper_interval),
        retention_save_interval: raw
            .retention_save_interval_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.retention_save_interval),
        status_save_interval: raw
            .status_save_interval_secs
            .map(chrono::Duration::seconds)
            .unwrap_or(default.status_save_interval),
        service_timeout_state: raw.service_timeout_state.unwrap_or(default.service_timeout_state),
        host_timeout_state: raw.host_timeout_state.unwrap_or(default.host_timeout_state),
        command_timeout: raw
            .command_timeout_secs
            .map(std::time::Duration::from_secs)
            .unwrap_or(default.command_timeout),
        illegal_output_chars: raw
            .illegal_output_chars
            .clone()
            .unwrap_or(default.illegal_output_chars),
    }
}

// --- time periods ----------------------------------------------------

fn load_time_periods(
    graph: &mut ObjectGraph,
    raws: &[RawTimePeriod],
) -> Result<Vec<TimePeriodHandle>> {
    let mut handles = Vec::with_capacity(raws.len());
    for tp in raws {
        let mut period = TimePeriod::new(tp.name.clone(), tp.alias.clone().unwrap_or_default());
        let weekdays = [
            &tp.sunday,
            &tp.monday,
            &tp.tuesday,
            &tp.wednesday,
            &tp.thursday,
            &tp.friday,
            &tp.saturday,
        ];
        for (day_index, ranges) in weekdays.iter().enumerate() {
            for r in ranges.iter() {
                period.weekdays[day_index].push(parse_time_range(r)?);
            }
        }
        for exc in &tp.exceptions {
            let range = build_date_range(exc)?;
            period
                .exceptions
                .entry(range.kind)
                .or_default()
                .push(range);
        }
        handles.push(graph.add_time_period(period));
    }
    Ok(handles)
}

fn patch_time_period_exclusions(
    graph: &mut ObjectGraph,
    raws: &[RawTimePeriod],
    handles: &[TimePeriodHandle],
) -> Result<()> {
    for (tp, &handle) in raws.iter().zip(handles) {
        let mut exclusions = Vec::with_capacity(tp.exclude.len());
        for name in &tp.exclude {
            let excluded = graph
                .find_time_period(name)
                .ok_or_else(|| ConfigError::UnknownReference(format!("time_period '{name}'")))?;
            exclusions.push(excluded);
        }
        graph.time_period_mut(handle).exclusions = exclusions;
    }
    Ok(())
}

/// Parses `"HH:MM-HH:MM"`; `24:00` is accepted as the end of day, matching
/// the original engine's convention of ranges that may run past midnight.
fn parse_time_range(s: &str) -> Result<TimeRange> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| ConfigError::InvalidValue(format!("time range '{s}' missing '-'")))?;
    Ok(TimeRange::new(parse_hhmm(start)?, parse_hhmm(end)?))
}

fn parse_hhmm(s: &str) -> Result<u32> {
    let (h, m) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidValue(format!("'{s}' is not HH:MM")))?;
    let h: u32 = h
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("'{s}' is not HH:MM")))?;
    let m: u32 = m
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("'{s}' is not HH:MM")))?;
    Ok(h * 3600 + m * 60)
}

fn build_date_range(exc: &crate::models::RawException) -> Result<DateRange> {
    let kind = match exc.kind.as_str() {
        "calendar_date" => DateRangeKind::CalendarDate,
        "month_date" => DateRangeKind::MonthDate,
        "month_day" => DateRangeKind::MonthDay,
        "month_week_day" => DateRangeKind::MonthWeekDay,
        "week_day" => DateRangeKind::WeekDay,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "unknown exception kind '{other}'"
            )))
        }
    };
    let mut range = DateRange::new(kind);
    range.start_year = exc.start_year;
    range.start_month = exc.start_month;
    range.start_day = exc.start_day;
    range.start_weekday = exc.start_weekday;
    range.end_year = exc.end_year;
    range.end_month = exc.end_month;
    range.end_day = exc.end_day;
    range.end_weekday = exc.end_weekday;
    range.skip_interval = exc.skip_interval;
    for r in &exc.ranges {
        range.timeranges.push(parse_time_range(r)?);
    }
    Ok(range)
}

// --- contacts / contact groups ----------------------------------------

fn build_contact(graph: &ObjectGraph, c: &RawContact) -> Result<Contact> {
    Ok(Contact {
        name: c.name.clone(),
        alias: c.alias.clone().unwrap_or_default(),
        host_notification_period: resolve_time_period(graph, &c.host_notification_period)?,
        service_notification_period: resolve_time_period(graph, &c.service_notification_period)?,
        notify_on_host: parse_state_bits(&c.notify_on_host)?,
        notify_on_service: parse_state_bits(&c.notify_on_service)?,
        host_notifications_enabled: c.host_notifications_enabled,
        service_notifications_enabled: c.service_notifications_enabled,
        host_notification_commands: resolve_commands(graph, &c.host_notification_commands)?,
        service_notification_commands: resolve_commands(graph, &c.service_notification_commands)?,
        email: c.email.clone(),
        pager: c.pager.clone(),
        addresses: c.addresses.clone(),
        can_submit_commands: c.can_submit_commands,
    })
}

// --- hosts -------------------------------------------------------------

fn build_host(graph: &ObjectGraph, h: &RawHost) -> Result<Host> {
    let mut host = Host::new(h.name.clone());
    apply_common(
        &mut host.common,
        CommonFields {
            display_name: h.display_name.clone(),
            check_command: &h.check_command,
            check_command_args: &h.check_command_args,
            check_period: &h.check_period,
            event_handler: &h.event_handler,
            notification_period: &h.notification_period,
            contacts: &h.contacts,
            contact_groups: &h.contact_groups,
            check_interval: h.check_interval,
            retry_interval: h.retry_interval,
            max_attempts: h.max_attempts,
            first_notification_delay_secs: h.first_notification_delay_secs,
            notification_interval_secs: h.notification_interval_secs,
            checks_enabled: h.checks_enabled,
            accept_passive_checks: h.accept_passive_checks,
            event_handler_enabled: h.event_handler_enabled,
            flap_detection_enabled: h.flap_detection_enabled,
            notifications_enabled: h.notifications_enabled,
            obsess_over: h.obsess_over,
            check_freshness: h.check_freshness,
            freshness_threshold_secs: h.freshness_threshold_secs,
            low_flap_threshold: h.low_flap_threshold,
            high_flap_threshold: h.high_flap_threshold,
            custom_variables: &h.custom_variables,
        },
        graph,
    )?;
    host.common.stalk_on = h
        .stalk_on
        .iter()
        .map(|s| parse_host_state(s))
        .collect::<Result<_>>()?;
    Ok(host)
}

fn patch_host_parents(graph: &mut ObjectGraph, raws: &[RawHost]) -> Result<()> {
    for h in raws {
        let handle = graph
            .find_host(&h.name)
            .expect("host was just inserted by name");
        let mut parents = std::collections::BTreeSet::new();
        for parent_name in &h.parents {
            let parent = graph
                .find_host(parent_name)
                .ok_or_else(|| ConfigError::UnknownReference(format!("host '{parent_name}'")))?;
            parents.insert(parent);
        }
        graph.host_mut(handle).parent_hosts = parents;
    }
    Ok(())
}

// --- services ------------------------------------------------------------

fn build_service(graph: &ObjectGraph, s: &RawService) -> Result<Service> {
    let host = graph
        .find_host(&s.host_name)
        .ok_or_else(|| ConfigError::UnknownReference(format!("host '{}'", s.host_name)))?;
    let mut service = Service::new(host, s.description.clone());
    apply_common(
        &mut service.common,
        CommonFields {
            display_name: s.display_name.clone(),
            check_command: &s.check_command,
            check_command_args: &s.check_command_args,
            check_period: &s.check_period,
            event_handler: &s.event_handler,
            notification_period: &s.notification_period,
            contacts: &s.contacts,
            contact_groups: &s.contact_groups,
            check_interval: s.check_interval,
            retry_interval: s.retry_interval,
            max_attempts: s.max_attempts,
            first_notification_delay_secs: s.first_notification_delay_secs,
            notification_interval_secs: s.notification_interval_secs,
            checks_enabled: s.checks_enabled,
            accept_passive_checks: s.accept_passive_checks,
            event_handler_enabled: s.event_handler_enabled,
            flap_detection_enabled: s.flap_detection_enabled,
            notifications_enabled: s.notifications_enabled,
            obsess_over: s.obsess_over,
            check_freshness: s.check_freshness,
            freshness_threshold_secs: s.freshness_threshold_secs,
            low_flap_threshold: s.low_flap_threshold,
            high_flap_threshold: s.high_flap_threshold,
            custom_variables: &s.custom_variables,
        },
        graph,
    )?;
    service.common.stalk_on = s
        .stalk_on
        .iter()
        .map(|v| parse_service_state(v))
        .collect::<Result<_>>()?;
    Ok(service)
}

/// The fields shared by `RawHost` and `RawService`, collected so
/// `apply_common` doesn't need two near-identical bodies.
struct CommonFields<'a> {
    display_name: Option<String>,
    check_command: &'a Option<String>,
    check_command_args: &'a [String],
    check_period: &'a Option<String>,
    event_handler: &'a Option<String>,
    notification_period: &'a Option<String>,
    contacts: &'a [String],
    contact_groups: &'a [String],
    check_interval: Option<f64>,
    retry_interval: Option<f64>,
    max_attempts: Option<u32>,
    first_notification_delay_secs: Option<i64>,
    notification_interval_secs: Option<i64>,
    checks_enabled: bool,
    accept_passive_checks: bool,
    event_handler_enabled: bool,
    flap_detection_enabled: bool,
    notifications_enabled: bool,
    obsess_over: bool,
    check_freshness: bool,
    freshness_threshold_secs: Option<i64>,
    low_flap_threshold: Option<f64>,
    high_flap_threshold: Option<f64>,
    custom_variables: &'a std::collections::HashMap<String, String>,
}

fn apply_common<S: Copy + PartialEq>(
    common: &mut sentinel_core::model::CheckableCommon<S>,
    fields: CommonFields<'_>,
    graph: &ObjectGraph,
) -> Result<()> {
    if let Some(name) = fields.display_name {
        common.display_name = name;
    }
    common.check_command = resolve_command(graph, fields.check_command)?;
    common.check_command_args = fields.check_command_args.to_vec();
    common.check_period = resolve_time_period(graph, fields.check_period)?;
    common.event_handler = resolve_command(graph, fields.event_handler)?;
    common.notification_period = resolve_time_period(graph, fields.notification_period)?;
    common.contacts = resolve_contacts(graph, fields.contacts)?;
    common.contact_groups = resolve_contact_groups(graph, fields.contact_groups)?;
    if let Some(v) = fields.check_interval {
        common.check_interval = v;
    }
    if let Some(v) = fields.retry_interval {
        common.retry_interval = v;
    }
    if let Some(v) = fields.max_attempts {
        common.max_attempts = v;
    }
    if let Some(secs) = fields.first_notification_delay_secs {
        common.first_notification_delay = chrono::Duration::seconds(secs);
    }
    if let Some(secs) = fields.notification_interval_secs {
        common.notification_interval = chrono::Duration::seconds(secs);
    }
    common.checks_enabled = fields.checks_enabled;
    common.accept_passive_checks = fields.accept_passive_checks;
    common.event_handler_enabled = fields.event_handler_enabled;
    common.flap_detection_enabled = fields.flap_detection_enabled;
    common.notifications_enabled = fields.notifications_enabled;
    common.obsess_over = fields.obsess_over;
    common.check_freshness = fields.check_freshness;
    if let Some(secs) = fields.freshness_threshold_secs {
        common.freshness_threshold = chrono::Duration::seconds(secs);
    }
    if let Some(v) = fields.low_flap_threshold {
        common.low_flap_threshold = v;
    }
    if let Some(v) = fields.high_flap_threshold {
        common.high_flap_threshold = v;
    }
    common.custom_variables = fields.custom_variables.clone();
    Ok(())
}

// --- dependencies / escalations -----------------------------------------

fn build_dependency(graph: &ObjectGraph, d: &RawDependency) -> Result<Dependency> {
    let dependency_type = match d.kind.as_str() {
        "execution" => DependencyType::Execution,
        "notification" => DependencyType::Notification,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "unknown dependency kind '{other}'"
            )))
        }
    };
    Ok(Dependency {
        dependency_type,
        dependent: resolve_checkable(graph, &d.dependent_host, &d.dependent_service)?,
        master: resolve_checkable(graph, &d.master_host, &d.master_service)?,
        fail_on: parse_state_bits(&d.fail_on)?,
        inherits_parent: d.inherits_parent,
        dependency_period: resolve_time_period(graph, &d.dependency_period)?,
    })
}

fn build_escalation(graph: &ObjectGraph, e: &RawEscalation) -> Result<Escalation> {
    Ok(Escalation {
        target: resolve_checkable(graph, &e.target_host, &e.target_service)?,
        first_notification: e.first_notification,
        last_notification: e.last_notification,
        escalation_period: resolve_time_period(graph, &e.escalation_period)?,
        escalation_options: parse_state_bits(&e.escalation_options)?,
        contacts: resolve_contacts(graph, &e.contacts)?,
        contact_groups: resolve_contact_groups(graph, &e.contact_groups)?,
    })
}

// --- name resolution helpers ---------------------------------------------

fn resolve_command(graph: &ObjectGraph, name: &Option<String>) -> Result<Option<CommandHandle>> {
    match name {
        None => Ok(None),
        Some(name) => graph
            .find_command(name)
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownReference(format!("command '{name}'"))),
    }
}

fn resolve_time_period(
    graph: &ObjectGraph,
    name: &Option<String>,
) -> Result<Option<TimePeriodHandle>> {
    match name {
        None => Ok(None),
        Some(name) => graph
            .find_time_period(name)
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownReference(format!("time_period '{name}'"))),
    }
}

fn resolve_contacts(graph: &ObjectGraph, names: &[String]) -> Result<Vec<ContactHandle>> {
    names
        .iter()
        .map(|name| {
            graph
                .find_contact(name)
                .ok_or_else(|| ConfigError::UnknownReference(format!("contact '{name}'")))
        })
        .collect()
}

fn resolve_contact_groups(
    graph: &ObjectGraph,
    names: &[String],
) -> Result<Vec<ContactGroupHandle>> {
    names
        .iter()
        .map(|name| {
            graph
                .find_contact_group(name)
                .ok_or_else(|| ConfigError::UnknownReference(format!("contact_group '{name}'")))
        })
        .collect()
}

fn resolve_commands(graph: &ObjectGraph, names: &[String]) -> Result<Vec<CommandHandle>> {
    names
        .iter()
        .map(|name| {
            graph
                .find_command(name)
                .ok_or_else(|| ConfigError::UnknownReference(format!("command '{name}'")))
        })
        .collect()
}

fn resolve_checkable(
    graph: &ObjectGraph,
    host_name: &str,
    service_desc: &Option<String>,
) -> Result<CheckableHandle> {
    let host = resolve_host(graph, host_name)?;
    match service_desc {
        None => Ok(CheckableHandle::Host(host)),
        Some(desc) => {
            let service = graph.find_service(host, desc).ok_or_else(|| {
                ConfigError::UnknownReference(format!("service '{host_name}/{desc}'"))
            })?;
            Ok(CheckableHandle::Service(service))
        }
    }
}

fn resolve_host(graph: &ObjectGraph, name: &str) -> Result<HostHandle> {
    graph
        .find_host(name)
        .ok_or_else(|| ConfigError::UnknownReference(format!("host '{name}'")))
}

/// Parses state names into the shared notify/fail/escalation bitmask
/// (`sentinel_core::model::contact::notify_bits`): host and service states
/// share bit positions by severity rank, plus the two synthetic bits.
fn parse_state_bits(names: &[String]) -> Result<u8> {
    use sentinel_core::model::contact::notify_bits;
    let mut bits = 0u8;
    for name in names {
        bits |= match name.as_str() {
            "up" | "ok" => notify_bits::UP_OK,
            "down" | "warning" => notify_bits::DOWN_WARNING,
            "unreachable" | "critical" => notify_bits::UNREACHABLE_CRITICAL,
            "unknown" => notify_bits::UNKNOWN,
            "flapping" => notify_bits::FLAPPING,
            "downtime" => notify_bits::DOWNTIME,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "unknown state/option '{other}'"
                )))
            }
        };
    }
    Ok(bits)
}

fn parse_host_state(name: &str) -> Result<HostState> {
    match name {
        "up" => Ok(HostState::Up),
        "down" => Ok(HostState::Down),
        "unreachable" => Ok(HostState::Unreachable),
        other => Err(ConfigError::InvalidValue(format!("unknown host state '{other}'"))),
    }
}

fn parse_service_state(name: &str) -> Result<ServiceState> {
    match name {
        "ok" => Ok(ServiceState::Ok),
        "warning" => Ok(ServiceState::Warning),
        "critical" => Ok(ServiceState::Critical),
        "unknown" => Ok(ServiceState::Unknown),
        other => Err(ConfigError::InvalidValue(format!("unknown service state '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[command]]
name = "check-ping"
line = "/usr/lib/plugins/check_ping $HOSTADDRESS$"

[[time_period]]
name = "24x7"
alias = "All Time Default"
sunday = ["00:00-24:00"]
monday = ["00:00-24:00"]
tuesday = ["00:00-24:00"]
wednesday = ["00:00-24:00"]
thursday = ["00:00-24:00"]
friday = ["00:00-24:00"]
saturday = ["00:00-24:00"]

[[contact]]
name = "oncall"
email = "oncall@example.com"
notify_on_host = ["down", "unreachable"]
notify_on_service = ["critical", "warning"]
host_notification_commands = ["check-ping"]
service_notification_commands = ["check-ping"]

[[host]]
name = "web01"
check_command = "check-ping"
check_period = "24x7"
notification_period = "24x7"
contacts = ["oncall"]

[[service]]
host_name = "web01"
description = "HTTP"
check_command = "check-ping"
check_period = "24x7"
notification_period = "24x7"
contacts = ["oncall"]
"#;

    #[test]
    fn loads_a_minimal_config() {
        let loaded = load_str(MINIMAL).unwrap();
        assert_eq!(loaded.graph.hosts.len(), 1);
        assert_eq!(loaded.graph.services.len(), 1);
        let host = loaded.graph.find_host("web01").unwrap();
        assert!(loaded.graph.find_service(host, "HTTP").is_some());
    }

    #[test]
    fn rejects_an_unknown_check_command() {
        let toml = r#"
[[host]]
name = "web01"
check_command = "does-not-exist"
"#;
        assert!(matches!(
            load_str(toml),
            Err(ConfigError::UnknownReference(_))
        ));
    }
}

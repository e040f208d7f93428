//! Maps a FIFO command line onto a `sentinel_core::commands::ExternalCommand`
//! (spec.md §4.11, §6). Command-name parsing lives here rather than in
//! `sentinel-core`, since it needs read access to the object graph to turn a
//! host/service name pair into a `CheckableHandle` and the core otherwise has
//! no business knowing the wire-level command grammar.

use chrono::{DateTime, Utc};
use sentinel_core::commands::ExternalCommand;
use sentinel_core::ids::CheckableHandle;
use sentinel_core::model::downtime::{AcknowledgementType, DowntimeKind};
use sentinel_core::model::ObjectGraph;

/// Parses one already-bracket-stripped FIFO line and resolves it against
/// `graph`. Returns `Err` with a human-readable reason for a line that is
/// malformed or names an unknown object, so the caller can log and drop it
/// without taking down the reader.
pub fn resolve_line(graph: &ObjectGraph, line: &str) -> Result<ExternalCommand, String> {
    let (_timestamp, name, args) =
        sentinel_core::commands::parse_line(line).ok_or_else(|| format!("malformed command line: {line}"))?;
    resolve(graph, &name, &args)
}

fn resolve(graph: &ObjectGraph, name: &str, args: &[String]) -> Result<ExternalCommand, String> {
    match name {
        "ENABLE_HOST_CHECKS" => Ok(ExternalCommand::EnableHostChecks(host_checkable(graph, arg(args, 0)?)?)),
        "DISABLE_HOST_CHECKS" => Ok(ExternalCommand::DisableHostChecks(host_checkable(graph, arg(args, 0)?)?)),
        "ENABLE_SVC_CHECKS" => Ok(ExternalCommand::EnableHostChecks(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?)),
        "DISABLE_SVC_CHECKS" => Ok(ExternalCommand::DisableHostChecks(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?)),

        "ENABLE_NOTIFICATIONS" => Ok(ExternalCommand::EnableNotifications),
        "DISABLE_NOTIFICATIONS" => Ok(ExternalCommand::DisableNotifications),
        "ENABLE_HOST_NOTIFICATIONS" => Ok(ExternalCommand::EnableCheckableNotifications(host_checkable(graph, arg(args, 0)?)?)),
        "DISABLE_HOST_NOTIFICATIONS" => Ok(ExternalCommand::DisableCheckableNotifications(host_checkable(graph, arg(args, 0)?)?)),
        "ENABLE_SVC_NOTIFICATIONS" => Ok(ExternalCommand::EnableCheckableNotifications(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?)),
        "DISABLE_SVC_NOTIFICATIONS" => Ok(ExternalCommand::DisableCheckableNotifications(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?)),

        "PROCESS_HOST_CHECK_RESULT" => Ok(ExternalCommand::ProcessCheckResult {
            target: host_checkable(graph, arg(args, 0)?)?,
            exit_code: parse_i32(arg(args, 1)?)?,
            output: arg(args, 2)?.clone(),
            check_time: Utc::now(),
        }),
        "PROCESS_SERVICE_CHECK_RESULT" => Ok(ExternalCommand::ProcessCheckResult {
            target: service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?,
            exit_code: parse_i32(arg(args, 2)?)?,
            output: arg(args, 3)?.clone(),
            check_time: Utc::now(),
        }),

        "SCHEDULE_HOST_DOWNTIME" => schedule_downtime(DowntimeKind::Host, host_checkable(graph, arg(args, 0)?)?, &args[1..]),
        "SCHEDULE_SVC_DOWNTIME" => schedule_downtime(
            DowntimeKind::Service,
            service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?,
            &args[2..],
        ),
        "DEL_HOST_DOWNTIME" | "DEL_SVC_DOWNTIME" => Ok(ExternalCommand::DelDowntime(parse_u64(arg(args, 0)?)?)),

        "ACKNOWLEDGE_HOST_PROBLEM" => acknowledge(host_checkable(graph, arg(args, 0)?)?, &args[1..]),
        "ACKNOWLEDGE_SVC_PROBLEM" => acknowledge(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?, &args[2..]),
        "REMOVE_HOST_ACKNOWLEDGEMENT" => Ok(ExternalCommand::RemoveAcknowledgement(host_checkable(graph, arg(args, 0)?)?)),
        "REMOVE_SVC_ACKNOWLEDGEMENT" => Ok(ExternalCommand::RemoveAcknowledgement(service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?)),

        "ADD_HOST_COMMENT" => Ok(ExternalCommand::AddComment {
            target: host_checkable(graph, arg(args, 0)?)?,
            author: arg(args, 1)?.clone(),
            comment: arg(args, 2)?.clone(),
        }),
        "ADD_SVC_COMMENT" => Ok(ExternalCommand::AddComment {
            target: service_checkable(graph, arg(args, 0)?, arg(args, 1)?)?,
            author: arg(args, 2)?.clone(),
            comment: arg(args, 3)?.clone(),
        }),
        "DEL_HOST_COMMENT" | "DEL_SVC_COMMENT" => Ok(ExternalCommand::DelComment(parse_u64(arg(args, 0)?)?)),

        "RESTART_PROGRAM" => Ok(ExternalCommand::RestartProgram),
        "SHUTDOWN_PROGRAM" => Ok(ExternalCommand::ShutdownProgram),

        other => Err(format!("unknown external command '{other}'")),
    }
}

fn schedule_downtime(kind: DowntimeKind, target: CheckableHandle, args: &[String]) -> Result<ExternalCommand, String> {
    Ok(ExternalCommand::ScheduleDowntime {
        target,
        kind,
        start_time: parse_timestamp(arg(args, 0)?)?,
        end_time: parse_timestamp(arg(args, 1)?)?,
        fixed: arg(args, 2)? != "0",
        triggered_by: match parse_u64(arg(args, 3)?)? {
            0 => None,
            id => Some(id),
        },
        duration: chrono::Duration::seconds(parse_i64(arg(args, 4)?)?),
        author: arg(args, 5)?.clone(),
        comment: arg(args, 6)?.clone(),
    })
}

fn acknowledge(target: CheckableHandle, args: &[String]) -> Result<ExternalCommand, String> {
    let sticky = arg(args, 0)? != "0";
    Ok(ExternalCommand::AcknowledgeProblem {
        target,
        ack_type: if sticky { AcknowledgementType::Sticky } else { AcknowledgementType::Normal },
        author: arg(args, 1)?.clone(),
        comment: arg(args, 2)?.clone(),
    })
}

fn host_checkable(graph: &ObjectGraph, host_name: &str) -> Result<CheckableHandle, String> {
    graph
        .find_host(host_name)
        .map(CheckableHandle::Host)
        .ok_or_else(|| format!("unknown host '{host_name}'"))
}

fn service_checkable(graph: &ObjectGraph, host_name: &str, description: &str) -> Result<CheckableHandle, String> {
    let host = graph.find_host(host_name).ok_or_else(|| format!("unknown host '{host_name}'"))?;
    graph
        .find_service(host, description)
        .map(CheckableHandle::Service)
        .ok_or_else(|| format!("unknown service '{host_name}/{description}'"))
}

fn arg<'a>(args: &'a [String], index: usize) -> Result<&'a String, String> {
    args.get(index).ok_or_else(|| format!("missing argument {index}"))
}

fn parse_i32(s: &str) -> Result<i32, String> {
    s.parse().map_err(|_| format!("'{s}' is not an integer"))
}

fn parse_i64(s: &str) -> Result<i64, String> {
    s.parse().map_err(|_| format!("'{s}' is not an integer"))
}

fn parse_u64(s: &str) -> Result<u64, String> {
    s.parse().map_err(|_| format!("'{s}' is not an integer"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let secs: i64 = parse_i64(s)?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("'{s}' is not a valid unix timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::model::{CommandDef, Host};

    fn graph_with_host(name: &str) -> ObjectGraph {
        let mut graph = ObjectGraph::new();
        graph.add_command(CommandDef::new("check-ping", "/bin/true"));
        graph.add_host(Host::new(name));
        graph
    }

    #[test]
    fn resolves_enable_host_checks() {
        let graph = graph_with_host("web01");
        let cmd = resolve(&graph, "ENABLE_HOST_CHECKS", &["web01".to_string()]).unwrap();
        assert!(matches!(cmd, ExternalCommand::EnableHostChecks(_)));
    }

    #[test]
    fn rejects_an_unknown_host() {
        let graph = graph_with_host("web01");
        assert!(resolve(&graph, "ENABLE_HOST_CHECKS", &["doesnotexist".to_string()]).is_err());
    }

    #[test]
    fn resolves_a_full_schedule_host_downtime_line() {
        let graph = graph_with_host("web01");
        let cmd = resolve(
            &graph,
            "SCHEDULE_HOST_DOWNTIME",
            &["web01", "1700000000", "1700003600", "1", "0", "3600", "alice", "maintenance"]
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>(),
        )
        .unwrap();
        match cmd {
            ExternalCommand::ScheduleDowntime { fixed, triggered_by, author, .. } => {
                assert!(fixed);
                assert_eq!(triggered_by, None);
                assert_eq!(author, "alice");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

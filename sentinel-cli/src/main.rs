//! Command-line client that submits external commands to a running
//! `sentinel-server` by writing a line to its command FIFO (spec.md §4.11).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sentinelcmd")]
#[command(about = "Submit external commands to a sentinel-server instance")]
struct Args {
    /// Path to the server's command FIFO.
    #[arg(short, long, env = "SENTINEL_COMMAND_FILE", default_value = "/var/run/sentinel/sentinel.cmd")]
    command_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enable active checks on a host.
    EnableHostChecks { host: String },
    /// Disable active checks on a host.
    DisableHostChecks { host: String },
    /// Enable active checks on a service.
    EnableSvcChecks { host: String, description: String },
    /// Disable active checks on a service.
    DisableSvcChecks { host: String, description: String },
    /// Enable notifications process-wide.
    EnableNotifications,
    /// Disable notifications process-wide.
    DisableNotifications,
    /// Enable notifications for one host.
    EnableHostNotifications { host: String },
    /// Disable notifications for one host.
    DisableHostNotifications { host: String },
    /// Enable notifications for one service.
    EnableSvcNotifications { host: String, description: String },
    /// Disable notifications for one service.
    DisableSvcNotifications { host: String, description: String },
    /// Submit a passive host check result.
    ProcessHostCheckResult { host: String, exit_code: i32, output: String },
    /// Submit a passive service check result.
    ProcessServiceCheckResult { host: String, description: String, exit_code: i32, output: String },
    /// Schedule downtime for a host.
    ScheduleHostDowntime {
        host: String,
        start_time: i64,
        end_time: i64,
        fixed: bool,
        #[arg(default_value_t = 0)]
        triggered_by: u64,
        duration_secs: i64,
        author: String,
        comment: String,
    },
    /// Schedule downtime for a service.
    ScheduleSvcDowntime {
        host: String,
        description: String,
        start_time: i64,
        end_time: i64,
        fixed: bool,
        #[arg(default_value_t = 0)]
        triggered_by: u64,
        duration_secs: i64,
        author: String,
        comment: String,
    },
    /// Cancel a scheduled downtime by id.
    DelDowntime { id: u64 },
    /// Acknowledge a host problem.
    AcknowledgeHostProblem { host: String, sticky: bool, author: String, comment: String },
    /// Acknowledge a service problem.
    AcknowledgeSvcProblem { host: String, description: String, sticky: bool, author: String, comment: String },
    /// Remove a host acknowledgement.
    RemoveHostAcknowledgement { host: String },
    /// Remove a service acknowledgement.
    RemoveSvcAcknowledgement { host: String, description: String },
    /// Add a comment to a host.
    AddHostComment { host: String, author: String, comment: String },
    /// Add a comment to a service.
    AddSvcComment { host: String, description: String, author: String, comment: String },
    /// Delete a comment by id.
    DelComment { id: u64 },
    /// Ask the running server to reload its configuration.
    RestartProgram,
    /// Ask the running server to shut down.
    ShutdownProgram,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let line = render(&args.command);
    submit(&args.command_file, &line)
}

fn render(command: &Command) -> String {
    let body = match command {
        Command::EnableHostChecks { host } => format!("ENABLE_HOST_CHECKS;{host}"),
        Command::DisableHostChecks { host } => format!("DISABLE_HOST_CHECKS;{host}"),
        Command::EnableSvcChecks { host, description } => format!("ENABLE_SVC_CHECKS;{host};{description}"),
        Command::DisableSvcChecks { host, description } => format!("DISABLE_SVC_CHECKS;{host};{description}"),
        Command::EnableNotifications => "ENABLE_NOTIFICATIONS".to_string(),
        Command::DisableNotifications => "DISABLE_NOTIFICATIONS".to_string(),
        Command::EnableHostNotifications { host } => format!("ENABLE_HOST_NOTIFICATIONS;{host}"),
        Command::DisableHostNotifications { host } => format!("DISABLE_HOST_NOTIFICATIONS;{host}"),
        Command::EnableSvcNotifications { host, description } => format!("ENABLE_SVC_NOTIFICATIONS;{host};{description}"),
        Command::DisableSvcNotifications { host, description } => format!("DISABLE_SVC_NOTIFICATIONS;{host};{description}"),
        Command::ProcessHostCheckResult { host, exit_code, output } => {
            format!("PROCESS_HOST_CHECK_RESULT;{host};{exit_code};{output}")
        }
        Command::ProcessServiceCheckResult { host, description, exit_code, output } => {
            format!("PROCESS_SERVICE_CHECK_RESULT;{host};{description};{exit_code};{output}")
        }
        Command::ScheduleHostDowntime {
            host, start_time, end_time, fixed, triggered_by, duration_secs, author, comment,
        } => format!(
            "SCHEDULE_HOST_DOWNTIME;{host};{start_time};{end_time};{};{triggered_by};{duration_secs};{author};{comment}",
            *fixed as u8
        ),
        Command::ScheduleSvcDowntime {
            host, description, start_time, end_time, fixed, triggered_by, duration_secs, author, comment,
        } => format!(
            "SCHEDULE_SVC_DOWNTIME;{host};{description};{start_time};{end_time};{};{triggered_by};{duration_secs};{author};{comment}",
            *fixed as u8
        ),
        Command::DelDowntime { id } => format!("DEL_HOST_DOWNTIME;{id}"),
        Command::AcknowledgeHostProblem { host, sticky, author, comment } => {
            format!("ACKNOWLEDGE_HOST_PROBLEM;{host};{};{author};{comment}", *sticky as u8)
        }
        Command::AcknowledgeSvcProblem { host, description, sticky, author, comment } => {
            format!("ACKNOWLEDGE_SVC_PROBLEM;{host};{description};{};{author};{comment}", *sticky as u8)
        }
        Command::RemoveHostAcknowledgement { host } => format!("REMOVE_HOST_ACKNOWLEDGEMENT;{host}"),
        Command::RemoveSvcAcknowledgement { host, description } => format!("REMOVE_SVC_ACKNOWLEDGEMENT;{host};{description}"),
        Command::AddHostComment { host, author, comment } => format!("ADD_HOST_COMMENT;{host};{author};{comment}"),
        Command::AddSvcComment { host, description, author, comment } => {
            format!("ADD_SVC_COMMENT;{host};{description};{author};{comment}")
        }
        Command::DelComment { id } => format!("DEL_HOST_COMMENT;{id}"),
        Command::RestartProgram => "RESTART_PROGRAM".to_string(),
        Command::ShutdownProgram => "SHUTDOWN_PROGRAM".to_string(),
    };
    format!("[{}] {body}", chrono::Utc::now().timestamp())
}

fn submit(command_file: &PathBuf, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(command_file)
        .with_context(|| format!("opening command fifo {}", command_file.display()))?;
    writeln!(file, "{line}").with_context(|| format!("writing to command fifo {}", command_file.display()))?;
    println!("submitted: {line}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_enable_host_checks() {
        let line = render(&Command::EnableHostChecks { host: "web01".to_string() });
        assert!(line.ends_with("ENABLE_HOST_CHECKS;web01"));
        assert!(line.starts_with('['));
    }

    #[test]
    fn renders_acknowledge_with_sticky_flag() {
        let line = render(&Command::AcknowledgeHostProblem {
            host: "web01".to_string(),
            sticky: true,
            author: "alice".to_string(),
            comment: "investigating".to_string(),
        });
        assert!(line.contains("ACKNOWLEDGE_HOST_PROBLEM;web01;1;alice;investigating"));
    }
}

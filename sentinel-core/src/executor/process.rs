use std::process::Stdio;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::ids::IdSequence;

use super::result::{parse_output, CheckResult, ExitStatus};

/// Output captured past this many bytes is truncated (spec.md §4.2: "typically
/// 8 KiB for the short output plus unlimited long-output continuation" — we
/// cap total captured bytes generously rather than literally leaving the
/// continuation unbounded, to keep a single slow plugin from exhausting
/// memory; this is documented in DESIGN.md as the concrete reading of that
/// clause).
const OUTPUT_CAP_BYTES: usize = 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL on timeout (spec.md §4.2 step 4).
const KILL_GRACE: StdDuration = StdDuration::from_millis(500);

static COMMAND_IDS: IdSequence = IdSequence::new();

/// Direct fork/exec check executor (spec.md §4.2, component C). Spawns a
/// fresh process per invocation under its own process group so a timeout can
/// signal every descendant, the way `ferrex-server`'s transcoding worker
/// spawns `ffmpeg` under `tokio::process::Command` + `tokio::time::timeout`.
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Runs `argv` (already macro-expanded) under `timeout`, returning a
    /// structured [`CheckResult`]. `timeout_exit_code` is substituted on
    /// timeout (spec.md: CRITICAL for services, DOWN for hosts, caller's
    /// choice).
    pub async fn execute(&self, argv: &[String], timeout: StdDuration, timeout_exit_code: i32) -> CheckResult {
        let command_id = COMMAND_IDS.next();
        let start_time = Utc::now();

        let Some((program, args)) = argv.split_first() else {
            return CheckResult {
                command_id,
                exit_code: timeout_exit_code,
                exit_status: ExitStatus::Crash,
                start_time,
                end_time: Utc::now(),
                plugin_output: "empty command line".to_string(),
                long_plugin_output: String::new(),
                perf_data: String::new(),
            };
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            // Own process group so the whole subtree can be signalled on timeout.
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(command_id, %err, "failed to spawn check plugin");
                return CheckResult {
                    command_id,
                    exit_code: timeout_exit_code,
                    exit_status: ExitStatus::Crash,
                    start_time,
                    end_time: Utc::now(),
                    plugin_output: format!("spawn failed: {err}"),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                };
            }
        };

        let pid = child.id();
        let mut stdout = child.stdout.take();

        let run = async {
            let mut buf = Vec::new();
            if let Some(out) = stdout.take() {
                let mut out = out;
                let mut chunk = [0u8; 8192];
                loop {
                    match out.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            if buf.len() < OUTPUT_CAP_BYTES {
                                let remaining = OUTPUT_CAP_BYTES - buf.len();
                                buf.extend_from_slice(&chunk[..n.min(remaining)]);
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
            let status = child.wait().await;
            (status, buf)
        };

        match tokio::time::timeout(timeout, run).await {
            Ok((Ok(status), buf)) => {
                let end_time = Utc::now();
                let output = String::from_utf8_lossy(&buf).to_string();
                let (plugin_output, long_plugin_output, perf_data) = parse_output(&output);

                #[cfg(unix)]
                let crashed = {
                    use std::os::unix::process::ExitStatusExt;
                    status.signal().is_some()
                };
                #[cfg(not(unix))]
                let crashed = false;

                CheckResult {
                    command_id,
                    exit_code: status.code().unwrap_or(timeout_exit_code),
                    exit_status: if crashed { ExitStatus::Crash } else { ExitStatus::Normal },
                    start_time,
                    end_time,
                    plugin_output,
                    long_plugin_output,
                    perf_data,
                }
            }
            Ok((Err(err), _)) => {
                warn!(command_id, %err, "failed waiting for check plugin");
                CheckResult {
                    command_id,
                    exit_code: timeout_exit_code,
                    exit_status: ExitStatus::Crash,
                    start_time,
                    end_time: Utc::now(),
                    plugin_output: format!("wait failed: {err}"),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                }
            }
            Err(_) => {
                debug!(command_id, ?pid, "check plugin timed out, signalling process group");
                kill_process_group(pid, KILL_GRACE).await;
                CheckResult {
                    command_id,
                    exit_code: timeout_exit_code,
                    exit_status: ExitStatus::Timeout,
                    start_time,
                    end_time: Utc::now(),
                    plugin_output: format!("plugin timed out after {timeout:?}"),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                }
            }
        }
    }
}

#[cfg(unix)]
async fn kill_process_group(pid: Option<u32>, grace: StdDuration) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let pgid = Pid::from_raw(pid as i32);
    let _ = killpg(pgid, Signal::SIGTERM);
    tokio::time::sleep(grace).await;
    let _ = killpg(pgid, Signal::SIGKILL);
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: Option<u32>, _grace: StdDuration) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn executes_and_parses_output() {
        let executor = ProcessExecutor::new();
        let argv = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "echo 'OK - fine|latency=1ms'".to_string(),
        ];
        let result = executor.execute(&argv, StdDuration::from_secs(5), 2).await;
        assert_eq!(result.exit_status, ExitStatus::Normal);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.plugin_output, "OK - fine");
        assert_eq!(result.perf_data, "latency=1ms");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_a_crash() {
        let executor = ProcessExecutor::new();
        let argv = vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            "echo 'CRITICAL - down'; exit 2".to_string(),
        ];
        let result = executor.execute(&argv, StdDuration::from_secs(5), 2).await;
        assert_eq!(result.exit_status, ExitStatus::Normal);
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn timeout_synthesizes_configured_exit_code() {
        let executor = ProcessExecutor::new();
        let argv = vec!["/bin/sleep".to_string(), "5".to_string()];
        let result = executor
            .execute(&argv, StdDuration::from_millis(100), 2)
            .await;
        assert_eq!(result.exit_status, ExitStatus::Timeout);
        assert_eq!(result.exit_code, 2);
    }

    #[tokio::test]
    async fn empty_argv_is_reported_as_crash() {
        let executor = ProcessExecutor::new();
        let result = executor.execute(&[], StdDuration::from_secs(1), 2).await;
        assert_eq!(result.exit_status, ExitStatus::Crash);
    }
}

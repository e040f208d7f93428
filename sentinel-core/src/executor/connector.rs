//! Connector client (spec.md §4.3, component D): multiplexes many check
//! invocations onto one long-lived helper process over a length-delimited
//! binary protocol. Frame layout: ASCII-decimal id, then a `\0`-separated
//! field list (the last field is itself `\0`-terminated), then a 4-byte
//! `\0\0\0\0` trailer marking the end of the frame.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, warn};

use crate::ids::IdSequence;

use super::result::{parse_output, CheckResult, ExitStatus};

const TRAILER: [u8; 4] = [0, 0, 0, 0];
const GRACE: Duration = Duration::from_millis(500);

pub const FRAME_HELLO: u32 = 0;
pub const FRAME_HELLO_ACK: u32 = 1;
pub const FRAME_EXECUTE: u32 = 2;
pub const FRAME_RESULT: u32 = 3;
pub const FRAME_QUIT: u32 = 4;
pub const FRAME_QUIT_ACK: u32 = 5;

const ENGINE_MAJOR: u32 = 1;
const ENGINE_MINOR: u32 = 0;

/// Encodes a frame: id, then each field NUL-terminated, then the trailer.
pub fn encode_frame(id: u32, fields: &[String]) -> Vec<u8> {
    let mut buf = id.to_string().into_bytes();
    buf.push(0);
    for field in fields {
        buf.extend_from_slice(field.as_bytes());
        buf.push(0);
    }
    buf.extend_from_slice(&TRAILER);
    buf
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("truncated frame: missing trailer")]
    Truncated,
    #[error("frame has no id field")]
    MissingId,
    #[error("non-numeric frame id: {0}")]
    BadId(String),
}

/// Decodes one frame's raw bytes (everything before the trailer) into an id
/// plus its field list.
pub fn decode_frame(raw: &[u8]) -> Result<(u32, Vec<String>), FrameError> {
    let text = String::from_utf8_lossy(raw);
    let mut parts: Vec<&str> = text.split('\0').collect();
    // The last field is NUL-terminated, so splitting leaves one trailing
    // empty token; drop it if present.
    if parts.last() == Some(&"") {
        parts.pop();
    }
    let mut iter = parts.into_iter();
    let id_str = iter.next().ok_or(FrameError::MissingId)?;
    let id: u32 = id_str.parse().map_err(|_| FrameError::BadId(id_str.to_string()))?;
    Ok((id, iter.map(str::to_string).collect()))
}

/// Reads frames off an `AsyncRead`, yielding `(id, fields)` until EOF or a
/// framing error (spec.md §4.3 "Framing errors").
async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> Option<Result<(u32, Vec<String>), FrameError>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read_exact(&mut byte).await {
            Ok(()) => {
                buf.push(byte[0]);
                if buf.len() >= 4 && buf[buf.len() - 4..] == TRAILER {
                    let body = &buf[..buf.len() - 4];
                    return Some(decode_frame(body));
                }
            }
            Err(_) => {
                if buf.is_empty() {
                    return None;
                }
                return Some(Err(FrameError::Truncated));
            }
        }
    }
}

struct PendingRequest {
    reply: oneshot::Sender<CheckResult>,
    started: chrono::DateTime<Utc>,
}

/// Long-lived helper process wrapper. One [`ConnectorClient`] per configured
/// connector (spec.md §5: "Connector helpers — one per configured
/// connector").
pub struct ConnectorClient {
    helper_path: String,
    command_ids: IdSequence,
    inner: Mutex<Inner>,
}

struct Inner {
    child: Option<Child>,
    stdin: Option<tokio::process::ChildStdin>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

impl ConnectorClient {
    pub fn new(helper_path: impl Into<String>) -> Self {
        Self {
            helper_path: helper_path.into(),
            command_ids: IdSequence::new(),
            inner: Mutex::new(Inner {
                child: None,
                stdin: None,
                pending: Arc::new(Mutex::new(HashMap::new())),
                reader_task: None,
            }),
        }
    }

    /// Spawns the helper and performs the hello/version handshake if not
    /// already running.
    async fn ensure_started(&self, inner: &mut Inner) -> std::io::Result<()> {
        if inner.child.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.helper_path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;
        let mut stdin = child.stdin.take().expect("piped stdin");
        let mut stdout = child.stdout.take().expect("piped stdout");

        stdin
            .write_all(&encode_frame(
                FRAME_HELLO,
                &[ENGINE_MAJOR.to_string(), ENGINE_MINOR.to_string()],
            ))
            .await?;

        let pending = inner.pending.clone();
        let reader_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut stdout).await {
                    Some(Ok((FRAME_HELLO_ACK, _))) => continue,
                    Some(Ok((FRAME_RESULT, fields))) if fields.len() >= 3 => {
                        let Ok(command_id) = fields[0].parse::<u64>() else { continue };
                        let executed = fields[1] == "1";
                        let exit_code: i32 = fields[2].parse().unwrap_or(-1);
                        let output = fields.get(4).cloned().unwrap_or_default();
                        let (plugin_output, long_plugin_output, perf_data) = parse_output(&output);
                        let now = Utc::now();
                        let mut pending = pending.lock().await;
                        if let Some(req) = pending.remove(&command_id) {
                            let result = CheckResult {
                                command_id,
                                exit_code,
                                exit_status: if executed { ExitStatus::Normal } else { ExitStatus::Crash },
                                start_time: req.started,
                                end_time: now,
                                plugin_output,
                                long_plugin_output,
                                perf_data,
                            };
                            let _ = req.reply.send(result);
                        }
                    }
                    Some(Ok((FRAME_QUIT_ACK, _))) => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(%err, "connector framing error, tearing down helper");
                        break;
                    }
                    None => break,
                }
            }
            // Helper gone: fail every still-outstanding request as CRASH.
            let mut pending = pending.lock().await;
            for (command_id, req) in pending.drain() {
                let result = CheckResult {
                    command_id,
                    exit_code: -1,
                    exit_status: ExitStatus::Crash,
                    start_time: req.started,
                    end_time: Utc::now(),
                    plugin_output: "connector helper exited".to_string(),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                };
                let _ = req.reply.send(result);
            }
        });

        inner.child = Some(child);
        inner.stdin = Some(stdin);
        inner.reader_task = Some(reader_task);
        Ok(())
    }

    /// Tears down the current helper (if any) so the next call restarts it.
    async fn restart(&self, inner: &mut Inner) {
        if let Some(mut child) = inner.child.take() {
            let _ = child.kill().await;
        }
        if let Some(task) = inner.reader_task.take() {
            task.abort();
        }
        inner.stdin = None;
    }

    /// Executes one check through the connector, correlating by
    /// `command_id`. Synthesizes a TIMEOUT result if the helper never
    /// replies within `timeout + grace` (spec.md §4.3).
    pub async fn execute(&self, cmdline: &str, timeout: Duration, timeout_exit_code: i32) -> CheckResult {
        let command_id = self.command_ids.next();
        let started = Utc::now();

        let mut inner = self.inner.lock().await;
        if self.ensure_started(&mut inner).await.is_err() {
            return CheckResult {
                command_id,
                exit_code: timeout_exit_code,
                exit_status: ExitStatus::Crash,
                start_time: started,
                end_time: Utc::now(),
                plugin_output: "failed to start connector helper".to_string(),
                long_plugin_output: String::new(),
                perf_data: String::new(),
            };
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = inner.pending.lock().await;
            pending.insert(command_id, PendingRequest { reply: tx, started });
        }

        let deadline = Utc::now() + chrono::Duration::from_std(timeout).unwrap_or_default();
        let frame = encode_frame(
            FRAME_EXECUTE,
            &[
                command_id.to_string(),
                timeout.as_secs().to_string(),
                deadline.timestamp().to_string(),
                cmdline.to_string(),
            ],
        );

        let write_result = match inner.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&frame).await,
            None => Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connector stdin missing")),
        };
        drop(inner);

        if write_result.is_err() {
            debug!(command_id, "connector write failed, restarting helper");
            let mut inner = self.inner.lock().await;
            self.restart(&mut inner).await;
            return CheckResult {
                command_id,
                exit_code: timeout_exit_code,
                exit_status: ExitStatus::Crash,
                start_time: started,
                end_time: Utc::now(),
                plugin_output: "connector write failed".to_string(),
                long_plugin_output: String::new(),
                perf_data: String::new(),
            };
        }

        match tokio::time::timeout(timeout + GRACE, rx).await {
            Ok(Ok(result)) => result,
            _ => {
                warn!(command_id, "connector helper timed out, restarting");
                let mut inner = self.inner.lock().await;
                inner.pending.lock().await.remove(&command_id);
                self.restart(&mut inner).await;
                CheckResult {
                    command_id,
                    exit_code: timeout_exit_code,
                    exit_status: ExitStatus::Timeout,
                    start_time: started,
                    end_time: Utc::now(),
                    plugin_output: format!("connector timed out after {timeout:?}"),
                    long_plugin_output: String::new(),
                    perf_data: String::new(),
                }
            }
        }
    }

    pub async fn quit(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(stdin) = inner.stdin.as_mut() {
            let _ = stdin.write_all(&encode_frame(FRAME_QUIT, &[])).await;
        }
        self.restart(&mut inner).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let fields = vec!["42".to_string(), "5".to_string(), "echo hi".to_string()];
        let frame = encode_frame(FRAME_EXECUTE, &fields);
        assert!(frame.ends_with(&TRAILER));
        let body = &frame[..frame.len() - 4];
        let (id, decoded_fields) = decode_frame(body).unwrap();
        assert_eq!(id, FRAME_EXECUTE);
        assert_eq!(decoded_fields, fields);
    }

    #[test]
    fn decode_rejects_non_numeric_id() {
        let err = decode_frame(b"nope\0field\0").unwrap_err();
        assert!(matches!(err, FrameError::BadId(_)));
    }

    #[test]
    fn encode_zero_field_frame() {
        let frame = encode_frame(FRAME_QUIT, &[]);
        let body = &frame[..frame.len() - 4];
        let (id, fields) = decode_frame(body).unwrap();
        assert_eq!(id, FRAME_QUIT);
        assert!(fields.is_empty());
    }
}

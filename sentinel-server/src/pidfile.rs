//! Pid-file management for `--pid-file`, mirroring the lock-and-overwrite
//! pattern a long-running daemon needs so a second launch against the same
//! file doesn't silently clobber a live instance.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Writes the current process id to `path`, refusing to overwrite a pid file
/// left behind by a process that is still alive.
pub fn write(path: &Path) -> Result<()> {
    if let Ok(existing) = fs::read_to_string(path) {
        if let Ok(pid) = existing.trim().parse::<i32>() {
            if process_alive(pid) {
                bail!("pid file {} already claimed by running process {pid}", path.display());
            }
        }
    }
    fs::write(path, format!("{}\n", std::process::id())).with_context(|| format!("writing pid file {}", path.display()))
}

pub fn remove(path: &Path) {
    let _ = fs::remove_file(path);
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

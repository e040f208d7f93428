//! Named-pipe external command reader (spec.md §4.11). A blocking thread
//! owns the FIFO and forwards raw lines; turning a line into a concrete
//! `ExternalCommand` needs graph access, so that happens back on the
//! scheduler thread in [`crate::commands::resolve_line`].

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{error, warn};

/// Creates the FIFO at `path` if it doesn't exist yet, then spawns a
/// blocking thread that reopens and rereads it forever. A FIFO reader sees
/// EOF whenever the last writer closes its end, so the loop must reopen
/// rather than exit.
pub fn spawn_reader(path: PathBuf) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || reader_loop(&path, tx));
    rx
}

fn reader_loop(path: &Path, tx: mpsc::UnboundedSender<String>) {
    if !path.exists() {
        if let Err(e) = make_fifo(path) {
            error!(path = %path.display(), error = %e, "failed to create command fifo");
            return;
        }
    }
    loop {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to open command fifo");
                return;
            }
        };
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) if !line.is_empty() => {
                    if tx.send(line).is_err() {
                        return; // receiving end dropped; server is shutting down.
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "error reading command fifo, reopening");
                    break;
                }
            }
        }
        // Every writer closed; loop back and reopen for the next one.
    }
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> std::io::Result<()> {
    nix::unistd::mkfifo(path, nix::sys::stat::Mode::from_bits_truncate(0o660))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
}

#[cfg(not(unix))]
fn make_fifo(_path: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "named pipes are only supported on unix",
    ))
}

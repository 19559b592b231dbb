//! Pipe reader loop.
//!
//! One background thread per server: each iteration polls the shutdown
//! flag, reads one full writer open/write/close cycle from the non-blocking
//! pipe handle, tokenizes it into a record and dispatches it synchronously.
//! Handlers therefore never overlap and records are processed in
//! pipe-arrival order.
//!
//! Record boundaries are end-of-stream samples: a read returns zero exactly
//! while the pipe is empty and no writer is connected. The loop therefore
//! never sleeps while a writer session is live — it re-reads eagerly so the
//! sub-microsecond gap between one client closing and the next one opening
//! is always observed, keeping back-to-back cycles from draining as one
//! merged stream. While the pipe is idle the loop parks in a blocking
//! read-end open, which completes the moment a writer connects.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::record::{Record, parse_record};
use crate::registry::Registry;

pub(crate) const READER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reader");

/// Empty reads tolerated before concluding the connected writer has
/// stalled. Each attempt is one short syscall, so the budget covers a few
/// hundred microseconds of writer handoff without ever sleeping through an
/// end-of-stream boundary.
const EAGER_REREADS: usize = 4096;
/// Pause between reads once a connected writer has stalled.
const STALL_BACKOFF: Duration = Duration::from_millis(1);
/// Pause after a read or park error before retrying.
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

pub(crate) fn run_reader_loop(
    mut pipe: File,
    path: &Path,
    registry: &Arc<Mutex<Registry>>,
    shutdown: &AtomicBool,
) {
    info!(target: READER_TARGET, "pipe reader active");
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match read_cycle(&mut pipe, shutdown) {
            Ok(Some(raw)) => {
                last_error = None;
                dispatch(&raw, registry);
            }
            Ok(None) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(error) = wait_for_writer(path) {
                    report_damped(&mut last_error, &error);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
            Err(error) => {
                report_damped(&mut last_error, &error);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    debug!(target: READER_TARGET, "pipe reader stopped");
}

fn report_damped(last_error: &mut Option<io::ErrorKind>, error: &io::Error) {
    let kind = error.kind();
    if *last_error != Some(kind) {
        warn!(target: READER_TARGET, error = %error, "pipe read error");
    }
    *last_error = Some(kind);
}

/// Parks until a writer connects. A transient blocking read-end open
/// completes exactly when the pipe gains a writer (including the wake
/// connection `Server::close` makes); the handle is dropped straight away
/// and the long-lived non-blocking handle does the reading.
fn wait_for_writer(path: &Path) -> io::Result<()> {
    File::open(path).map(drop)
}

/// Reads one writer cycle from the long-lived handle. `Ok(None)` means the
/// pipe was empty with no writer connected; `Ok(Some)` carries the full
/// byte stream of one open/write/close cycle, terminated by the
/// end-of-stream observed once the writer disconnects.
fn read_cycle(pipe: &mut File, shutdown: &AtomicBool) -> io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    let mut rereads = 0_usize;
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => {
                return Ok(if buffer.is_empty() { None } else { Some(buffer) });
            }
            Ok(read) => {
                buffer.extend_from_slice(&chunk[..read]);
                rereads = 0;
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                // A writer holds the pipe open without pending data. Re-read
                // without pausing: a writer handoff lasts well under the
                // cost of one read call, so the zero-writer sample marking
                // the record boundary is never slept through. Only a
                // genuinely stalled writer sends the loop to sleep.
                rereads += 1;
                if rereads > EAGER_REREADS {
                    if shutdown.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    thread::sleep(STALL_BACKOFF);
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

fn dispatch(raw: &[u8], registry: &Mutex<Registry>) {
    let text = String::from_utf8_lossy(raw);
    let Some(record) = parse_record(&text) else {
        debug!(target: READER_TARGET, "empty record dropped");
        return;
    };

    // A panicking handler poisons the lock; recovering the guard keeps the
    // control channel alive for later records.
    let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
    match record {
        Record::Command { name, args } => match registry.command_mut(&name) {
            Some(handler) => {
                debug!(target: READER_TARGET, command = %name, "dispatching command");
                if let Err(error) = handler(&name, &args) {
                    warn!(
                        target: READER_TARGET,
                        command = %name,
                        error = %error,
                        "command handler failed"
                    );
                }
            }
            None => {
                debug!(target: READER_TARGET, command = %name, "unregistered command dropped");
            }
        },
        Record::Assignment { field, value } => match registry.field_mut(&field) {
            Some(handler) => {
                debug!(target: READER_TARGET, field = %field, "dispatching assignment");
                if let Err(error) = handler(&field, &value) {
                    warn!(
                        target: READER_TARGET,
                        field = %field,
                        error = %error,
                        "field handler failed"
                    );
                }
            }
            None => {
                debug!(target: READER_TARGET, field = %field, "unregistered field dropped");
            }
        },
    }
}

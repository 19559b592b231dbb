//! Named pipe (FIFO) filesystem lifecycle.
//!
//! Creates the pipe on first use, verifies a pre-existing path really is a
//! FIFO, opens the read end without blocking on a writer, and unlinks the
//! pipe on shutdown.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use thiserror::Error;

/// Errors surfaced while managing the pipe file.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("failed to create named pipe at {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: nix::Error,
    },
    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("path {path} exists but is not a named pipe")]
    NotNamedPipe { path: String },
    #[error("failed to open named pipe {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove named pipe {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Creates the FIFO at `path` (mode 0600) unless a FIFO already exists
/// there. Any other pre-existing file fails with `NotNamedPipe`.
pub(crate) fn ensure_fifo(path: &Path) -> Result<(), PipeError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_fifo() {
                Ok(())
            } else {
                Err(PipeError::NotNamedPipe {
                    path: display(path),
                })
            }
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|source| PipeError::Create {
                path: display(path),
                source,
            })
        }
        Err(source) => Err(PipeError::Metadata {
            path: display(path),
            source,
        }),
    }
}

/// Opens the read end non-blocking, so construction does not wait for a
/// writer. With no writer connected, reads observe end-of-stream; with a
/// connected writer and no pending data they report `WouldBlock`.
pub(crate) fn open_reader(path: &Path) -> Result<File, PipeError> {
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| PipeError::Open {
            path: display(path),
            source,
        })
}

/// Opens a transient write end without blocking on a reader. Succeeds as
/// long as a read end is open somewhere, and is how shutdown releases a
/// reader parked in a blocking read-end open.
pub(crate) fn open_writer(path: &Path) -> Result<File, PipeError> {
    OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| PipeError::Open {
            path: display(path),
            source,
        })
}

/// Unlinks the pipe file. A pipe already removed from the filesystem is not
/// an error.
pub(crate) fn remove_fifo(path: &Path) -> Result<(), PipeError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PipeError::Remove {
            path: display(path),
            source,
        }),
    }
}

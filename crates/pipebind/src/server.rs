//! Server facade: pipe lifecycle plus the registration API.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::info;

use crate::bind::{Bindable, BindTarget, FieldSlot};
use crate::pipe::{self, PipeError};
use crate::reader::{READER_TARGET, run_reader_loop};
use crate::registry::{HandlerResult, Registry, RegistryError};

/// Errors surfaced by server construction and shutdown.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Pipe(#[from] PipeError),
    #[error("failed to spawn pipe reader thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
    #[error("pipe reader thread panicked")]
    ReaderPanic,
}

/// A control channel server over one named pipe.
///
/// Construction creates the pipe (if absent), opens its read end and starts
/// the background reader loop; exactly one instance should own a given pipe
/// path. All registered handlers run on the reader thread, one record at a
/// time.
pub struct Server {
    path: PathBuf,
    registry: Arc<Mutex<Registry>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("path", &self.path)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Opens (creating if necessary) the named pipe at `path` and starts
    /// dispatching records written to it.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Pipe`] when the path holds a non-pipe file or
    /// the pipe cannot be created or opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref().to_path_buf();
        pipe::ensure_fifo(&path)?;
        let handle = pipe::open_reader(&path)?;

        let registry = Arc::new(Mutex::new(Registry::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let loop_registry = Arc::clone(&registry);
        let loop_shutdown = Arc::clone(&shutdown);
        let loop_path = path.clone();
        let reader = thread::Builder::new()
            .name("pipebind-reader".to_owned())
            .spawn(move || run_reader_loop(handle, &loop_path, &loop_registry, &loop_shutdown))
            .map_err(|source| ServerError::Spawn { source })?;

        info!(target: READER_TARGET, path = %path.display(), "control pipe serving");
        Ok(Self {
            path,
            registry,
            shutdown,
            reader: Some(reader),
        })
    }

    /// The pipe path this server owns.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registers a command handler, invoked with the command name and its
    /// ordered arguments.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::DuplicateCommand`] if `name` is taken;
    /// the existing registration stays intact.
    pub fn register_command<F>(&self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: FnMut(&str, &[String]) -> HandlerResult + Send + 'static,
    {
        self.lock_registry().insert_command(name, Box::new(handler))
    }

    /// Registers a field handler, invoked with the field name and the raw
    /// value text of each assignment.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::DuplicateField`] if `name` is taken.
    pub fn register_field<F>(&self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: FnMut(&str, &str) -> HandlerResult + Send + 'static,
    {
        self.lock_registry().insert_field(name, Box::new(handler))
    }

    /// Binds a field name to a typed destination slot: each assignment is
    /// coerced against the slot's declared kind and stored on success.
    /// Coercion faults are reported by the reader loop and leave the slot
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Fails with [`RegistryError::DuplicateField`] if `name` is taken.
    pub fn bind_field<T: Bindable>(
        &self,
        name: &str,
        slot: &FieldSlot<T>,
    ) -> Result<(), RegistryError> {
        let mut target = BindTarget::new(slot);
        self.register_field(name, move |field, value| {
            target.assign(field, value)?;
            Ok(())
        })
    }

    /// Stops the reader loop, closes the pipe handle and removes the pipe
    /// file. A reader parked awaiting a writer is released by a short-lived
    /// write-end connection, so shutdown tolerates only a bounded delay
    /// (or waits until a connected writer finishes its cycle).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ReaderPanic`] if the reader thread panicked,
    /// or a wrapped I/O fault if the pipe file cannot be removed.
    pub fn close(mut self) -> Result<(), ServerError> {
        self.shutdown.store(true, Ordering::SeqCst);
        // Held across the join so the reader cannot park again before it
        // observes the flag; the open fails only once the reader has
        // already exited and dropped the read end.
        let wake = pipe::open_writer(&self.path).ok();
        if let Some(reader) = self.reader.take() {
            reader.join().map_err(|_| ServerError::ReaderPanic)?;
        }
        drop(wake);
        pipe::remove_fifo(&self.path)?;
        Ok(())
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.reader.is_some() {
            // Best-effort release of a parked reader; the thread is left
            // detached, so there is nothing to join here.
            let _ = pipe::open_writer(&self.path);
        }
    }
}

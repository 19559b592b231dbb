//! Named-pipe (FIFO) control channel for Unix processes.
//!
//! A [`Server`] owns one named pipe and treats each writer open/write/close
//! cycle as one text record. Records are either command invocations
//! (`restart now`) dispatched to registered callbacks, or field assignments
//! (`app.debug = true`) dispatched to field callbacks — including typed
//! bindings that coerce the value into a caller-owned [`FieldSlot`].
//!
//! ```no_run
//! use pipebind::{FieldSlot, Server};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::open("/tmp/app.pipe")?;
//!
//! server.register_command("reload", |_, args| {
//!     println!("reloading with {args:?}");
//!     Ok(())
//! })?;
//!
//! let debug = FieldSlot::new(false);
//! server.bind_field("app.debug", &debug)?;
//!
//! // elsewhere: `echo 'app.debug = true' > /tmp/app.pipe`
//! # Ok(())
//! # }
//! ```
//!
//! All callbacks run synchronously on the server's single reader thread, so
//! they never overlap and records dispatch in pipe-arrival order. Records
//! naming unregistered keys are dropped; a failing callback or a value that
//! does not coerce is reported through `tracing` and never takes the server
//! down. The pipe has no writer arbitration: concurrent writers can
//! interleave bytes within a record, so clients need a single-writer
//! discipline of their own.

mod bind;
mod pipe;
mod record;
mod reader;
mod registry;
mod server;
mod value;

pub use bind::{Bindable, FieldSlot};
pub use pipe::PipeError;
pub use registry::{HandlerResult, RegistryError};
pub use server::{Server, ServerError};
pub use value::{CoerceError, FloatWidth, IntWidth, Kind, Value, coerce};

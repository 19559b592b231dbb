//! Command and field registries.
//!
//! Two name→handler maps populated by the host process and read by the pipe
//! reader loop. Keys are immutable once inserted; inserting a duplicate is a
//! setup fault reported to the registering caller.

use std::collections::HashMap;
use std::error::Error;

use thiserror::Error;

/// Result type for registered handlers. A failure is reported by the reader
/// loop; it never takes the server down.
pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Handler invoked for a command record with the command name and its
/// ordered arguments.
pub(crate) type CommandHandler = Box<dyn FnMut(&str, &[String]) -> HandlerResult + Send>;

/// Handler invoked for an assignment record with the field name and the raw
/// value text.
pub(crate) type FieldHandler = Box<dyn FnMut(&str, &str) -> HandlerResult + Send>;

/// Setup faults raised at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("command {name:?} is already registered")]
    DuplicateCommand { name: String },
    #[error("field {name:?} is already registered")]
    DuplicateField { name: String },
}

#[derive(Default)]
pub(crate) struct Registry {
    commands: HashMap<String, CommandHandler>,
    fields: HashMap<String, FieldHandler>,
}

impl Registry {
    pub(crate) fn insert_command(
        &mut self,
        name: &str,
        handler: CommandHandler,
    ) -> Result<(), RegistryError> {
        if self.commands.contains_key(name) {
            return Err(RegistryError::DuplicateCommand {
                name: name.to_owned(),
            });
        }
        self.commands.insert(name.to_owned(), handler);
        Ok(())
    }

    pub(crate) fn insert_field(
        &mut self,
        name: &str,
        handler: FieldHandler,
    ) -> Result<(), RegistryError> {
        if self.fields.contains_key(name) {
            return Err(RegistryError::DuplicateField {
                name: name.to_owned(),
            });
        }
        self.fields.insert(name.to_owned(), handler);
        Ok(())
    }

    pub(crate) fn command_mut(&mut self, name: &str) -> Option<&mut CommandHandler> {
        self.commands.get_mut(name)
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> Option<&mut FieldHandler> {
        self.fields.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn duplicate_command_fails_and_first_registration_survives() {
        let mut registry = Registry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let first_hits = Arc::clone(&hits);
        registry
            .insert_command(
                "test",
                Box::new(move |_, _| {
                    first_hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .expect("first registration");

        let error = registry
            .insert_command("test", Box::new(|_, _| Ok(())))
            .unwrap_err();
        assert_eq!(
            error,
            RegistryError::DuplicateCommand {
                name: "test".to_owned(),
            }
        );

        let handler = registry.command_mut("test").expect("handler present");
        handler("test", &[]).expect("handler runs");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_field_fails() {
        let mut registry = Registry::default();
        registry
            .insert_field("app.test", Box::new(|_, _| Ok(())))
            .expect("first registration");
        let error = registry
            .insert_field("app.test", Box::new(|_, _| Ok(())))
            .unwrap_err();
        assert_eq!(
            error,
            RegistryError::DuplicateField {
                name: "app.test".to_owned(),
            }
        );
    }

    #[test]
    fn lookup_misses_are_none() {
        let mut registry = Registry::default();
        assert!(registry.command_mut("nope").is_none());
        assert!(registry.field_mut("nope").is_none());
    }
}

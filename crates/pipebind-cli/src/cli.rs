//! Command-line surface and record composition.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::debug;

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// Writes one record to a pipebind control pipe per invocation.
///
/// Each invocation performs a single open/write/close cycle, which is one
/// record on the wire. The pipe has no writer arbitration: run one writer
/// at a time.
#[derive(Debug, Parser)]
#[command(name = "pipebind", version, about)]
pub struct Cli {
    /// Path of the control pipe to write to.
    #[arg(long, value_name = "PATH")]
    pub pipe: PathBuf,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Invoke a registered command with arguments.
    Call {
        /// Command name.
        command: String,
        /// Arguments; those containing whitespace are quoted on the wire.
        /// The record format has no escape for a double quote, so
        /// arguments containing one are rejected.
        args: Vec<String>,
    },
    /// Assign a value to a registered field.
    Set {
        /// Dotted field name, e.g. `app.debug`.
        field: String,
        /// Value text; quoted on the wire so surrounding whitespace
        /// survives. The record format has no escape for a double quote,
        /// so values containing one are rejected.
        value: String,
    },
    /// Write raw record text verbatim.
    Send {
        /// The complete record.
        record: String,
    },
}

/// Errors surfaced while writing a record.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to open control pipe {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write record to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{what} {text:?} contains a double quote, which the record format cannot carry")]
    EmbeddedQuote { what: &'static str, text: String },
}

impl Cli {
    /// Composes the record and writes it in one cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] when the record cannot be represented on the
    /// wire, the pipe cannot be opened for writing, or the write fails.
    pub fn run(&self) -> Result<(), CliError> {
        let record = self.action.compose()?;
        debug!(target: CLI_TARGET, record = %record, "writing record");

        let path = self.pipe.display().to_string();
        let mut pipe = OpenOptions::new()
            .write(true)
            .open(&self.pipe)
            .map_err(|source| CliError::Open {
                path: path.clone(),
                source,
            })?;
        pipe.write_all(record.as_bytes())
            .map_err(|source| CliError::Write { path, source })
    }
}

impl Action {
    fn compose(&self) -> Result<String, CliError> {
        match self {
            Self::Call { command, args } => {
                let mut record = command.clone();
                for arg in args {
                    reject_embedded_quote("argument", arg)?;
                    record.push(' ');
                    if arg.chars().any(char::is_whitespace) {
                        record.push('"');
                        record.push_str(arg);
                        record.push('"');
                    } else {
                        record.push_str(arg);
                    }
                }
                Ok(record)
            }
            Self::Set { field, value } => {
                reject_embedded_quote("value", value)?;
                Ok(format!("{field} = \"{value}\""))
            }
            Self::Send { record } => Ok(record.clone()),
        }
    }
}

// A quote inside quoted text would end the token early on the read side,
// silently truncating the record; refuse to compose one.
fn reject_embedded_quote(what: &'static str, text: &str) -> Result<(), CliError> {
    if text.contains('"') {
        return Err(CliError::EmbeddedQuote {
            what,
            text: text.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::bare_call(
        Action::Call { command: "reload".to_owned(), args: vec![] },
        "reload"
    )]
    #[case::quoted_arg(
        Action::Call {
            command: "test".to_owned(),
            args: vec!["arg".to_owned(), "with space".to_owned()],
        },
        r#"test arg "with space""#
    )]
    #[case::set_quotes_value(
        Action::Set {
            field: "app.motd".to_owned(),
            value: " padded ".to_owned(),
        },
        r#"app.motd = " padded ""#
    )]
    #[case::send_is_verbatim(
        Action::Send { record: "app.test=true".to_owned() },
        "app.test=true"
    )]
    fn composes_wire_records(#[case] action: Action, #[case] expected: &str) {
        assert_eq!(action.compose().expect("composable record"), expected);
    }

    #[rstest]
    #[case::quoted_set_value(
        Action::Set {
            field: "greeting".to_owned(),
            value: r#"say "hi""#.to_owned(),
        },
        "value"
    )]
    #[case::quoted_call_argument(
        Action::Call {
            command: "announce".to_owned(),
            args: vec![r#""loud""#.to_owned()],
        },
        "argument"
    )]
    fn embedded_double_quotes_are_rejected(#[case] action: Action, #[case] what: &str) {
        let error = action.compose().expect_err("unrepresentable record");
        match error {
            CliError::EmbeddedQuote { what: got, .. } => assert_eq!(got, what),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn send_passes_raw_text_through() {
        let action = Action::Send {
            record: r#"field = "untouched""#.to_owned(),
        };
        assert_eq!(
            action.compose().expect("verbatim record"),
            r#"field = "untouched""#
        );
    }
}

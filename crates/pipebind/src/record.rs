//! Record tokenizer for the pipe wire format.
//!
//! One pipe open/write/close cycle carries exactly one record:
//!
//! - `name arg "quoted arg"` — a command invocation;
//! - `field.name = value` — a field assignment.
//!
//! Classification is lexical: a record is an assignment iff the first
//! non-whitespace token after the leading identifier is `=`. Whitespace
//! around the field name and the `=` is discarded; interior whitespace in an
//! unquoted value is kept verbatim, while a double-quoted value keeps its
//! leading and trailing whitespace exactly.

use std::iter::Peekable;
use std::str::Chars;

/// A classified record, live for a single dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Record {
    Command { name: String, args: Vec<String> },
    Assignment { field: String, value: String },
}

/// Parses one cycle's text into a record.
///
/// Returns `None` when the stream holds no leading identifier (empty or
/// whitespace-only cycles, or streams starting with punctuation).
pub(crate) fn parse_record(input: &str) -> Option<Record> {
    let mut scanner = Scanner::new(input);
    scanner.skip_whitespace();
    let name = scanner.scan_identifier()?;
    scanner.skip_whitespace();

    if scanner.consume('=') {
        let value = scanner.scan_value();
        Some(Record::Assignment { field: name, value })
    } else {
        let args = scanner.scan_args();
        Some(Record::Command { name, args })
    }
}

/// Dotted identifiers (`app.test`) and hyphenated segments
/// (`test.negative-integer`) are both legal key names.
fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-')
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|ch| ch.is_whitespace()).is_some() {}
    }

    fn consume(&mut self, expected: char) -> bool {
        self.chars.next_if_eq(&expected).is_some()
    }

    fn scan_identifier(&mut self) -> Option<String> {
        let mut identifier = String::new();
        while let Some(ch) = self.chars.next_if(|ch| is_identifier_char(*ch)) {
            identifier.push(ch);
        }
        (!identifier.is_empty()).then_some(identifier)
    }

    /// Everything up to (not including) the closing quote; the quote is
    /// consumed. An unterminated quote runs to end-of-stream.
    fn scan_quoted(&mut self) -> String {
        let mut content = String::new();
        for ch in self.chars.by_ref() {
            if ch == '"' {
                break;
            }
            content.push(ch);
        }
        content
    }

    /// Value-scanning mode, entered after `=`: leading whitespace is
    /// dropped, then either a quoted value (verbatim interior) or the rest
    /// of the stream with trailing whitespace trimmed.
    fn scan_value(&mut self) -> String {
        self.skip_whitespace();
        if self.consume('"') {
            return self.scan_quoted();
        }

        let rest: String = self.chars.by_ref().collect();
        rest.trim_end().to_owned()
    }

    /// Whitespace-delimited command arguments; double-quoted tokens keep
    /// embedded whitespace and lose the quotes.
    fn scan_args(&mut self) -> Vec<String> {
        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            if self.consume('"') {
                args.push(self.scan_quoted());
                continue;
            }

            let mut arg = String::new();
            while let Some(ch) = self.chars.next_if(|ch| !ch.is_whitespace()) {
                arg.push(ch);
            }
            if arg.is_empty() {
                break;
            }
            args.push(arg);
        }
        args
    }
}

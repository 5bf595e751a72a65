//! The error value shared by the scanner, parser, compiler, and virtual machine.

use std::fmt;

use crate::{location::SourceRange, value::Value};

/// Result alias used throughout the pipeline.
pub type RunResult<T> = Result<T, Error>;

/// An error anchored to a span of source text.
///
/// Parse and compile errors carry a plain message. Runtime errors carry an
/// arbitrary [`Value`] so that `error with {x}` can raise any value and
/// `the error` can hand it back inside a `try` block.
#[derive(Debug, Clone)]
pub struct Error {
    pub range: SourceRange,
    pub value: Value,
}

impl Error {
    /// Creates an error carrying a message string.
    pub fn new(range: SourceRange, message: impl Into<String>) -> Self {
        Self {
            range,
            value: Value::string(message.into()),
        }
    }

    /// Creates an error carrying an arbitrary value.
    #[must_use]
    pub fn with_value(range: SourceRange, value: Value) -> Self {
        Self { range, value }
    }

    /// The error message as shown to the user.
    #[must_use]
    pub fn what(&self) -> String {
        self.value.to_text()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.range.start, self.what())
    }
}

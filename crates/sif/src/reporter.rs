//! Error reporting sinks for the parser and compiler.

use std::io::Write;

use crate::error::Error;

/// Receives every syntax and compile error as it is produced.
pub trait Reporter {
    fn report(&mut self, error: &Error);
}

/// Reports errors in `name:line:col: Error: message` form with a caret
/// underline of the offending range, written to stderr.
pub struct BasicReporter {
    name: String,
    source: String,
}

impl BasicReporter {
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    fn write(&self, out: &mut impl Write, error: &Error) -> std::io::Result<()> {
        let start = error.range.start;
        writeln!(out, "{}:{}: Error: {}", self.name, start, error.what())?;

        let Some(line) = self.source.lines().nth(start.line as usize - 1) else {
            return Ok(());
        };
        writeln!(out, "{line}")?;

        let mut underline = " ".repeat(start.column.saturating_sub(1) as usize);
        underline.push('^');
        if error.range.end.line == start.line && error.range.end.column > start.column + 1 {
            let width = (error.range.end.column - start.column - 1) as usize;
            underline.push_str(&"~".repeat(width));
        }
        writeln!(out, "{underline}")
    }
}

impl Reporter for BasicReporter {
    fn report(&mut self, error: &Error) {
        let mut stderr = std::io::stderr().lock();
        let _ = self.write(&mut stderr, error);
    }
}

/// Collects errors for later inspection. Used by tests and module loading.
#[derive(Default)]
pub struct CaptureReporter {
    errors: Vec<Error>,
}

impl CaptureReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl Reporter for CaptureReporter {
    fn report(&mut self, error: &Error) {
        self.errors.push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{SourceLocation, SourceRange};

    #[test]
    fn underline_covers_range() {
        let reporter = BasicReporter::new("test", "set x to y\n");
        let range = SourceRange {
            start: SourceLocation {
                line: 1,
                column: 5,
                offset: 4,
            },
            end: SourceLocation {
                line: 1,
                column: 10,
                offset: 9,
            },
        };
        let mut out = Vec::new();
        reporter
            .write(&mut out, &Error::new(range, "unknown variable"))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "test:1:5: Error: unknown variable\nset x to y\n    ^~~~~\n"
        );
    }
}

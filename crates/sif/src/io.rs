//! Output and input abstraction for the `system` module natives.
//!
//! `print`/`write` flow through an [`OutputWriter`] so hosts and tests can
//! capture or suppress program output; `read` flows through an
//! [`InputSource`].

use std::io::{self, BufRead, Read, Write};

/// Receives text written by `print` and `write`.
pub trait OutputWriter {
    /// Writes to the program's output stream.
    fn out(&mut self, text: &str);

    /// Writes to the program's error stream.
    fn err(&mut self, text: &str);
}

/// Default writer targeting stdout/stderr.
#[derive(Debug, Default)]
pub struct StdOutput;

impl OutputWriter for StdOutput {
    fn out(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn err(&mut self, text: &str) {
        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
    }
}

/// Writer that collects both streams into strings.
#[derive(Debug, Default)]
pub struct CollectOutput {
    out: String,
    err: String,
}

impl CollectOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.out
    }

    #[must_use]
    pub fn error_output(&self) -> &str {
        &self.err
    }
}

impl OutputWriter for CollectOutput {
    fn out(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn err(&mut self, text: &str) {
        self.err.push_str(text);
    }
}

/// Writer that discards everything.
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputWriter for NullOutput {
    fn out(&mut self, _text: &str) {}

    fn err(&mut self, _text: &str) {}
}

/// Supplies input for the `read (a) line/word/character` natives.
pub trait InputSource {
    /// Reads one line, without the trailing newline. `None` at end of input.
    fn read_line(&mut self) -> Option<String>;

    /// Reads one whitespace-delimited word. `None` at end of input.
    fn read_word(&mut self) -> Option<String>;

    /// Reads one character. `None` at end of input.
    fn read_character(&mut self) -> Option<char>;
}

/// Default input source reading from stdin.
#[derive(Debug, Default)]
pub struct StdInput;

impl InputSource for StdInput {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
        }
    }

    fn read_word(&mut self) -> Option<String> {
        let mut word = String::new();
        let mut stdin = io::stdin().lock();
        let mut byte = [0u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let c = byte[0] as char;
                    if c.is_whitespace() {
                        if word.is_empty() {
                            continue;
                        }
                        break;
                    }
                    word.push(c);
                }
            }
        }
        if word.is_empty() { None } else { Some(word) }
    }

    fn read_character(&mut self) -> Option<char> {
        let mut byte = [0u8; 1];
        match io::stdin().lock().read(&mut byte) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(byte[0] as char),
        }
    }
}

/// Input source over a fixed string. Used by tests.
#[derive(Debug, Default)]
pub struct StringInput {
    contents: String,
    position: usize,
}

impl StringInput {
    #[must_use]
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            position: 0,
        }
    }

    fn rest(&self) -> &str {
        &self.contents[self.position..]
    }
}

impl InputSource for StringInput {
    fn read_line(&mut self) -> Option<String> {
        if self.position >= self.contents.len() {
            return None;
        }
        let rest = self.rest();
        let (line, consumed) = match rest.find('\n') {
            Some(index) => (&rest[..index], index + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix('\r').unwrap_or(line).to_string();
        self.position += consumed;
        Some(line)
    }

    fn read_word(&mut self) -> Option<String> {
        let (skipped, word) = {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            let skipped = rest.len() - trimmed.len();
            if trimmed.is_empty() {
                (skipped, None)
            } else {
                let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
                (skipped, Some(trimmed[..end].to_string()))
            }
        };
        self.position += skipped;
        let word = word?;
        self.position += word.len();
        Some(word)
    }

    fn read_character(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.position += c.len_utf8();
        Some(c)
    }
}

//! Source input abstraction.
//!
//! A [`Reader`] supplies the scanner with source text. File- and string-backed
//! readers load everything up front; the REPL reader grows its buffer one
//! line at a time, letting the parser block for continuation input when a
//! block is still open (`depth > 0`).

use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

/// A growable source buffer the parser pulls tokens from.
pub trait Reader {
    /// Whether another `read` call may yield more input.
    fn readable(&self) -> bool;

    /// Makes the next chunk of input available in `contents`.
    ///
    /// `depth` is the number of unclosed blocks at the request site; an
    /// interactive reader can use it to choose a continuation prompt.
    fn read(&mut self, depth: usize) -> io::Result<()>;

    /// The full contents read so far.
    fn contents(&self) -> &str;
}

/// Reader over an in-memory string.
pub struct StringReader {
    contents: String,
}

impl StringReader {
    #[must_use]
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
        }
    }
}

impl Reader for StringReader {
    fn readable(&self) -> bool {
        false
    }

    fn read(&mut self, _depth: usize) -> io::Result<()> {
        Ok(())
    }

    fn contents(&self) -> &str {
        &self.contents
    }
}

/// Reader over a file, loaded on the first `read`.
pub struct FileReader {
    path: PathBuf,
    contents: Option<String>,
}

impl FileReader {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            contents: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reader for FileReader {
    fn readable(&self) -> bool {
        false
    }

    fn read(&mut self, _depth: usize) -> io::Result<()> {
        if self.contents.is_none() {
            self.contents = Some(fs::read_to_string(&self.path)?);
        }
        Ok(())
    }

    fn contents(&self) -> &str {
        self.contents.as_deref().unwrap_or("")
    }
}

/// Interactive reader that appends one line per `read` call.
///
/// Prompts with `prompt` at depth zero and `continuation` inside open blocks.
pub struct ReplReader {
    prompt: String,
    continuation: String,
    contents: String,
    at_eof: bool,
}

impl ReplReader {
    #[must_use]
    pub fn new(prompt: impl Into<String>, continuation: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            continuation: continuation.into(),
            contents: String::new(),
            at_eof: false,
        }
    }

    /// Discards everything read so far, keeping the prompt configuration.
    pub fn clear(&mut self) {
        self.contents.clear();
    }
}

impl Reader for ReplReader {
    fn readable(&self) -> bool {
        !self.at_eof
    }

    fn read(&mut self, depth: usize) -> io::Result<()> {
        let prompt = if depth > 0 { &self.continuation } else { &self.prompt };
        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        let count = io::stdin().lock().read_line(&mut line)?;
        if count == 0 {
            self.at_eof = true;
            return Ok(());
        }
        self.contents.push_str(&line);
        Ok(())
    }

    fn contents(&self) -> &str {
        &self.contents
    }
}

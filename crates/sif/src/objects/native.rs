//! Host-implemented functions.

use smallvec::SmallVec;

use crate::{
    error::{Error, RunResult},
    location::SourceRange,
    value::Value,
    vm::VirtualMachine,
};

/// The call-time context handed to a native: the virtual machine, the call
/// site, the evaluated arguments, and the per-argument source ranges that
/// let a native point its error at the offending argument.
pub struct NativeCallContext<'a> {
    pub vm: &'a mut VirtualMachine,
    pub range: SourceRange,
    pub arguments: Vec<Value>,
    pub argument_ranges: SmallVec<[SourceRange; 4]>,
}

impl NativeCallContext<'_> {
    #[must_use]
    pub fn argument(&self, index: usize) -> &Value {
        &self.arguments[index]
    }

    /// An error pointing at the whole call.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Error {
        let range = self.argument_ranges.first().copied().unwrap_or(self.range);
        Error::new(range, message)
    }

    /// An error raising an arbitrary value, pointing at the whole call.
    #[must_use]
    pub fn error_value(&self, value: Value) -> Error {
        let range = self.argument_ranges.first().copied().unwrap_or(self.range);
        Error::with_value(range, value)
    }

    /// An error pointing at argument `index`.
    ///
    /// The first entry of `argument_ranges` covers the whole call, so the
    /// argument ranges start at offset one. Falls back to the call range
    /// when debug info was compiled out.
    #[must_use]
    pub fn argument_error(&self, index: usize, message: impl Into<String>) -> Error {
        match self.argument_ranges.get(index + 1) {
            Some(range) => Error::new(*range, message),
            None => Error::new(
                self.range,
                format!("argument {}: {}", index + 1, message.into()),
            ),
        }
    }
}

/// The function type implementing a native callable.
pub type NativeFn = fn(&mut NativeCallContext) -> RunResult<Value>;

/// A native function object.
pub struct Native {
    callable: NativeFn,
}

impl Native {
    #[must_use]
    pub fn new(callable: NativeFn) -> Self {
        Self { callable }
    }

    #[must_use]
    pub fn callable(&self) -> NativeFn {
        self.callable
    }
}

impl std::fmt::Debug for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Native").finish_non_exhaustive()
    }
}

//! User-defined functions.

use std::rc::Rc;

use crate::{bytecode::Bytecode, signature::Signature};

/// Describes how a closure finds one enclosing variable at call time.
///
/// `is_local` distinguishes a direct slot on the creating frame from a
/// chained capture through an intermediate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub index: u16,
    pub is_local: bool,
}

/// A compiled function: its signature, its bytecode, and the capture
/// descriptors used to build the closure environment on invocation.
#[derive(Debug)]
pub struct Function {
    pub signature: Signature,
    pub bytecode: Rc<Bytecode>,
    pub captures: Vec<Capture>,
}

impl Function {
    #[must_use]
    pub fn new(signature: Signature, bytecode: Rc<Bytecode>, captures: Vec<Capture>) -> Self {
        Self {
            signature,
            bytecode,
            captures,
        }
    }
}

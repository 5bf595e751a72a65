//! Capability traits implemented by the runtime object variants that
//! support them.
//!
//! The virtual machine and the natives never match on concrete object kinds
//! for these operations; they ask the object for the capability and fail
//! with a type error when it is absent.

use std::rc::Rc;

use crate::{
    object::Object,
    objects::enumerator::Enumerator,
    value::Value,
};

/// Containers that can produce a fresh one-shot iterator.
pub trait Enumerable {
    /// `this` is the object's own shared handle, retained by the enumerator.
    fn enumerator(&self, this: &Rc<Object>) -> Enumerator;
}

/// Indexed or keyed element access. Errors are plain messages; the caller
/// attaches the source range.
pub trait Subscriptable {
    fn subscript(&self, key: &Value) -> Result<Value, String>;
    fn set_subscript(&self, key: &Value, value: Value) -> Result<(), String>;
}

/// Objects that copy on constant load and for `(a) copy of {}`.
pub trait Copyable {
    fn copy(&self) -> Object;
}

/// Objects that can be converted to numbers, e.g. strings by parsing.
pub trait NumberCastable {
    fn cast_integer(&self) -> Option<Value>;
    fn cast_float(&self) -> Option<Value>;
}

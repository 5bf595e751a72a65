//! Built-in native modules.

pub mod core;
pub mod system;

use std::rc::Rc;

use crate::{
    error::RunResult,
    object::Object,
    objects::{Native, NativeCallContext, NativeFn},
    signature::Signature,
    value::Value,
};

/// Builds the signature and value tables for a native catalog.
///
/// Values are keyed by the signature's canonical name and kept sorted so
/// code compiled against a catalog is deterministic.
pub(crate) fn build_natives(
    entries: &[(&str, NativeFn)],
) -> (Vec<Signature>, Vec<(String, Value)>) {
    let mut signatures = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    for (source, callable) in entries {
        let signature = Signature::parse(source).expect("invalid native signature");
        let name = signature.name();
        signatures.push(signature);
        values.push((name, Value::object(Object::Native(Native::new(*callable)))));
    }
    values.sort_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
    (signatures, values)
}

pub(crate) fn string_argument(context: &NativeCallContext, index: usize) -> RunResult<String> {
    context.argument(index).as_string_text().ok_or_else(|| {
        context.argument_error(
            index,
            format!("expected a string, got {}", context.argument(index).type_name()),
        )
    })
}

pub(crate) fn integer_argument(context: &NativeCallContext, index: usize) -> RunResult<i64> {
    context.argument(index).as_integer().ok_or_else(|| {
        context.argument_error(
            index,
            format!(
                "expected an integer, got {}",
                context.argument(index).type_name()
            ),
        )
    })
}

pub(crate) fn number_argument(context: &NativeCallContext, index: usize) -> RunResult<f64> {
    context.argument(index).number_as_float().ok_or_else(|| {
        context.argument_error(
            index,
            format!(
                "expected a number, got {}",
                context.argument(index).type_name()
            ),
        )
    })
}

pub(crate) fn object_argument(context: &NativeCallContext, index: usize) -> RunResult<Rc<Object>> {
    context.argument(index).as_object().cloned().ok_or_else(|| {
        context.argument_error(
            index,
            format!(
                "expected an object, got {}",
                context.argument(index).type_name()
            ),
        )
    })
}

pub(crate) fn list_argument(context: &NativeCallContext, index: usize) -> RunResult<Rc<Object>> {
    let object = object_argument(context, index)?;
    if object.as_list().is_some() {
        return Ok(object);
    }
    Err(context.argument_error(
        index,
        format!("expected a list, got {}", context.argument(index).type_name()),
    ))
}

pub(crate) fn dictionary_argument(
    context: &NativeCallContext,
    index: usize,
) -> RunResult<Rc<Object>> {
    let object = object_argument(context, index)?;
    if object.as_dictionary().is_some() {
        return Ok(object);
    }
    Err(context.argument_error(
        index,
        format!(
            "expected a dictionary, got {}",
            context.argument(index).type_name()
        ),
    ))
}

pub(crate) fn range_argument(context: &NativeCallContext, index: usize) -> RunResult<Rc<Object>> {
    let object = object_argument(context, index)?;
    if object.as_range().is_some() {
        return Ok(object);
    }
    Err(context.argument_error(
        index,
        format!("expected a range, got {}", context.argument(index).type_name()),
    ))
}

//! The `core` module: language built-ins available to every program.

use indexmap::IndexMap;
use rand::Rng;

use crate::{
    error::RunResult,
    module::Module,
    modules::{
        build_natives, dictionary_argument, integer_argument, list_argument, number_argument,
        range_argument, string_argument,
    },
    object::Object,
    objects::{NativeCallContext, Range, Str},
    signature::Signature,
    value::Value,
};

const LANGUAGE_VERSION: (i64, i64, i64) = (0, 1, 0);

pub struct Core {
    signatures: Vec<Signature>,
    values: Vec<(String, Value)>,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    #[must_use]
    pub fn new() -> Self {
        let (signatures, values) = build_natives(&[
            // Control and errors.
            ("quit", quit),
            ("quit with {}", quit_with),
            ("error with {}", error_with),
            ("the error", the_error),
            // Type tests and casts.
            ("{} is (a/an) int/integer", is_integer),
            ("{} is (a/an) num/number", is_number),
            ("{} is (a/an) bool/boolean", is_boolean),
            ("{} is (a/an) str/string", is_string),
            ("{} is (a/an) list", is_list),
            ("{} is (a/an) dict/dictionary", is_dictionary),
            ("{} is (a/an) range", is_range),
            ("{} as (a/an) int/integer", as_integer),
            ("{} as (a/an) num/number", as_number),
            ("{} as (a/an) str/string", as_string),
            ("(the) type name (of) {}", type_name),
            // Equality and membership.
            ("{} is {}", is_equal),
            ("{} is not {}", is_not_equal),
            ("{} contains {}", contains),
            ("{} is in {}", is_in),
            ("{} starts with {}", starts_with),
            ("{} ends with {}", ends_with),
            ("(the) (first) offset of {} in {}", offset_of),
            ("(the) last offset of {} in {}", last_offset_of),
            // Descriptions and hashing.
            ("(the) description (of) {}", description),
            ("(the) debug description (of) {}", debug_description),
            ("(the) hash value (of) {}", hash_value),
            // Containers.
            ("an empty list", empty_list),
            ("an empty dict/dictionary", empty_dictionary),
            ("an empty str/string", empty_string),
            ("(the) size of {}", size_of),
            ("(the) number of items (in/of) {}", size_of),
            ("(the) first item (in/of) {}", first_item),
            ("(the) last item (in/of) {}", last_item),
            ("(the) keys (of) {}", keys_of),
            ("(the) values (of) {}", values_of),
            ("insert {} at (the) beginning of {}", insert_at_beginning),
            ("insert {} at (the) end of {}", insert_at_end),
            ("insert {} at index {} into {}", insert_at_index),
            ("insert item {} with key {} into {}", insert_with_key),
            ("remove (the) first item from {}", remove_first_item),
            ("remove (the) last item from {}", remove_last_item),
            ("remove item {} from {}", remove_item),
            ("remove all {} from {}", remove_all),
            ("replace all {} with {} in {}", replace_all),
            ("replace first {} with {} in {}", replace_first),
            ("replace last {} with {} in {}", replace_last),
            ("sort {}", sort),
            ("reverse {}", reverse),
            ("reversed {}", reversed),
            ("shuffle {}", shuffle),
            ("shuffled {}", shuffled),
            ("join {}", join),
            ("join {} using {}", join_using),
            ("(a) copy (of) {}", copy_of),
            ("(the) list of chars/characters (in/of) {}", list_of_characters),
            ("(the) list of words (in/of) {}", list_of_words),
            ("(the) list of lines (in/of) {}", list_of_lines),
            // Ranges.
            ("{} up to {}", up_to),
            ("(the) lower bound (in/of) {}", lower_bound),
            ("(the) upper bound (in/of) {}", upper_bound),
            ("{} is closed", is_closed),
            ("{} overlaps (with) {}", overlaps),
            // Math.
            ("(the) abs (of) {}", abs),
            ("(the) sqrt (of) {}", sqrt),
            ("(the) square root (of) {}", sqrt),
            ("(the) sin (of) {}", sin),
            ("(the) cos (of) {}", cos),
            ("(the) tan (of) {}", tan),
            ("(the) atan (of) {}", atan),
            ("(the) exp (of) {}", exp),
            ("(the) log (of) {}", log),
            ("(the) log2 (of) {}", log2),
            ("(the) log10 (of) {}", log10),
            ("(the) floor (of) {}", floor),
            ("(the) ceil (of) {}", ceil),
            ("round {}", round),
            ("trunc/truncate {}", trunc),
            ("(the) max/maximum (value) (of) {}", maximum),
            ("(the) min/minimum (value) (of) {}", minimum),
            ("(the) avg/average (value) (of) {}", average),
            ("(a) random number (in/of) {}", random_number),
            ("any item (in/of) {}", any_item),
            // Characters.
            ("(the) char/character (of) {}", character_of),
            ("(the) ord/ordinal (of) {}", ordinal_of),
            // Version.
            ("the language version", language_version),
            ("the language major version", language_major_version),
            ("the language minor version", language_minor_version),
            ("the language patch version", language_patch_version),
        ]);
        Self { signatures, values }
    }
}

impl Module for Core {
    fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

// ---- control and errors ----

fn quit(_context: &mut NativeCallContext) -> RunResult<Value> {
    std::process::exit(0);
}

fn quit_with(context: &mut NativeCallContext) -> RunResult<Value> {
    let code = integer_argument(context, 0)?;
    std::process::exit(i32::try_from(code).unwrap_or(1));
}

fn error_with(context: &mut NativeCallContext) -> RunResult<Value> {
    Err(context.error_value(context.argument(0).clone()))
}

fn the_error(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(context.vm.frame_error())
}

// ---- type tests and casts ----

fn is_integer(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(matches!(context.argument(0), Value::Integer(_))))
}

fn is_number(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(context.argument(0).is_number()))
}

fn is_boolean(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(matches!(context.argument(0), Value::Bool(_))))
}

fn is_string(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(context.argument(0).as_string_text().is_some()))
}

fn is_list(context: &mut NativeCallContext) -> RunResult<Value> {
    let is_list = context
        .argument(0)
        .as_object()
        .is_some_and(|object| object.as_list().is_some());
    Ok(Value::Bool(is_list))
}

fn is_dictionary(context: &mut NativeCallContext) -> RunResult<Value> {
    let is_dictionary = context
        .argument(0)
        .as_object()
        .is_some_and(|object| object.as_dictionary().is_some());
    Ok(Value::Bool(is_dictionary))
}

fn is_range(context: &mut NativeCallContext) -> RunResult<Value> {
    let is_range = context
        .argument(0)
        .as_object()
        .is_some_and(|object| object.as_range().is_some());
    Ok(Value::Bool(is_range))
}

fn as_integer(context: &mut NativeCallContext) -> RunResult<Value> {
    let value = context.argument(0);
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::Float(value) => Ok(Value::Integer(*value as i64)),
        Value::Bool(value) => Ok(Value::Integer(i64::from(*value))),
        _ => value
            .as_object()
            .and_then(|object| object.as_number_castable())
            .and_then(|castable| castable.cast_integer())
            .ok_or_else(|| {
                context.argument_error(
                    0,
                    format!("can't convert this {} to an integer", value.type_name()),
                )
            }),
    }
}

fn as_number(context: &mut NativeCallContext) -> RunResult<Value> {
    let value = context.argument(0);
    match value {
        Value::Integer(value) => Ok(Value::Float(*value as f64)),
        Value::Float(_) => Ok(value.clone()),
        _ => value
            .as_object()
            .and_then(|object| object.as_number_castable())
            .and_then(|castable| castable.cast_float())
            .ok_or_else(|| {
                context.argument_error(
                    0,
                    format!("can't convert this {} to a number", value.type_name()),
                )
            }),
    }
}

fn as_string(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(context.argument(0).to_text()))
}

fn type_name(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(context.argument(0).type_name()))
}

// ---- equality and membership ----

fn is_equal(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(context.argument(0).equals(context.argument(1))))
}

fn is_not_equal(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Bool(!context.argument(0).equals(context.argument(1))))
}

fn contains_impl(context: &NativeCallContext, container: usize, needle: usize) -> RunResult<Value> {
    let target = context.argument(container);
    let value = context.argument(needle);
    if let Some(text) = target.as_string_text() {
        let Some(needle_text) = value.as_string_text() else {
            return Err(context.argument_error(
                needle,
                format!("expected a string, got {}", value.type_name()),
            ));
        };
        return Ok(Value::Bool(text.contains(&needle_text)));
    }
    if let Some(object) = target.as_object() {
        if let Some(list) = object.as_list() {
            return Ok(Value::Bool(list.contains(value)));
        }
        if let Some(dictionary) = object.as_dictionary() {
            return Ok(Value::Bool(dictionary.contains_key(value)));
        }
        if let Some(range) = object.as_range() {
            let Some(index) = value.as_integer() else {
                return Err(context.argument_error(
                    needle,
                    format!("expected an integer, got {}", value.type_name()),
                ));
            };
            return Ok(Value::Bool(range.contains(index)));
        }
    }
    Err(context.argument_error(
        container,
        format!(
            "expected a string, list, dictionary, or range, got {}",
            target.type_name()
        ),
    ))
}

fn contains(context: &mut NativeCallContext) -> RunResult<Value> {
    contains_impl(context, 0, 1)
}

fn is_in(context: &mut NativeCallContext) -> RunResult<Value> {
    contains_impl(context, 1, 0)
}

fn starts_with(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(0);
    if let Some(text) = target.as_string_text() {
        let needle = string_argument(context, 1)?;
        return Ok(Value::Bool(text.starts_with(&needle)));
    }
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    Ok(Value::Bool(list.starts_with(context.argument(1))))
}

fn ends_with(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(0);
    if let Some(text) = target.as_string_text() {
        let needle = string_argument(context, 1)?;
        return Ok(Value::Bool(text.ends_with(&needle)));
    }
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    Ok(Value::Bool(list.ends_with(context.argument(1))))
}

fn offset_found(offset: Option<usize>) -> Value {
    match offset {
        Some(offset) => Value::Integer(offset as i64),
        None => Value::Empty,
    }
}

fn offset_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object() {
        if let Some(string) = object.as_str() {
            let needle = string_argument(context, 0)?;
            return Ok(offset_found(string.find_first(&needle)));
        }
        if let Some(list) = object.as_list() {
            return Ok(offset_found(list.find_first(context.argument(0))));
        }
    }
    Err(context.argument_error(
        1,
        format!("expected a string or list, got {}", target.type_name()),
    ))
}

fn last_offset_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object() {
        if let Some(string) = object.as_str() {
            let needle = string_argument(context, 0)?;
            return Ok(offset_found(string.find_last(&needle)));
        }
        if let Some(list) = object.as_list() {
            return Ok(offset_found(list.find_last(context.argument(0))));
        }
    }
    Err(context.argument_error(
        1,
        format!("expected a string or list, got {}", target.type_name()),
    ))
}

// ---- descriptions and hashing ----

fn description(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(context.argument(0).description()))
}

fn debug_description(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(
        context.argument(0).description().escape_default().to_string(),
    ))
}

fn hash_value(context: &mut NativeCallContext) -> RunResult<Value> {
    use std::hash::{Hash, Hasher};
    let mut hasher = ahash::AHasher::default();
    context.argument(0).hash(&mut hasher);
    Ok(Value::Integer(hasher.finish() as i64))
}

// ---- containers ----

fn empty_list(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(context.vm.new_list(Vec::new()))
}

fn empty_dictionary(context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(context.vm.new_dictionary(IndexMap::new()))
}

fn empty_string(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::string(""))
}

fn size_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let value = context.argument(0);
    if let Some(object) = value.as_object() {
        let size = match object.as_ref() {
            Object::String(string) => Some(string.length() as i64),
            Object::List(list) => Some(list.size() as i64),
            Object::Dictionary(dictionary) => Some(dictionary.size() as i64),
            Object::Range(range) => Some(range.size()),
            _ => None,
        };
        if let Some(size) = size {
            return Ok(Value::Integer(size));
        }
    }
    Err(context.argument_error(
        0,
        format!(
            "expected a string, list, dictionary, or range, got {}",
            value.type_name()
        ),
    ))
}

fn first_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    list.get(0)
        .ok_or_else(|| context.argument_error(0, "the list is empty"))
}

fn last_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    match list.size() {
        0 => Err(context.argument_error(0, "the list is empty")),
        size => Ok(list.get(size - 1).expect("non-empty list")),
    }
}

fn keys_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let dictionary = dictionary_argument(context, 0)?;
    let keys = dictionary
        .as_dictionary()
        .expect("checked dictionary argument")
        .keys();
    Ok(context.vm.new_list(keys))
}

fn values_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let dictionary = dictionary_argument(context, 0)?;
    let values = dictionary
        .as_dictionary()
        .expect("checked dictionary argument")
        .values();
    Ok(context.vm.new_list(values))
}

fn insert_at_beginning(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object()
        && let Some(string) = object.as_str()
    {
        let prefix = string_argument(context, 0)?;
        let text = string.text();
        string.set_text(prefix + &text);
        return Ok(target.clone());
    }
    let list = list_argument(context, 1)?;
    list.as_list()
        .expect("checked list argument")
        .insert(0, context.argument(0).clone());
    Ok(context.argument(1).clone())
}

fn insert_at_end(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object()
        && let Some(string) = object.as_str()
    {
        let suffix = string_argument(context, 0)?;
        string.push_str(&suffix);
        return Ok(target.clone());
    }
    let list = list_argument(context, 1)?;
    list.as_list()
        .expect("checked list argument")
        .push(context.argument(0).clone());
    Ok(context.argument(1).clone())
}

fn insert_at_index(context: &mut NativeCallContext) -> RunResult<Value> {
    let index = integer_argument(context, 1)?;
    let list = list_argument(context, 2)?;
    let list = list.as_list().expect("checked list argument");
    let size = list.size() as i64;
    let resolved = if index < 0 { size + index } else { index };
    if resolved < 0 || resolved > size {
        return Err(context.argument_error(1, format!("index {index} out of bounds")));
    }
    list.insert(resolved as usize, context.argument(0).clone());
    Ok(context.argument(2).clone())
}

fn insert_with_key(context: &mut NativeCallContext) -> RunResult<Value> {
    let dictionary = dictionary_argument(context, 2)?;
    dictionary
        .as_dictionary()
        .expect("checked dictionary argument")
        .insert(context.argument(1).clone(), context.argument(0).clone());
    Ok(context.argument(2).clone())
}

fn remove_first_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    if list.size() == 0 {
        return Err(context.argument_error(0, "the list is empty"));
    }
    Ok(list.remove(0))
}

fn remove_last_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    match list.size() {
        0 => Err(context.argument_error(0, "the list is empty")),
        size => Ok(list.remove(size - 1)),
    }
}

fn remove_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object() {
        if let Some(dictionary) = object.as_dictionary() {
            dictionary.remove(context.argument(0));
            return Ok(target.clone());
        }
        if let Some(list) = object.as_list() {
            let index = integer_argument(context, 0)?;
            let size = list.size() as i64;
            let resolved = if index < 0 { size + index } else { index };
            if resolved < 0 || resolved >= size {
                return Err(context.argument_error(0, format!("index {index} out of bounds")));
            }
            return Ok(list.remove(resolved as usize));
        }
    }
    Err(context.argument_error(
        1,
        format!("expected a list or dictionary, got {}", target.type_name()),
    ))
}

fn remove_all(context: &mut NativeCallContext) -> RunResult<Value> {
    let target = context.argument(1);
    if let Some(object) = target.as_object()
        && let Some(string) = object.as_str()
    {
        let needle = string_argument(context, 0)?;
        string.replace_all(&needle, "");
        return Ok(target.clone());
    }
    let list = list_argument(context, 1)?;
    list.as_list()
        .expect("checked list argument")
        .remove_all(context.argument(0));
    Ok(context.argument(1).clone())
}

fn replace_impl(
    context: &NativeCallContext,
    which: fn(&Str, &str, &str),
    which_list: fn(&crate::objects::List, &Value, &Value),
) -> RunResult<Value> {
    let target = context.argument(2);
    if let Some(object) = target.as_object() {
        if let Some(string) = object.as_str() {
            let needle = string_argument(context, 0)?;
            let replacement = string_argument(context, 1)?;
            which(string, &needle, &replacement);
            return Ok(target.clone());
        }
        if let Some(list) = object.as_list() {
            which_list(list, context.argument(0), context.argument(1));
            return Ok(target.clone());
        }
    }
    Err(context.argument_error(
        2,
        format!("expected a string or list, got {}", target.type_name()),
    ))
}

fn replace_all(context: &mut NativeCallContext) -> RunResult<Value> {
    replace_impl(context, Str::replace_all, crate::objects::List::replace_all)
}

fn replace_first(context: &mut NativeCallContext) -> RunResult<Value> {
    replace_impl(context, Str::replace_first, crate::objects::List::replace_first)
}

fn replace_last(context: &mut NativeCallContext) -> RunResult<Value> {
    replace_impl(context, Str::replace_last, crate::objects::List::replace_last)
}

fn sort(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    list.as_list().expect("checked list argument").sort();
    Ok(context.argument(0).clone())
}

fn reverse(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    list.as_list().expect("checked list argument").reverse();
    Ok(context.argument(0).clone())
}

fn reversed(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let mut values = list.as_list().expect("checked list argument").values();
    values.reverse();
    Ok(context.vm.new_list(values))
}

fn shuffle(context: &mut NativeCallContext) -> RunResult<Value> {
    use rand::seq::SliceRandom;
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    let mut values = list.values();
    values.shuffle(&mut rand::thread_rng());
    list.set_values(values);
    Ok(context.argument(0).clone())
}

fn shuffled(context: &mut NativeCallContext) -> RunResult<Value> {
    use rand::seq::SliceRandom;
    let list = list_argument(context, 0)?;
    let mut values = list.as_list().expect("checked list argument").values();
    values.shuffle(&mut rand::thread_rng());
    Ok(context.vm.new_list(values))
}

fn join(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let joined: String = list
        .as_list()
        .expect("checked list argument")
        .values()
        .iter()
        .map(Value::to_text)
        .collect();
    Ok(Value::string(joined))
}

fn join_using(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let separator = string_argument(context, 1)?;
    let rendered: Vec<String> = list
        .as_list()
        .expect("checked list argument")
        .values()
        .iter()
        .map(Value::to_text)
        .collect();
    Ok(Value::string(rendered.join(&separator)))
}

fn copy_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let value = context.argument(0);
    match value.as_object().and_then(|object| object.as_copyable()) {
        Some(copyable) => {
            let copy = Value::object(copyable.copy());
            context.vm.track(&copy);
            Ok(copy)
        }
        None => Ok(value.clone()),
    }
}

fn list_of_characters(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = string_argument(context, 0)?;
    let values = text
        .chars()
        .map(|c| Value::string(c.to_string()))
        .collect();
    Ok(context.vm.new_list(values))
}

fn list_of_words(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = string_argument(context, 0)?;
    let values = text.split_whitespace().map(Value::string).collect();
    Ok(context.vm.new_list(values))
}

fn list_of_lines(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = string_argument(context, 0)?;
    let values = text.lines().map(Value::string).collect();
    Ok(context.vm.new_list(values))
}

// ---- ranges ----

fn up_to(context: &mut NativeCallContext) -> RunResult<Value> {
    let start = integer_argument(context, 0)?;
    let end = integer_argument(context, 1)?;
    if end < start {
        return Err(context.argument_error(1, "range end must not be less than its start"));
    }
    Ok(Value::object(Object::Range(Range::new(start, end, true))))
}

fn lower_bound(context: &mut NativeCallContext) -> RunResult<Value> {
    let range = range_argument(context, 0)?;
    Ok(Value::Integer(range.as_range().expect("checked range").start()))
}

fn upper_bound(context: &mut NativeCallContext) -> RunResult<Value> {
    let range = range_argument(context, 0)?;
    Ok(Value::Integer(range.as_range().expect("checked range").end()))
}

fn is_closed(context: &mut NativeCallContext) -> RunResult<Value> {
    let range = range_argument(context, 0)?;
    Ok(Value::Bool(range.as_range().expect("checked range").closed()))
}

fn overlaps(context: &mut NativeCallContext) -> RunResult<Value> {
    let lhs = range_argument(context, 0)?;
    let rhs = range_argument(context, 1)?;
    Ok(Value::Bool(
        lhs.as_range()
            .expect("checked range")
            .overlaps(rhs.as_range().expect("checked range")),
    ))
}

// ---- math ----

fn abs(context: &mut NativeCallContext) -> RunResult<Value> {
    match context.argument(0) {
        Value::Integer(value) => Ok(Value::Integer(value.wrapping_abs())),
        Value::Float(value) => Ok(Value::Float(value.abs())),
        value => Err(context.argument_error(
            0,
            format!("expected a number, got {}", value.type_name()),
        )),
    }
}

fn float_math(context: &mut NativeCallContext, f: fn(f64) -> f64) -> RunResult<Value> {
    let value = number_argument(context, 0)?;
    Ok(Value::Float(f(value)))
}

fn sqrt(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::sqrt)
}

fn sin(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::sin)
}

fn cos(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::cos)
}

fn tan(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::tan)
}

fn atan(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::atan)
}

fn exp(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::exp)
}

fn log(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::ln)
}

fn log2(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::log2)
}

fn log10(context: &mut NativeCallContext) -> RunResult<Value> {
    float_math(context, f64::log10)
}

fn integer_math(context: &mut NativeCallContext, f: fn(f64) -> f64) -> RunResult<Value> {
    match context.argument(0) {
        Value::Integer(value) => Ok(Value::Integer(*value)),
        Value::Float(value) => Ok(Value::Integer(f(*value) as i64)),
        value => Err(context.argument_error(
            0,
            format!("expected a number, got {}", value.type_name()),
        )),
    }
}

fn floor(context: &mut NativeCallContext) -> RunResult<Value> {
    integer_math(context, f64::floor)
}

fn ceil(context: &mut NativeCallContext) -> RunResult<Value> {
    integer_math(context, f64::ceil)
}

fn round(context: &mut NativeCallContext) -> RunResult<Value> {
    integer_math(context, f64::round)
}

fn trunc(context: &mut NativeCallContext) -> RunResult<Value> {
    integer_math(context, f64::trunc)
}

fn numbers_argument(context: &NativeCallContext, index: usize) -> RunResult<Vec<Value>> {
    let list = list_argument(context, index)?;
    let values = list.as_list().expect("checked list argument").values();
    if values.is_empty() {
        return Err(context.argument_error(index, "the list is empty"));
    }
    for value in &values {
        if !value.is_number() {
            return Err(context.argument_error(
                index,
                format!("expected a list of numbers, got a {}", value.type_name()),
            ));
        }
    }
    Ok(values)
}

fn maximum(context: &mut NativeCallContext) -> RunResult<Value> {
    let values = numbers_argument(context, 0)?;
    Ok(values
        .into_iter()
        .max_by(|lhs, rhs| lhs.compare(rhs))
        .expect("non-empty list"))
}

fn minimum(context: &mut NativeCallContext) -> RunResult<Value> {
    let values = numbers_argument(context, 0)?;
    Ok(values
        .into_iter()
        .min_by(|lhs, rhs| lhs.compare(rhs))
        .expect("non-empty list"))
}

fn average(context: &mut NativeCallContext) -> RunResult<Value> {
    let values = numbers_argument(context, 0)?;
    let total: f64 = values
        .iter()
        .map(|value| value.number_as_float().expect("checked numbers"))
        .sum();
    Ok(Value::Float(total / values.len() as f64))
}

fn random_number(context: &mut NativeCallContext) -> RunResult<Value> {
    let value = context.argument(0);
    if let Some(bound) = value.as_integer() {
        if bound <= 0 {
            return Err(context.argument_error(0, "expected a positive integer"));
        }
        return Ok(Value::Integer(rand::thread_rng().gen_range(0..bound)));
    }
    let range = range_argument(context, 0)?;
    let range = range.as_range().expect("checked range");
    if range.size() == 0 {
        return Err(context.argument_error(0, "the range is empty"));
    }
    let offset = rand::thread_rng().gen_range(0..range.size());
    Ok(Value::Integer(range.start() + offset))
}

fn any_item(context: &mut NativeCallContext) -> RunResult<Value> {
    let list = list_argument(context, 0)?;
    let list = list.as_list().expect("checked list argument");
    if list.size() == 0 {
        return Err(context.argument_error(0, "the list is empty"));
    }
    let index = rand::thread_rng().gen_range(0..list.size());
    Ok(list.get(index).expect("index is in bounds"))
}

// ---- characters ----

fn character_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let code = integer_argument(context, 0)?;
    let c = u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| context.argument_error(0, format!("{code} is not a character code")))?;
    Ok(Value::string(c.to_string()))
}

fn ordinal_of(context: &mut NativeCallContext) -> RunResult<Value> {
    let text = string_argument(context, 0)?;
    match text.chars().next() {
        Some(c) if text.chars().count() == 1 => Ok(Value::Integer(i64::from(u32::from(c)))),
        _ => Err(context.argument_error(0, "expected a single character")),
    }
}

// ---- version ----

fn language_version(_context: &mut NativeCallContext) -> RunResult<Value> {
    let (major, minor, patch) = LANGUAGE_VERSION;
    Ok(Value::string(format!("{major}.{minor}.{patch}")))
}

fn language_major_version(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Integer(LANGUAGE_VERSION.0))
}

fn language_minor_version(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Integer(LANGUAGE_VERSION.1))
}

fn language_patch_version(_context: &mut NativeCallContext) -> RunResult<Value> {
    Ok(Value::Integer(LANGUAGE_VERSION.2))
}

//! The value type.
//!
//! A value is either an immediate (integer, float, bool, empty) or a shared
//! handle to a heap [`Object`]. Values copy cheaply; object handles are
//! reference-counted and shared.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use ahash::AHashSet;

use crate::{
    object::Object,
    objects::{List, Str},
};

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Bool(bool),
    Object(Rc<Object>),
}

impl Value {
    /// Allocates a new string object.
    #[must_use]
    pub fn string(text: impl Into<String>) -> Self {
        Self::Object(Rc::new(Object::String(Str::new(text.into()))))
    }

    /// Allocates a new list object. The caller is responsible for
    /// registering it with the virtual machine's cycle tracker when it can
    /// participate in cycles.
    #[must_use]
    pub fn list(values: Vec<Self>) -> Self {
        Self::Object(Rc::new(Object::List(List::new(values))))
    }

    #[must_use]
    pub fn object(object: Object) -> Self {
        Self::Object(Rc::new(object))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Both integers and floats, widened to `f64`.
    #[must_use]
    pub fn number_as_float(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Rc<Object>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The text of a string object, if this value is one.
    #[must_use]
    pub fn as_string_text(&self) -> Option<String> {
        self.as_object()
            .and_then(|object| object.as_str())
            .map(Str::text)
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Object(object) => object.type_name(),
        }
    }

    /// The display form: empty renders as nothing, strings render raw.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::Bool(value) => value.to_string(),
            Self::Object(object) => object.to_text(),
        }
    }

    /// The inspect form: empty renders as `empty`, strings render quoted.
    #[must_use]
    pub fn description(&self) -> String {
        let mut visited = AHashSet::new();
        self.description_guarded(&mut visited)
    }

    pub(crate) fn description_guarded(&self, visited: &mut AHashSet<usize>) -> String {
        match self {
            Self::Empty => "empty".to_string(),
            Self::Object(object) => object.description_guarded(visited),
            _ => self.to_text(),
        }
    }

    /// Structural equality: same variant, same content. Object handles to
    /// the same allocation are trivially equal; otherwise objects compare
    /// structurally with a cycle guard.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        let mut visited = Vec::new();
        self.equals_guarded(other, &mut visited)
    }

    pub(crate) fn equals_guarded(&self, other: &Self, visited: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Integer(lhs), Self::Integer(rhs)) => lhs == rhs,
            (Self::Float(lhs), Self::Float(rhs)) => lhs == rhs,
            (Self::Bool(lhs), Self::Bool(rhs)) => lhs == rhs,
            (Self::Object(lhs), Self::Object(rhs)) => {
                Rc::ptr_eq(lhs, rhs) || lhs.equals_guarded(rhs, visited)
            }
            _ => false,
        }
    }

    /// Total ordering used by `sort`: numbers numerically, everything else
    /// by display text.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        if let (Some(lhs), Some(rhs)) = (self.number_as_float(), other.number_as_float()) {
            return lhs.partial_cmp(&rhs).unwrap_or(Ordering::Equal);
        }
        self.to_text().cmp(&other.to_text())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

// NaN keys break reflexivity, as they do in most dynamic languages; such
// keys are simply unfindable in a dictionary.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Empty => state.write_u8(0),
            Self::Integer(value) => {
                state.write_u8(1);
                value.hash(state);
            }
            Self::Float(value) => {
                state.write_u8(2);
                // Normalize -0.0 so equal floats hash equally.
                let value = if *value == 0.0 { 0.0 } else { *value };
                value.to_bits().hash(state);
            }
            Self::Bool(value) => {
                state.write_u8(3);
                value.hash(state);
            }
            Self::Object(object) => {
                state.write_u8(4);
                object.hash_into(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Formats a float the way the language prints numbers: integral values
/// render without a fractional part, everything else uses the shortest
/// round-trip representation.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == value.trunc() && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    ryu::Buffer::new().format(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Range;

    #[test]
    fn equality_requires_the_same_variant() {
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::Empty, Value::Integer(0));
        assert_ne!(Value::Empty, Value::Bool(false));
        assert_ne!(Value::Empty, Value::string(""));
        assert_eq!(Value::string("a"), Value::string("a"));
    }

    #[test]
    fn cyclic_lists_compare_without_diverging() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        let a_list = a.as_object().unwrap().as_list().unwrap();
        let b_list = b.as_object().unwrap().as_list().unwrap();
        a_list.push(b.clone());
        b_list.push(a.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn descriptions() {
        assert_eq!(Value::Integer(3).description(), "3");
        assert_eq!(Value::Float(19.0).description(), "19");
        assert_eq!(Value::Float(2.5).description(), "2.5");
        assert_eq!(Value::string("hi").description(), "\"hi\"");
        assert_eq!(Value::string("hi").to_text(), "hi");
        assert_eq!(Value::Empty.description(), "empty");
        assert_eq!(Value::Empty.to_text(), "");
        assert_eq!(
            Value::object(Object::Range(Range::new(1, 5, true))).to_text(),
            "1...5"
        );
        assert_eq!(
            Value::list(vec![Value::Integer(1), Value::string("x")]).to_text(),
            "[1, \"x\"]"
        );
    }

    #[test]
    fn cyclic_descriptions_mark_the_cycle() {
        let a = Value::list(vec![Value::Integer(1)]);
        a.as_object().unwrap().as_list().unwrap().push(a.clone());
        assert_eq!(a.to_text(), "[1, [...]]");
    }

    #[test]
    fn hashing_is_stable_across_equal_values() {
        fn hash_of(value: &Value) -> u64 {
            let mut hasher = ahash::AHasher::default();
            value.hash(&mut hasher);
            hasher.finish()
        }
        assert_eq!(hash_of(&Value::string("a")), hash_of(&Value::string("a")));
        assert_eq!(hash_of(&Value::Float(0.0)), hash_of(&Value::Float(-0.0)));
        assert_ne!(hash_of(&Value::Integer(1)), hash_of(&Value::Float(1.0)));
    }
}

//! The heap object sum type.
//!
//! Every heap-allocated runtime entity is one of these variants. Shared
//! behavior (naming, description, equality, hashing, tracing) dispatches
//! here; capability-specific behavior goes through the accessors returning
//! the protocol traits.

use std::{
    hash::{Hash, Hasher},
    rc::Rc,
};

use ahash::AHashSet;

use crate::{
    objects::{Dictionary, Enumerator, Function, List, Native, Range, Str},
    protocols::{Copyable, Enumerable, NumberCastable, Subscriptable},
    value::Value,
};

#[derive(Debug)]
pub enum Object {
    String(Str),
    List(List),
    Dictionary(Dictionary),
    Range(Range),
    Function(Function),
    Native(Native),
    Enumerator(Enumerator),
}

impl Object {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Dictionary(_) => "dictionary",
            Self::Range(_) => "range",
            Self::Function(_) => "function",
            Self::Native(_) => "native",
            Self::Enumerator(_) => "enumerator",
        }
    }

    /// The display form: strings render without quotes.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::String(string) => string.text(),
            _ => self.description(),
        }
    }

    /// The inspect form: strings render quoted, containers recurse with a
    /// `[...]` marker at cycles.
    #[must_use]
    pub fn description(&self) -> String {
        let mut visited = AHashSet::new();
        self.description_guarded(&mut visited)
    }

    pub(crate) fn description_guarded(&self, visited: &mut AHashSet<usize>) -> String {
        match self {
            Self::String(string) => format!("\"{}\"", string.text()),
            Self::List(list) => {
                let key = std::ptr::from_ref(self) as usize;
                if !visited.insert(key) {
                    return "[...]".to_string();
                }
                let rendered: Vec<String> = list
                    .values()
                    .iter()
                    .map(|value| value.description_guarded(visited))
                    .collect();
                visited.remove(&key);
                format!("[{}]", rendered.join(", "))
            }
            Self::Dictionary(dictionary) => {
                let key = std::ptr::from_ref(self) as usize;
                if !visited.insert(key) {
                    return "[...]".to_string();
                }
                if dictionary.size() == 0 {
                    visited.remove(&key);
                    return "[:]".to_string();
                }
                let rendered: Vec<String> = dictionary
                    .entries()
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}: {}",
                            k.description_guarded(visited),
                            v.description_guarded(visited)
                        )
                    })
                    .collect();
                visited.remove(&key);
                format!("[{}]", rendered.join(", "))
            }
            Self::Range(range) => format!(
                "{}{}{}",
                range.start(),
                if range.closed() { "..." } else { "..<" },
                range.end()
            ),
            Self::Function(function) => function.signature.name(),
            Self::Native(_) => "native function".to_string(),
            Self::Enumerator(enumerator) => format!("E({})", enumerator.source_type_name()),
        }
    }

    /// Structural equality. `visited` holds pointer pairs already being
    /// compared, so that cyclic containers terminate.
    pub(crate) fn equals_guarded(&self, other: &Self, visited: &mut Vec<(usize, usize)>) -> bool {
        let pair = (
            std::ptr::from_ref(self) as usize,
            std::ptr::from_ref(other) as usize,
        );
        if visited.contains(&pair) {
            return true;
        }
        match (self, other) {
            (Self::String(lhs), Self::String(rhs)) => lhs.text() == rhs.text(),
            (Self::List(lhs), Self::List(rhs)) => {
                if lhs.size() != rhs.size() {
                    return false;
                }
                visited.push(pair);
                let equal = lhs
                    .values()
                    .iter()
                    .zip(rhs.values().iter())
                    .all(|(a, b)| a.equals_guarded(b, visited));
                visited.pop();
                equal
            }
            (Self::Dictionary(lhs), Self::Dictionary(rhs)) => {
                if lhs.size() != rhs.size() {
                    return false;
                }
                visited.push(pair);
                let equal = lhs.entries().iter().all(|(key, value)| {
                    rhs.get(key)
                        .is_some_and(|rhs_value| value.equals_guarded(&rhs_value, visited))
                });
                visited.pop();
                equal
            }
            (Self::Range(lhs), Self::Range(rhs)) => lhs == rhs,
            (Self::Function(lhs), Self::Function(rhs)) => {
                lhs.signature == rhs.signature && Rc::ptr_eq(&lhs.bytecode, &rhs.bytecode)
            }
            _ => false,
        }
    }

    pub(crate) fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::String(string) => string.text().hash(state),
            Self::List(list) => {
                state.write_usize(list.size());
                for value in list.values() {
                    value.hash(state);
                }
            }
            Self::Dictionary(dictionary) => {
                // Order-independent: combine per-entry hashes commutatively.
                state.write_usize(dictionary.size());
                let mut combined: u64 = 0;
                for (key, value) in dictionary.entries() {
                    let mut entry_state = ahash::AHasher::default();
                    key.hash(&mut entry_state);
                    value.hash(&mut entry_state);
                    combined = combined.wrapping_add(entry_state.finish());
                }
                state.write_u64(combined);
            }
            Self::Range(range) => range.hash(state),
            Self::Function(function) => function.signature.name().hash(state),
            Self::Native(_) | Self::Enumerator(_) => {
                (std::ptr::from_ref(self) as usize).hash(state);
            }
        }
    }

    /// Visits directly referenced heap objects. Used by the garbage
    /// collector's mark phase.
    pub fn trace(&self, f: &mut dyn FnMut(&Rc<Self>)) {
        match self {
            Self::List(list) => list.with_values(|values| {
                for value in values {
                    if let Value::Object(object) = value {
                        f(object);
                    }
                }
            }),
            Self::Dictionary(dictionary) => {
                for (key, value) in dictionary.entries() {
                    if let Value::Object(object) = &key {
                        f(object);
                    }
                    if let Value::Object(object) = &value {
                        f(object);
                    }
                }
            }
            Self::Enumerator(enumerator) => {
                if let Some(source) = enumerator.source() {
                    f(&source);
                }
            }
            _ => {}
        }
    }

    /// Drops all outgoing references, letting reference counts finalize a
    /// cycle the collector found unreachable.
    pub fn release_children(&self) {
        match self {
            Self::List(list) => list.clear(),
            Self::Dictionary(dictionary) => dictionary.clear(),
            _ => {}
        }
    }

    /// Whether this object participates in cycle tracking.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Dictionary(_))
    }

    #[must_use]
    pub fn as_enumerable(&self) -> Option<&dyn Enumerable> {
        match self {
            Self::String(string) => Some(string),
            Self::List(list) => Some(list),
            Self::Dictionary(dictionary) => Some(dictionary),
            Self::Range(range) => Some(range),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_subscriptable(&self) -> Option<&dyn Subscriptable> {
        match self {
            Self::String(string) => Some(string),
            Self::List(list) => Some(list),
            Self::Dictionary(dictionary) => Some(dictionary),
            Self::Range(range) => Some(range),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_copyable(&self) -> Option<&dyn Copyable> {
        match self {
            Self::String(string) => Some(string),
            Self::List(list) => Some(list),
            Self::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number_castable(&self) -> Option<&dyn NumberCastable> {
        match self {
            Self::String(string) => Some(string),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&Str> {
        match self {
            Self::String(string) => Some(string),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_range(&self) -> Option<&Range> {
        match self {
            Self::Range(range) => Some(range),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(function) => Some(function),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_native(&self) -> Option<&Native> {
        match self {
            Self::Native(native) => Some(native),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enumerator(&self) -> Option<&Enumerator> {
        match self {
            Self::Enumerator(enumerator) => Some(enumerator),
            _ => None,
        }
    }
}

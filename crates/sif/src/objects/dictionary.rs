//! The mutable keyed dictionary object.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{
    object::Object,
    objects::enumerator::Enumerator,
    protocols::{Copyable, Enumerable, Subscriptable},
    value::Value,
};

/// A map from hashable values to values. Iteration order is an
/// implementation detail and is not part of the language.
#[derive(Debug, Default)]
pub struct Dictionary {
    values: RefCell<IndexMap<Value, Value>>,
}

impl Dictionary {
    #[must_use]
    pub fn new(values: IndexMap<Value, Value>) -> Self {
        Self {
            values: RefCell::new(values),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: Value, value: Value) {
        self.values.borrow_mut().insert(key, value);
    }

    /// Removes a key, reporting whether it was present.
    pub fn remove(&self, key: &Value) -> bool {
        self.values.borrow_mut().shift_remove(key).is_some()
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.values.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.values.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.values.borrow().values().cloned().collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.values
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<(Value, Value)> {
        self.values
            .borrow()
            .get_index(index)
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }
}

impl Enumerable for Dictionary {
    fn enumerator(&self, this: &Rc<Object>) -> Enumerator {
        Enumerator::over_dictionary(Rc::clone(this))
    }
}

impl Subscriptable for Dictionary {
    fn subscript(&self, key: &Value) -> Result<Value, String> {
        // A missing key reads as empty.
        Ok(self.get(key).unwrap_or_default())
    }

    fn set_subscript(&self, key: &Value, value: Value) -> Result<(), String> {
        self.insert(key.clone(), value);
        Ok(())
    }
}

impl Copyable for Dictionary {
    fn copy(&self) -> Object {
        Object::Dictionary(Self::new(self.values.borrow().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_key_by_equality() {
        let dictionary = Dictionary::default();
        dictionary.insert(Value::string("a"), Value::Integer(1));
        dictionary.insert(Value::string("a"), Value::Integer(2));
        dictionary.insert(Value::Integer(3), Value::Integer(3));
        assert_eq!(dictionary.size(), 2);
        assert_eq!(dictionary.get(&Value::string("a")), Some(Value::Integer(2)));
    }

    #[test]
    fn missing_keys_read_as_empty() {
        let dictionary = Dictionary::default();
        assert_eq!(
            dictionary.subscript(&Value::Integer(1)).unwrap(),
            Value::Empty
        );
    }
}

//! The mutable ordered list object.

use std::{cell::RefCell, rc::Rc};

use crate::{
    object::Object,
    objects::enumerator::Enumerator,
    protocols::{Copyable, Enumerable, Subscriptable},
    value::Value,
};

#[derive(Debug, Default)]
pub struct List {
    values: RefCell<Vec<Value>>,
}

impl List {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: RefCell::new(values),
        }
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.values.borrow().clone()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.values.borrow_mut().push(value);
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.values.borrow_mut().insert(index, value);
    }

    pub fn remove(&self, index: usize) -> Value {
        self.values.borrow_mut().remove(index)
    }

    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.values.borrow().iter().any(|v| v == value)
    }

    #[must_use]
    pub fn starts_with(&self, value: &Value) -> bool {
        self.values.borrow().first().is_some_and(|v| v == value)
    }

    #[must_use]
    pub fn ends_with(&self, value: &Value) -> bool {
        self.values.borrow().last().is_some_and(|v| v == value)
    }

    #[must_use]
    pub fn find_first(&self, value: &Value) -> Option<usize> {
        self.values.borrow().iter().position(|v| v == value)
    }

    #[must_use]
    pub fn find_last(&self, value: &Value) -> Option<usize> {
        self.values.borrow().iter().rposition(|v| v == value)
    }

    pub fn replace_all(&self, search: &Value, replacement: &Value) {
        for value in self.values.borrow_mut().iter_mut() {
            if value == search {
                *value = replacement.clone();
            }
        }
    }

    pub fn replace_first(&self, search: &Value, replacement: &Value) {
        if let Some(index) = self.find_first(search) {
            self.values.borrow_mut()[index] = replacement.clone();
        }
    }

    pub fn replace_last(&self, search: &Value, replacement: &Value) {
        if let Some(index) = self.find_last(search) {
            self.values.borrow_mut()[index] = replacement.clone();
        }
    }

    pub fn remove_all(&self, value: &Value) {
        self.values.borrow_mut().retain(|v| v != value);
    }

    pub fn sort(&self) {
        self.values.borrow_mut().sort_by(Value::compare);
    }

    pub fn reverse(&self) {
        self.values.borrow_mut().reverse();
    }

    /// Runs `f` over the stored values without cloning the vector.
    pub fn with_values<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        f(&self.values.borrow())
    }

    pub fn set_values(&self, values: Vec<Value>) {
        *self.values.borrow_mut() = values;
    }

    fn resolve_index(&self, index: i64) -> Result<usize, String> {
        let size = self.size() as i64;
        let resolved = if index < 0 { size + index } else { index };
        if resolved < 0 || resolved >= size {
            return Err(format!("index {index} out of bounds"));
        }
        Ok(resolved as usize)
    }
}

impl Enumerable for List {
    fn enumerator(&self, this: &Rc<Object>) -> Enumerator {
        Enumerator::over_list(Rc::clone(this))
    }
}

impl Subscriptable for List {
    fn subscript(&self, key: &Value) -> Result<Value, String> {
        if let Value::Integer(index) = key {
            let resolved = self.resolve_index(*index)?;
            return Ok(self.values.borrow()[resolved].clone());
        }
        if let Some(range) = key.as_object().and_then(|object| object.as_range()) {
            let values = self.values.borrow();
            let size = values.len() as i64;
            let start = range.start().clamp(0, size) as usize;
            let end = (range.end() + i64::from(range.closed())).clamp(start as i64, size) as usize;
            return Ok(Value::object(Object::List(Self::new(
                values[start..end].to_vec(),
            ))));
        }
        Err(format!("expected an integer or range, got {}", key.type_name()))
    }

    fn set_subscript(&self, key: &Value, value: Value) -> Result<(), String> {
        let Value::Integer(index) = key else {
            return Err(format!("expected an integer, got {}", key.type_name()));
        };
        let resolved = self.resolve_index(*index)?;
        self.values.borrow_mut()[resolved] = value;
        Ok(())
    }
}

impl Copyable for List {
    fn copy(&self) -> Object {
        Object::List(Self::new(self.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscript_supports_negative_indices_and_ranges() {
        let list = List::new(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(
            list.subscript(&Value::Integer(-1)).unwrap(),
            Value::Integer(3)
        );
        assert!(list.subscript(&Value::Integer(3)).is_err());

        let range = Value::object(Object::Range(crate::objects::range::Range::new(0, 2, false)));
        let slice = list.subscript(&range).unwrap();
        assert_eq!(slice.to_text(), "[1, 2]");
    }

    #[test]
    fn replace_and_find() {
        let list = List::new(vec![Value::Integer(1), Value::Integer(2), Value::Integer(1)]);
        assert_eq!(list.find_first(&Value::Integer(1)), Some(0));
        assert_eq!(list.find_last(&Value::Integer(1)), Some(2));
        list.replace_last(&Value::Integer(1), &Value::Integer(9));
        assert_eq!(list.values()[2], Value::Integer(9));
        list.replace_all(&Value::Integer(1), &Value::Integer(0));
        assert_eq!(list.values()[0], Value::Integer(0));
    }
}

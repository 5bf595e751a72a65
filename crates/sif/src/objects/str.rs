//! The mutable string object.

use std::{cell::RefCell, rc::Rc};

use crate::{
    object::Object,
    objects::{enumerator::Enumerator, range::Range},
    protocols::{Copyable, Enumerable, NumberCastable, Subscriptable},
    value::Value,
};

/// A mutable UTF-8 string. Enumeration and indexing are by code point;
/// negative indices count from the end.
#[derive(Debug)]
pub struct Str {
    text: RefCell<String>,
}

impl Str {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RefCell::new(text.into()),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn set_text(&self, text: String) {
        *self.text.borrow_mut() = text;
    }

    /// Length in code points.
    #[must_use]
    pub fn length(&self) -> usize {
        self.text.borrow().chars().count()
    }

    pub fn push_str(&self, suffix: &str) {
        self.text.borrow_mut().push_str(suffix);
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.text.borrow().contains(needle)
    }

    #[must_use]
    pub fn starts_with(&self, needle: &str) -> bool {
        self.text.borrow().starts_with(needle)
    }

    #[must_use]
    pub fn ends_with(&self, needle: &str) -> bool {
        self.text.borrow().ends_with(needle)
    }

    /// Code-point offset of the first occurrence of `needle`.
    #[must_use]
    pub fn find_first(&self, needle: &str) -> Option<usize> {
        let text = self.text.borrow();
        let byte_offset = text.find(needle)?;
        Some(text[..byte_offset].chars().count())
    }

    /// Code-point offset of the last occurrence of `needle`.
    #[must_use]
    pub fn find_last(&self, needle: &str) -> Option<usize> {
        let text = self.text.borrow();
        let byte_offset = text.rfind(needle)?;
        Some(text[..byte_offset].chars().count())
    }

    pub fn replace_all(&self, needle: &str, replacement: &str) {
        let replaced = self.text.borrow().replace(needle, replacement);
        *self.text.borrow_mut() = replaced;
    }

    pub fn replace_first(&self, needle: &str, replacement: &str) {
        let replaced = self.text.borrow().replacen(needle, replacement, 1);
        *self.text.borrow_mut() = replaced;
    }

    pub fn replace_last(&self, needle: &str, replacement: &str) {
        let mut text = self.text.borrow_mut();
        if let Some(offset) = text.rfind(needle) {
            text.replace_range(offset..offset + needle.len(), replacement);
        }
    }

    /// Resolves a possibly-negative code-point index against the length.
    fn resolve_index(&self, index: i64) -> Result<usize, String> {
        let length = self.length() as i64;
        let resolved = if index < 0 { length + index } else { index };
        if resolved < 0 || resolved >= length {
            return Err(format!("index {index} out of bounds"));
        }
        Ok(resolved as usize)
    }

    /// Byte offset of the code point at `index`, clamping to the ends.
    fn byte_offset(text: &str, index: i64) -> usize {
        if index <= 0 {
            return 0;
        }
        text.char_indices()
            .nth(index as usize)
            .map_or(text.len(), |(offset, _)| offset)
    }
}

impl Enumerable for Str {
    fn enumerator(&self, this: &Rc<Object>) -> Enumerator {
        Enumerator::over_string(Rc::clone(this))
    }
}

impl Subscriptable for Str {
    fn subscript(&self, key: &Value) -> Result<Value, String> {
        if let Value::Integer(index) = key {
            let resolved = self.resolve_index(*index)?;
            let text = self.text.borrow();
            let c = text.chars().nth(resolved).expect("index was bounds-checked");
            return Ok(Value::string(c.to_string()));
        }
        if let Some(range) = key.as_object().and_then(|object| object.as_range()) {
            let text = self.text.borrow();
            let start = Self::byte_offset(&text, range.start());
            let end = Self::byte_offset(&text, range.end() + i64::from(range.closed()));
            let end = end.max(start);
            return Ok(Value::string(text[start..end].to_string()));
        }
        Err(format!("expected an integer or range, got {}", key.type_name()))
    }

    fn set_subscript(&self, key: &Value, value: Value) -> Result<(), String> {
        let replacement = value.to_text();
        if let Value::Integer(index) = key {
            let resolved = self.resolve_index(*index)?;
            let mut text = self.text.borrow_mut();
            let start = Self::byte_offset(&text, resolved as i64);
            let end = Self::byte_offset(&text, resolved as i64 + 1);
            text.replace_range(start..end, &replacement);
            return Ok(());
        }
        if let Some(range) = key.as_object().and_then(|object| object.as_range()) {
            let mut text = self.text.borrow_mut();
            let start = Self::byte_offset(&text, range.start());
            let end = Self::byte_offset(&text, range.end() + i64::from(range.closed()));
            let end = end.max(start);
            text.replace_range(start..end, &replacement);
            return Ok(());
        }
        Err(format!("expected an integer or range, got {}", key.type_name()))
    }
}

impl Copyable for Str {
    fn copy(&self) -> Object {
        Object::String(Self::new(self.text()))
    }
}

impl NumberCastable for Str {
    fn cast_integer(&self) -> Option<Value> {
        self.text.borrow().trim().parse::<i64>().ok().map(Value::Integer)
    }

    fn cast_float(&self) -> Option<Value> {
        self.text.borrow().trim().parse::<f64>().ok().map(Value::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indices_count_from_the_end() {
        let s = Str::new("hello");
        assert_eq!(s.subscript(&Value::Integer(-1)).unwrap().to_text(), "o");
        assert_eq!(s.subscript(&Value::Integer(0)).unwrap().to_text(), "h");
        assert!(s.subscript(&Value::Integer(5)).is_err());
        assert!(s.subscript(&Value::Integer(-6)).is_err());
    }

    #[test]
    fn range_subscript_slices_code_points() {
        let s = Str::new("héllo");
        let range = Value::object(Object::Range(Range::new(1, 3, true)));
        assert_eq!(s.subscript(&range).unwrap().to_text(), "éll");
    }

    #[test]
    fn replace_last_only_touches_the_final_match() {
        let s = Str::new("a-b-a");
        s.replace_last("a", "c");
        assert_eq!(s.text(), "a-b-c");
    }

    #[test]
    fn cast_parses_numbers() {
        assert_eq!(
            Str::new(" 42 ").cast_integer().unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            Str::new("2.5").cast_float().unwrap(),
            Value::Float(2.5)
        );
        assert!(Str::new("nope").cast_integer().is_none());
    }
}

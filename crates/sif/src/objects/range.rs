//! The immutable integer range object.

use std::rc::Rc;

use crate::{
    object::Object,
    objects::enumerator::Enumerator,
    protocols::{Enumerable, Subscriptable},
    value::Value,
};

/// `start...end` (closed) or `start..<end` (half-open). `end >= start` is
/// enforced at construction time by the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: i64,
    end: i64,
    closed: bool,
}

impl Range {
    #[must_use]
    pub fn new(start: i64, end: i64, closed: bool) -> Self {
        Self { start, end, closed }
    }

    #[must_use]
    pub fn start(&self) -> i64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> i64 {
        self.end
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        self.end - self.start + i64::from(self.closed)
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        value >= self.start && (value < self.end || (self.closed && value == self.end))
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_last = self.end - i64::from(!self.closed);
        let other_last = other.end - i64::from(!other.closed);
        self.start <= other_last && other.start <= self_last
    }
}

impl Enumerable for Range {
    fn enumerator(&self, _this: &Rc<Object>) -> Enumerator {
        Enumerator::over_range(*self)
    }
}

impl Subscriptable for Range {
    fn subscript(&self, key: &Value) -> Result<Value, String> {
        let Value::Integer(index) = key else {
            return Err(format!("expected an integer, got {}", key.type_name()));
        };
        let size = self.size();
        let resolved = if *index < 0 { size + index } else { *index };
        if resolved < 0 || resolved >= size {
            return Err(format!("index {index} out of bounds"));
        }
        Ok(Value::Integer(self.start + resolved))
    }

    fn set_subscript(&self, _key: &Value, _value: Value) -> Result<(), String> {
        Err("ranges may not be modified".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_counts_the_closed_end() {
        assert_eq!(Range::new(1, 5, true).size(), 5);
        assert_eq!(Range::new(1, 5, false).size(), 4);
        assert_eq!(Range::new(3, 3, true).size(), 1);
        assert_eq!(Range::new(3, 3, false).size(), 0);
    }

    #[test]
    fn contains_and_overlaps() {
        let closed = Range::new(1, 5, true);
        assert!(closed.contains(5));
        let open = Range::new(1, 5, false);
        assert!(!open.contains(5));

        assert!(closed.overlaps(&Range::new(5, 9, true)));
        assert!(!open.overlaps(&Range::new(5, 9, true)));
    }

    #[test]
    fn subscript_yields_offsets() {
        let range = Range::new(10, 12, true);
        assert_eq!(range.subscript(&Value::Integer(0)).unwrap(), Value::Integer(10));
        assert_eq!(range.subscript(&Value::Integer(-1)).unwrap(), Value::Integer(12));
        assert!(range.subscript(&Value::Integer(3)).is_err());
    }
}

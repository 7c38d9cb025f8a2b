//! Firestore field values
//!
//! Documents travel through the driver layer as JSON maps: the JSON-safe
//! representation the document mapper serializes to. This module holds the
//! helpers every driver needs on top of that representation:
//!
//! - dotted field-path access (`nested.name`),
//! - Firestore's cross-type value ordering,
//! - server-side field transforms (`Increment`, `ArrayUnion`, ...).

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Map of field name to value, the body of one document
pub type Fields = Map<String, Value>;

/// Look up a dotted field path inside a document
///
/// Returns `None` when a segment is missing or walks through a non-map.
pub fn get_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a value at a dotted field path, creating intermediate maps
///
/// A non-map value sitting on an intermediate segment is replaced by a map.
pub fn set_path(fields: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// Expand dotted top-level keys into nested maps
///
/// `{"a.b": 1}` becomes `{"a": {"b": 1}}`. Used when an update's field
/// paths have to be shipped as a document body.
pub fn expand_paths(fields: &Fields) -> Fields {
    let mut expanded = Map::new();
    for (path, value) in fields {
        set_path(&mut expanded, path, value.clone());
    }
    expanded
}

/// Rank of a value's type in Firestore's cross-type ordering
///
/// null < booleans < numbers < strings < arrays < maps
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(left: &Number, right: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return a.cmp(&b);
    }
    let a = left.as_f64().unwrap_or(f64::NAN);
    let b = right.as_f64().unwrap_or(f64::NAN);
    // NaN sorts before every other number
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Total order over field values, following Firestore's value ordering
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = compare_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut left_keys: Vec<_> = a.keys().collect();
            let mut right_keys: Vec<_> = b.keys().collect();
            left_keys.sort();
            right_keys.sort();
            for (lk, rk) in left_keys.iter().zip(right_keys.iter()) {
                let ordering = lk.cmp(rk).then_with(|| compare_values(&a[*lk], &b[*rk]));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            left_keys.len().cmp(&right_keys.len())
        }
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

/// Equality with numeric coercion (`1 == 1.0`), as Firestore compares values
pub fn values_equal(left: &Value, right: &Value) -> bool {
    compare_values(left, right) == Ordering::Equal
}

/// Server-side transform applied to one field during an update
///
/// Mirrors Firestore's `FieldTransform` message.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTransform {
    /// Add to the current numeric value (missing or non-numeric: set)
    Increment(Number),
    /// Keep the larger of the current value and the operand
    Maximum(Number),
    /// Keep the smaller of the current value and the operand
    Minimum(Number),
    /// Append elements not already present in the array
    ArrayUnion(Vec<Value>),
    /// Remove every occurrence of the given elements from the array
    ArrayRemove(Vec<Value>),
}

impl FieldTransform {
    /// Increment by an integer
    pub fn increment(by: i64) -> Self {
        Self::Increment(Number::from(by))
    }

    /// Increment by a float; non-finite operands become zero
    pub fn increment_f64(by: f64) -> Self {
        Self::Increment(Number::from_f64(by).unwrap_or_else(|| Number::from(0)))
    }

    /// Maximum with an integer operand
    pub fn maximum(value: i64) -> Self {
        Self::Maximum(Number::from(value))
    }

    /// Minimum with an integer operand
    pub fn minimum(value: i64) -> Self {
        Self::Minimum(Number::from(value))
    }

    /// Union elements into an array field
    pub fn array_union<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::ArrayUnion(values.into_iter().map(Into::into).collect())
    }

    /// Remove elements from an array field
    pub fn array_remove<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::ArrayRemove(values.into_iter().map(Into::into).collect())
    }

    /// Compute the new value of a field given its current value
    pub fn apply(&self, current: Option<&Value>) -> Value {
        match self {
            Self::Increment(by) => match current {
                Some(Value::Number(n)) => add_numbers(n, by),
                _ => Value::Number(by.clone()),
            },
            Self::Maximum(operand) => match current {
                Some(Value::Number(n)) if compare_numbers(n, operand) != Ordering::Less => {
                    Value::Number(n.clone())
                }
                _ => Value::Number(operand.clone()),
            },
            Self::Minimum(operand) => match current {
                Some(Value::Number(n)) if compare_numbers(n, operand) != Ordering::Greater => {
                    Value::Number(n.clone())
                }
                _ => Value::Number(operand.clone()),
            },
            Self::ArrayUnion(elements) => {
                let mut array = match current {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                for element in elements {
                    if !array.iter().any(|existing| values_equal(existing, element)) {
                        array.push(element.clone());
                    }
                }
                Value::Array(array)
            }
            Self::ArrayRemove(elements) => {
                let array = match current {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter(|item| !elements.iter().any(|e| values_equal(item, e)))
                        .cloned()
                        .collect(),
                    _ => Vec::new(),
                };
                Value::Array(array)
            }
        }
    }
}

fn add_numbers(left: &Number, right: &Number) -> Value {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::Number(Number::from(sum));
        }
    }
    let sum = left.as_f64().unwrap_or(0.0) + right.as_f64().unwrap_or(0.0);
    Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_path_nested() {
        let doc = fields(json!({"nested": {"name": "a", "deep": {"x": 1}}, "flat": 2}));
        assert_eq!(get_path(&doc, "flat"), Some(&json!(2)));
        assert_eq!(get_path(&doc, "nested.name"), Some(&json!("a")));
        assert_eq!(get_path(&doc, "nested.deep.x"), Some(&json!(1)));
        assert_eq!(get_path(&doc, "nested.missing"), None);
        assert_eq!(get_path(&doc, "flat.child"), None);
    }

    #[test]
    fn test_set_path_creates_maps() {
        let mut doc = fields(json!({"flat": 1}));
        set_path(&mut doc, "nested.name", json!("b"));
        set_path(&mut doc, "flat.child", json!(true));
        assert_eq!(Value::Object(doc), json!({"flat": {"child": true}, "nested": {"name": "b"}}));
    }

    #[test]
    fn test_expand_paths() {
        let doc = fields(json!({"a.b": 1, "a.c": 2, "d": 3}));
        assert_eq!(Value::Object(expand_paths(&doc)), json!({"a": {"b": 1, "c": 2}, "d": 3}));
    }

    #[test]
    fn test_cross_type_ordering() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(99), &json!("a")), Ordering::Less);
        assert_eq!(compare_values(&json!("z"), &json!([])), Ordering::Less);
        assert_eq!(compare_values(&json!([1]), &json!({})), Ordering::Less);
    }

    #[test]
    fn test_numeric_ordering_mixes_ints_and_floats() {
        assert_eq!(compare_values(&json!(10), &json!(10.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(20.0), &json!(20)), Ordering::Equal);
        assert!(values_equal(&json!(3), &json!(3.0)));
    }

    #[test]
    fn test_increment() {
        assert_eq!(FieldTransform::increment(2).apply(Some(&json!(40))), json!(42));
        assert_eq!(FieldTransform::increment(5).apply(None), json!(5));
        assert_eq!(FieldTransform::increment_f64(0.5).apply(Some(&json!(1))), json!(1.5));
    }

    #[test]
    fn test_maximum_minimum() {
        assert_eq!(FieldTransform::maximum(10).apply(Some(&json!(3))), json!(10));
        assert_eq!(FieldTransform::maximum(1).apply(Some(&json!(3))), json!(3));
        assert_eq!(FieldTransform::minimum(1).apply(Some(&json!(3))), json!(1));
        assert_eq!(FieldTransform::minimum(1).apply(Some(&json!("x"))), json!(1));
    }

    #[test]
    fn test_array_union_and_remove() {
        let current = json!(["a", "b"]);
        assert_eq!(
            FieldTransform::array_union(["b", "c"]).apply(Some(&current)),
            json!(["a", "b", "c"])
        );
        assert_eq!(
            FieldTransform::array_remove(["a"]).apply(Some(&current)),
            json!(["b"])
        );
        assert_eq!(FieldTransform::array_remove(["a"]).apply(None), json!([]));
    }
}

//! Django-style lookup keys
//!
//! A filter key is a field path, optionally followed by a lookup suffix,
//! joined with double underscores:
//!
//! | key                  | field path    | operator             |
//! |----------------------|---------------|----------------------|
//! | `price`              | `price`       | `==`                 |
//! | `price__gte`         | `price`       | `>=`                 |
//! | `nested__name__eq`   | `nested.name` | `==`                 |
//! | `tags__contains`     | `tags`        | `array_contains`     |
//! | `nested__name`       | `nested.name` | `==`                 |
//!
//! A trailing segment that is not a known lookup is part of the field path.

use crate::firestore::{FieldFilter, FilterOperator};
use serde_json::Value;
use std::fmt;

/// Lookup suffixes and the operators they map to
pub const LOOKUP_OPERATORS: &[(&str, FilterOperator)] = &[
    ("eq", FilterOperator::Equal),
    ("ne", FilterOperator::NotEqual),
    ("gt", FilterOperator::GreaterThan),
    ("gte", FilterOperator::GreaterThanOrEqual),
    ("lt", FilterOperator::LessThan),
    ("lte", FilterOperator::LessThanOrEqual),
    ("in", FilterOperator::In),
    ("not_in", FilterOperator::NotIn),
    ("contains", FilterOperator::ArrayContains),
    ("contains_any", FilterOperator::ArrayContainsAny),
];

fn lookup_operator(suffix: &str) -> Option<FilterOperator> {
    LOOKUP_OPERATORS
        .iter()
        .find(|(name, _)| *name == suffix)
        .map(|(_, op)| *op)
}

/// Split a lookup key into a dotted field path and an operator
pub fn parse_lookup(key: &str) -> (String, FilterOperator) {
    let parts: Vec<&str> = key.split("__").collect();
    if let [path @ .., suffix] = parts.as_slice() {
        if !path.is_empty() {
            if let Some(op) = lookup_operator(suffix) {
                return (path.join("."), op);
            }
        }
    }
    (parts.join("."), FilterOperator::Equal)
}

/// Ordered set of `lookup key = value` filters
///
/// Keeps insertion order, which is also the order the filters are sent to
/// the driver.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filters {
    entries: Vec<(String, Value)>,
}

impl Filters {
    /// No filters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one filter, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add one filter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Append every filter from `other`
    pub fn extend(&mut self, other: Filters) {
        self.entries.extend(other.entries);
    }

    /// Number of filters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no filters
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Parse every key into a driver filter triple
    pub fn to_field_filters(&self) -> Vec<FieldFilter> {
        self.entries
            .iter()
            .map(|(key, value)| {
                let (field_path, op) = parse_lookup(key);
                FieldFilter::new(field_path, op, value.clone())
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Filters {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        f.write_str("}")
    }
}

/// What a `get` looked for, carried by `DoesNotExist`/`MultipleObjectsFound`
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Lookup by primary key
    Pk(String),
    /// Lookup by filters
    Filters(Filters),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pk(pk) => write!(f, "{{id=\"{}\"}}", pk),
            Self::Filters(filters) => filters.fmt(f),
        }
    }
}

/// Build [`Filters`] from `key => value` pairs
///
/// ```
/// use firestore_odm::filters;
///
/// let filters = filters! { "price__gte" => 10, "name" => "Laptop" };
/// assert_eq!(filters.len(), 2);
/// ```
#[macro_export]
macro_rules! filters {
    () => {
        $crate::odm::lookup::Filters::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::odm::lookup::Filters::new()$(.with($key, $value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_field() {
        assert_eq!(parse_lookup("name"), ("name".to_string(), FilterOperator::Equal));
    }

    #[test]
    fn test_parse_every_suffix() {
        for (suffix, op) in LOOKUP_OPERATORS {
            let key = format!("price__{}", suffix);
            assert_eq!(parse_lookup(&key), ("price".to_string(), *op));
        }
    }

    #[test]
    fn test_parse_nested_paths() {
        assert_eq!(
            parse_lookup("nested__name__eq"),
            ("nested.name".to_string(), FilterOperator::Equal)
        );
        assert_eq!(
            parse_lookup("nested__name"),
            ("nested.name".to_string(), FilterOperator::Equal)
        );
        assert_eq!(
            parse_lookup("a__b__contains_any"),
            ("a.b".to_string(), FilterOperator::ArrayContainsAny)
        );
    }

    #[test]
    fn test_lookup_name_alone_is_a_field() {
        // a field literally called `gt` is compared for equality
        assert_eq!(parse_lookup("gt"), ("gt".to_string(), FilterOperator::Equal));
    }

    #[test]
    fn test_filters_macro_and_display() {
        let filters = crate::filters! { "name" => "Laptop", "price__gt" => 10 };
        assert_eq!(filters.to_string(), r#"{name="Laptop", price__gt=10}"#);
        let triples = filters.to_field_filters();
        assert_eq!(triples[1].field_path, "price");
        assert_eq!(triples[1].op, FilterOperator::GreaterThan);
        assert_eq!(triples[1].value, json!(10));
        assert!(crate::filters! {}.is_empty());
    }

    #[test]
    fn test_lookup_display() {
        assert_eq!(Lookup::Pk("abc".into()).to_string(), r#"{id="abc"}"#);
    }
}

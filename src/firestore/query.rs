//! Driver-level structured query
//!
//! A plain description of one read against one collection: filters, ordering,
//! an optional start cursor and an optional limit. Immutable in the same way
//! the ODM query is: every builder method returns a new value with the
//! modified state, like an iterator adapter.
//!
//! Drivers receive a [`StructuredQuery`] and are responsible for executing
//! it; the shared cursor resolution lives here so every driver resolves
//! cursor maps to positional values the same way.

use super::field_value::{get_path, Fields};
use crate::error::FirestoreError;
use serde_json::Value;
use std::fmt;

/// Comparison operator of a field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// `field == value`
    Equal,
    /// `field != value`
    NotEqual,
    /// `field < value`
    LessThan,
    /// `field <= value`
    LessThanOrEqual,
    /// `field > value`
    GreaterThan,
    /// `field >= value`
    GreaterThanOrEqual,
    /// field value is in list
    In,
    /// field value is not in list
    NotIn,
    /// array field contains value
    ArrayContains,
    /// array field contains any value from list
    ArrayContainsAny,
}

impl FilterOperator {
    /// Firestore's textual operator (`==`, `not-in`, `array_contains`, ...)
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array_contains",
            Self::ArrayContainsAny => "array_contains_any",
        }
    }

    /// Parse Firestore's textual operator
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "<" => Self::LessThan,
            "<=" => Self::LessThanOrEqual,
            ">" => Self::GreaterThan,
            ">=" => Self::GreaterThanOrEqual,
            "in" => Self::In,
            "not-in" => Self::NotIn,
            "array_contains" => Self::ArrayContains,
            "array_contains_any" => Self::ArrayContainsAny,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `(field_path, operator, value)` filter triple
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Dotted field path (`nested.name`)
    pub field_path: String,
    /// Comparison operator
    pub op: FilterOperator,
    /// Right-hand operand
    pub value: Value,
}

impl FieldFilter {
    /// Create a filter triple
    pub fn new(field_path: impl Into<String>, op: FilterOperator, value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            op,
            value,
        }
    }
}

/// Sort direction for query ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// One order-by clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    /// Dotted field path
    pub field_path: String,
    /// Sort direction
    pub direction: Direction,
}

impl Order {
    /// Create an order-by clause
    pub fn new(field_path: impl Into<String>, direction: Direction) -> Self {
        Self {
            field_path: field_path.into(),
            direction,
        }
    }
}

/// Start cursor as supplied by the caller: a map of field values
#[derive(Debug, Clone, PartialEq)]
pub struct CursorSpec {
    /// Values keyed by field name; must cover every order-by field
    pub fields: Fields,
    /// `true` for `start_at` (inclusive), `false` for `start_after`
    pub before: bool,
}

/// Start cursor resolved to one value per order-by clause
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Positional values matching the query's order-by clauses
    pub values: Vec<Value>,
    /// `true` when the cursor position itself is included
    pub before: bool,
}

/// Read description handed to a driver
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredQuery {
    /// Slash-separated collection path (`products/abc/reviews`)
    pub collection_path: String,
    /// Conjunction of field filters
    pub filters: Vec<FieldFilter>,
    /// Order-by clauses, primary key first
    pub orders: Vec<Order>,
    /// Maximum number of results; drivers reject negative values
    pub limit: Option<i64>,
    /// Start cursor, if any
    pub start: Option<CursorSpec>,
}

impl StructuredQuery {
    /// Unfiltered query over a collection
    pub fn new(collection_path: impl Into<String>) -> Self {
        Self {
            collection_path: collection_path.into(),
            ..Default::default()
        }
    }

    /// Add a filter
    pub fn where_(mut self, field_path: impl Into<String>, op: FilterOperator, value: Value) -> Self {
        self.filters.push(FieldFilter::new(field_path, op, value));
        self
    }

    /// Add an order-by clause
    pub fn order_by(mut self, field_path: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(Order::new(field_path, direction));
        self
    }

    /// Limit query results to first n documents
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Start after the position described by the cursor map
    pub fn start_after(mut self, fields: Fields) -> Self {
        self.start = Some(CursorSpec {
            fields,
            before: false,
        });
        self
    }

    /// Start at the position described by the cursor map
    pub fn start_at(mut self, fields: Fields) -> Self {
        self.start = Some(CursorSpec {
            fields,
            before: true,
        });
        self
    }

    /// Reject limits no driver can honour
    pub fn validate(&self) -> Result<(), FirestoreError> {
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(FirestoreError::InvalidArgument(format!(
                    "limit must be non-negative, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Resolve the start cursor map into positional values
    ///
    /// The cursor must carry a value for every order-by field; dotted paths
    /// walk nested maps.
    pub fn resolve_cursor(&self) -> Result<Option<Cursor>, FirestoreError> {
        let Some(spec) = &self.start else {
            return Ok(None);
        };
        if self.orders.is_empty() {
            return Err(FirestoreError::InvalidArgument(
                "a cursor requires at least one order_by clause".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(self.orders.len());
        for order in &self.orders {
            let value = get_path(&spec.fields, &order.field_path).ok_or_else(|| {
                FirestoreError::InvalidArgument(format!(
                    "cursor has no value for order_by field `{}`",
                    order.field_path
                ))
            })?;
            values.push(value.clone());
        }

        Ok(Some(Cursor {
            values,
            before: spec.before,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cursor_fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in [
            FilterOperator::Equal,
            FilterOperator::NotEqual,
            FilterOperator::LessThan,
            FilterOperator::LessThanOrEqual,
            FilterOperator::GreaterThan,
            FilterOperator::GreaterThanOrEqual,
            FilterOperator::In,
            FilterOperator::NotIn,
            FilterOperator::ArrayContains,
            FilterOperator::ArrayContainsAny,
        ] {
            assert_eq!(FilterOperator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(FilterOperator::from_symbol("~="), None);
    }

    #[test]
    fn test_builder_is_by_value() {
        let base = StructuredQuery::new("products");
        let filtered = base
            .clone()
            .where_("price", FilterOperator::GreaterThan, json!(10))
            .order_by("price", Direction::Descending)
            .limit(5);

        assert!(base.filters.is_empty());
        assert_eq!(filtered.filters.len(), 1);
        assert_eq!(filtered.orders[0].direction, Direction::Descending);
        assert_eq!(filtered.limit, Some(5));
    }

    #[test]
    fn test_resolve_cursor_follows_order_fields() {
        let query = StructuredQuery::new("products")
            .order_by("price", Direction::Ascending)
            .order_by("meta.rank", Direction::Ascending)
            .start_after(cursor_fields(json!({"name": "x", "price": 100, "meta": {"rank": 2}})));

        let cursor = query.resolve_cursor().unwrap().unwrap();
        assert_eq!(cursor.values, vec![json!(100), json!(2)]);
        assert!(!cursor.before);
    }

    #[test]
    fn test_resolve_cursor_missing_field() {
        let query = StructuredQuery::new("products")
            .order_by("price", Direction::Ascending)
            .start_at(cursor_fields(json!({"name": "x"})));

        let err = query.resolve_cursor().unwrap_err();
        assert!(matches!(err, FirestoreError::InvalidArgument(msg) if msg.contains("price")));
    }

    #[test]
    fn test_negative_limit_rejected() {
        let query = StructuredQuery::new("products").limit(-1);
        assert!(query.validate().is_err());
        assert!(StructuredQuery::new("products").limit(0).validate().is_ok());
    }
}

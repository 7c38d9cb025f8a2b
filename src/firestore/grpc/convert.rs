//! Conversion between JSON documents and Firestore protos
//!
//! JSON has fewer types than Firestore, so the mapping is lossy on the way
//! back: timestamps come back as RFC 3339 strings, bytes as base64 strings,
//! references as their resource name and geo points as
//! `{"latitude", "longitude"}` maps.

use super::proto::google::firestore::v1 as pb;
use crate::error::FirestoreError;
use crate::firestore::document_snapshot::DocumentSnapshot;
use crate::firestore::field_value::{FieldTransform, Fields};
use crate::firestore::query::{Cursor, Direction, FilterOperator, StructuredQuery};
use base64::Engine;
use pb::document_transform::field_transform::TransformType;
use pb::structured_query::{
    composite_filter, field_filter, filter::FilterType, CollectionSelector, CompositeFilter,
    FieldReference, Filter,
};
use pb::value::ValueType;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// JSON value to proto value
pub fn to_proto_value(value: &Value) -> pb::Value {
    let value_type = match value {
        Value::Null => ValueType::NullValue(0),
        Value::Bool(b) => ValueType::BooleanValue(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ValueType::IntegerValue(i),
            None => ValueType::DoubleValue(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => ValueType::StringValue(s.clone()),
        Value::Array(items) => ValueType::ArrayValue(pb::ArrayValue {
            values: items.iter().map(to_proto_value).collect(),
        }),
        Value::Object(map) => ValueType::MapValue(pb::MapValue {
            fields: to_proto_fields(map),
        }),
    };
    pb::Value {
        value_type: Some(value_type),
    }
}

/// JSON map to proto field map
pub fn to_proto_fields(fields: &Fields) -> HashMap<String, pb::Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), to_proto_value(value)))
        .collect()
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Proto value to JSON value
pub fn from_proto_value(value: &pb::Value) -> Value {
    match &value.value_type {
        None | Some(ValueType::NullValue(_)) => Value::Null,
        Some(ValueType::BooleanValue(b)) => Value::Bool(*b),
        Some(ValueType::IntegerValue(i)) => Value::Number(Number::from(*i)),
        Some(ValueType::DoubleValue(d)) => float(*d),
        Some(ValueType::StringValue(s)) => Value::String(s.clone()),
        Some(ValueType::ReferenceValue(s)) => Value::String(s.clone()),
        Some(ValueType::BytesValue(bytes)) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
        Some(ValueType::TimestampValue(ts)) => {
            chrono::DateTime::from_timestamp(ts.seconds, ts.nanos.max(0) as u32)
                .map(|dt| Value::String(dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)))
                .unwrap_or(Value::Null)
        }
        Some(ValueType::GeoPointValue(point)) => {
            let mut map = Map::new();
            map.insert("latitude".to_string(), float(point.latitude));
            map.insert("longitude".to_string(), float(point.longitude));
            Value::Object(map)
        }
        Some(ValueType::ArrayValue(array)) => {
            Value::Array(array.values.iter().map(from_proto_value).collect())
        }
        Some(ValueType::MapValue(map)) => Value::Object(from_proto_fields(&map.fields)),
        #[allow(unreachable_patterns)]
        Some(_) => Value::Null,
    }
}

/// Proto field map to JSON map
pub fn from_proto_fields(fields: &HashMap<String, pb::Value>) -> Fields {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), from_proto_value(value)))
        .collect()
}

/// Proto document to snapshot; `root` is stripped from the resource name
pub fn to_snapshot(root: &str, document: &pb::Document) -> DocumentSnapshot {
    let path = document
        .name
        .strip_prefix(root)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(&document.name);
    DocumentSnapshot::new(path, from_proto_fields(&document.fields))
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Dotted path to a Firestore field path, quoting non-identifier segments
pub fn quote_field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            if is_simple_segment(segment) {
                segment.to_string()
            } else {
                format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn field_reference(path: &str) -> FieldReference {
    FieldReference {
        field_path: quote_field_path(path),
    }
}

fn operator(op: FilterOperator) -> field_filter::Operator {
    match op {
        FilterOperator::Equal => field_filter::Operator::Equal,
        FilterOperator::NotEqual => field_filter::Operator::NotEqual,
        FilterOperator::LessThan => field_filter::Operator::LessThan,
        FilterOperator::LessThanOrEqual => field_filter::Operator::LessThanOrEqual,
        FilterOperator::GreaterThan => field_filter::Operator::GreaterThan,
        FilterOperator::GreaterThanOrEqual => field_filter::Operator::GreaterThanOrEqual,
        FilterOperator::In => field_filter::Operator::In,
        FilterOperator::NotIn => field_filter::Operator::NotIn,
        FilterOperator::ArrayContains => field_filter::Operator::ArrayContains,
        FilterOperator::ArrayContainsAny => field_filter::Operator::ArrayContainsAny,
    }
}

/// Split a collection path into the query parent and the collection id
///
/// `products/abc/reviews` under `root` becomes
/// (`root/products/abc`, `reviews`).
pub fn split_collection_path(root: &str, collection_path: &str) -> (String, String) {
    match collection_path.rsplit_once('/') {
        Some((parent, id)) => (format!("{}/{}", root, parent), id.to_string()),
        None => (root.to_string(), collection_path.to_string()),
    }
}

/// Driver query to proto structured query, returning the parent resource too
pub fn to_structured_query(
    root: &str,
    query: &StructuredQuery,
) -> Result<(String, pb::StructuredQuery), FirestoreError> {
    query.validate()?;
    let (parent, collection_id) = split_collection_path(root, &query.collection_path);

    let mut filters: Vec<Filter> = query
        .filters
        .iter()
        .map(|filter| Filter {
            filter_type: Some(FilterType::FieldFilter(pb::structured_query::FieldFilter {
                field: Some(field_reference(&filter.field_path)),
                op: operator(filter.op) as i32,
                value: Some(to_proto_value(&filter.value)),
            })),
        })
        .collect();
    let r#where = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter {
            filter_type: Some(FilterType::CompositeFilter(CompositeFilter {
                op: composite_filter::Operator::And as i32,
                filters,
            })),
        }),
    };

    let order_by = query
        .orders
        .iter()
        .map(|order| pb::structured_query::Order {
            field: Some(field_reference(&order.field_path)),
            direction: match order.direction {
                Direction::Ascending => pb::structured_query::Direction::Ascending as i32,
                Direction::Descending => pb::structured_query::Direction::Descending as i32,
            },
        })
        .collect();

    let start_at = query
        .resolve_cursor()?
        .map(|Cursor { values, before }| pb::Cursor {
            values: values.iter().map(to_proto_value).collect(),
            before,
        });

    let limit = match query.limit {
        Some(limit) => Some(i32::try_from(limit).map_err(|_| {
            FirestoreError::InvalidArgument(format!("limit {} does not fit in 32 bits", limit))
        })?),
        None => None,
    };

    let structured = pb::StructuredQuery {
        from: vec![CollectionSelector {
            collection_id,
            all_descendants: false,
        }],
        r#where,
        order_by,
        start_at,
        limit,
        ..Default::default()
    };
    Ok((parent, structured))
}

/// Field transform to its proto form
pub fn to_proto_transform(
    field_path: &str,
    transform: &FieldTransform,
) -> pb::document_transform::FieldTransform {
    let number = |n: &Number| to_proto_value(&Value::Number(n.clone()));
    let array = |values: &[Value]| pb::ArrayValue {
        values: values.iter().map(to_proto_value).collect(),
    };
    let transform_type = match transform {
        FieldTransform::Increment(n) => TransformType::Increment(number(n)),
        FieldTransform::Maximum(n) => TransformType::Maximum(number(n)),
        FieldTransform::Minimum(n) => TransformType::Minimum(number(n)),
        FieldTransform::ArrayUnion(values) => TransformType::AppendMissingElements(array(values)),
        FieldTransform::ArrayRemove(values) => TransformType::RemoveAllFromArray(array(values)),
    };
    pb::document_transform::FieldTransform {
        field_path: quote_field_path(field_path),
        transform_type: Some(transform_type),
    }
}

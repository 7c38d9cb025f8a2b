//! Process-local driver
//!
//! Keeps every document in one ordered map keyed by document path and
//! evaluates queries against it with Firestore's semantics:
//!
//! - filters only match documents that carry the filtered field,
//! - range comparisons only match values of the same type,
//! - documents missing an order-by field are left out of ordered results,
//! - ties are broken by document id, in the direction of the last order,
//! - commits are all-or-nothing.
//!
//! Cloning an `InMemoryDriver` yields a handle on the same store.

use super::aggregate_query::{AggregateField, AggregationType};
use super::document_snapshot::DocumentSnapshot;
use super::driver::{DocumentStream, Driver};
use super::field_value::{compare_values, get_path, set_path, values_equal, Fields};
use super::query::{Cursor, Direction, FieldFilter, FilterOperator, Order, StructuredQuery};
use super::write_batch::{UpdateData, WriteOperation};
use crate::error::FirestoreError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Store = BTreeMap<String, Fields>;

/// Driver holding documents in process memory
#[derive(Clone, Default)]
pub struct InMemoryDriver {
    documents: Arc<Mutex<Store>>,
}

impl InMemoryDriver {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        // A panic while holding the lock cannot leave a half-applied commit
        // behind: commits swap in a fully built map.
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored documents, across all collections
    pub fn len(&self) -> usize {
        self.store().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    /// Paths of every stored document, sorted
    pub fn document_paths(&self) -> Vec<String> {
        self.store().keys().cloned().collect()
    }

    /// Drop every document
    pub fn clear(&self) {
        self.store().clear();
    }

    fn execute(&self, query: &StructuredQuery) -> Result<Vec<DocumentSnapshot>, FirestoreError> {
        query.validate()?;
        let cursor = query.resolve_cursor()?;

        let store = self.store();
        let mut documents: Vec<DocumentSnapshot> = store
            .iter()
            .filter(|(path, _)| in_collection(path, &query.collection_path))
            .filter(|(_, data)| query.filters.iter().all(|filter| matches_filter(data, filter)))
            .filter(|(_, data)| {
                query
                    .orders
                    .iter()
                    .all(|order| get_path(data, &order.field_path).is_some())
            })
            .map(|(path, data)| DocumentSnapshot::new(path.clone(), data.clone()))
            .collect();
        drop(store);

        documents.sort_by(|left, right| compare_snapshots(left, right, &query.orders));

        if let Some(cursor) = cursor {
            documents.retain(|snapshot| after_cursor(snapshot, &cursor, &query.orders));
        }

        if let Some(limit) = query.limit {
            documents.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(documents)
    }
}

fn in_collection(document_path: &str, collection_path: &str) -> bool {
    document_path
        .strip_prefix(collection_path)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|id| !id.is_empty() && !id.contains('/'))
}

fn same_type(left: &Value, right: &Value) -> bool {
    std::mem::discriminant(left) == std::mem::discriminant(right)
}

fn matches_filter(data: &Fields, filter: &FieldFilter) -> bool {
    let Some(value) = get_path(data, &filter.field_path) else {
        return false;
    };
    let operand = &filter.value;
    let ordered = |accept: fn(Ordering) -> bool| {
        same_type(value, operand) && accept(compare_values(value, operand))
    };

    match filter.op {
        FilterOperator::Equal => values_equal(value, operand),
        FilterOperator::NotEqual => !values_equal(value, operand),
        FilterOperator::LessThan => ordered(|o| o == Ordering::Less),
        FilterOperator::LessThanOrEqual => ordered(|o| o != Ordering::Greater),
        FilterOperator::GreaterThan => ordered(|o| o == Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => ordered(|o| o != Ordering::Less),
        FilterOperator::In => match operand {
            Value::Array(needles) => needles.iter().any(|needle| values_equal(value, needle)),
            _ => false,
        },
        FilterOperator::NotIn => match operand {
            Value::Array(needles) => {
                !value.is_null() && needles.iter().all(|needle| !values_equal(value, needle))
            }
            _ => false,
        },
        FilterOperator::ArrayContains => match value {
            Value::Array(items) => items.iter().any(|item| values_equal(item, operand)),
            _ => false,
        },
        FilterOperator::ArrayContainsAny => match (value, operand) {
            (Value::Array(items), Value::Array(needles)) => items
                .iter()
                .any(|item| needles.iter().any(|needle| values_equal(item, needle))),
            _ => false,
        },
    }
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

fn field_of<'a>(snapshot: &'a DocumentSnapshot, field_path: &str) -> &'a Value {
    snapshot.get(field_path).unwrap_or(&Value::Null)
}

fn compare_snapshots(left: &DocumentSnapshot, right: &DocumentSnapshot, orders: &[Order]) -> Ordering {
    for order in orders {
        let ordering = directed(
            compare_values(field_of(left, &order.field_path), field_of(right, &order.field_path)),
            order.direction,
        );
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let tie_break = orders.last().map(|order| order.direction).unwrap_or_default();
    directed(left.id().cmp(right.id()), tie_break)
}

fn after_cursor(snapshot: &DocumentSnapshot, cursor: &Cursor, orders: &[Order]) -> bool {
    let mut ordering = Ordering::Equal;
    for (order, value) in orders.iter().zip(&cursor.values) {
        ordering = directed(
            compare_values(field_of(snapshot, &order.field_path), value),
            order.direction,
        );
        if ordering != Ordering::Equal {
            break;
        }
    }
    match ordering {
        Ordering::Greater => true,
        Ordering::Equal => cursor.before,
        Ordering::Less => false,
    }
}

fn apply_update(store: &mut Store, path: &str, update: UpdateData) -> Result<(), FirestoreError> {
    let fields = store
        .get_mut(path)
        .ok_or_else(|| FirestoreError::NotFound(format!("Document {} does not exist", path)))?;
    for (field_path, value) in update.fields {
        set_path(fields, &field_path, value);
    }
    for (field_path, transform) in update.transforms {
        let value = transform.apply(get_path(fields, &field_path));
        set_path(fields, &field_path, value);
    }
    Ok(())
}

fn numeric_values<'a>(
    documents: &'a [DocumentSnapshot],
    field_path: &'a str,
) -> impl Iterator<Item = &'a Number> + 'a {
    documents.iter().filter_map(move |doc| match doc.get(field_path) {
        Some(Value::Number(n)) => Some(n),
        _ => None,
    })
}

fn sum_numbers<'a>(numbers: impl Iterator<Item = &'a Number>) -> Value {
    let mut integer: Option<i64> = Some(0);
    let mut float = 0.0;
    for n in numbers {
        float += n.as_f64().unwrap_or(0.0);
        integer = match (integer, n.as_i64()) {
            (Some(acc), Some(v)) => acc.checked_add(v),
            _ => None,
        };
    }
    match integer {
        Some(total) => Value::Number(Number::from(total)),
        None => Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null),
    }
}

fn aggregate(documents: &[DocumentSnapshot], field: &AggregateField) -> Value {
    match &field.aggregation_type {
        AggregationType::Count => Value::Number(Number::from(documents.len() as u64)),
        AggregationType::Sum(field_path) => sum_numbers(numeric_values(documents, field_path)),
        AggregationType::Average(field_path) => {
            let values: Vec<f64> = numeric_values(documents, field_path)
                .filter_map(Number::as_f64)
                .collect();
            if values.is_empty() {
                return Value::Null;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Number::from_f64(mean).map(Value::Number).unwrap_or(Value::Null)
        }
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    async fn get_document(&self, path: &str) -> Result<Option<DocumentSnapshot>, FirestoreError> {
        let store = self.store();
        Ok(store
            .get(path)
            .map(|data| DocumentSnapshot::new(path, data.clone())))
    }

    fn run_query(&self, query: StructuredQuery) -> DocumentStream {
        match self.execute(&query) {
            Ok(documents) => stream::iter(documents.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }

    async fn run_aggregation(
        &self,
        query: &StructuredQuery,
        aggregations: &[AggregateField],
    ) -> Result<Fields, FirestoreError> {
        let documents = self.execute(query)?;
        Ok(aggregations
            .iter()
            .map(|field| (field.result_alias(), aggregate(&documents, field)))
            .collect())
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> Result<(), FirestoreError> {
        let mut store = self.store();
        let mut staged = store.clone();
        for write in writes {
            match write {
                WriteOperation::Set { path, data } => {
                    staged.insert(path, data);
                }
                WriteOperation::Update { path, update } => {
                    apply_update(&mut staged, &path, update)?;
                }
                WriteOperation::Delete { path } => {
                    staged.remove(&path);
                }
            }
        }
        *store = staged;
        Ok(())
    }
}

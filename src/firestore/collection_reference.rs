//! Firestore CollectionReference type
//!
//! A collection reference doubles as a query over that collection: every
//! `where_`/`order_by`/`limit`/cursor call returns a new reference carrying
//! the extended query state, leaving the receiver untouched.

use super::aggregate_query::{AggregateField, AggregateQuery};
use super::document_reference::DocumentReference;
use super::driver::{Driver, DocumentStream};
use super::field_value::Fields;
use super::query::{Direction, FilterOperator, StructuredQuery};
use crate::error::FirestoreError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Reference to a Firestore collection
#[derive(Clone)]
pub struct CollectionReference {
    state: StructuredQuery,
    driver: Arc<dyn Driver>,
}

impl CollectionReference {
    /// Create a new collection reference
    pub fn new(path: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self {
            state: StructuredQuery::new(path),
            driver,
        }
    }

    fn with_state(&self, state: StructuredQuery) -> Self {
        Self {
            state,
            driver: self.driver.clone(),
        }
    }

    /// Collection path (e.g., "products/abc/reviews")
    pub fn path(&self) -> &str {
        &self.state.collection_path
    }

    /// Get collection ID (last segment of path)
    pub fn id(&self) -> &str {
        let path = &self.state.collection_path;
        path.rsplit('/').next().unwrap_or(path)
    }

    /// Accumulated query state
    pub fn query(&self) -> &StructuredQuery {
        &self.state
    }

    /// Get a document reference within this collection
    ///
    /// Without an id the driver allocates a fresh one.
    pub fn document(&self, document_id: Option<&str>) -> DocumentReference {
        let id = match document_id {
            Some(id) => id.to_string(),
            None => self.driver.allocate_id(),
        };
        DocumentReference::new(
            format!("{}/{}", self.state.collection_path, id),
            self.driver.clone(),
        )
    }

    /// Add a new document with auto-generated ID
    pub async fn add(&self, data: Fields) -> Result<DocumentReference, FirestoreError> {
        let doc_ref = self.document(None);
        doc_ref.set(data).await?;
        Ok(doc_ref)
    }

    /// Filter on a field
    pub fn where_(&self, field_path: impl Into<String>, op: FilterOperator, value: Value) -> Self {
        self.with_state(self.state.clone().where_(field_path, op, value))
    }

    /// Order results by a field
    pub fn order_by(&self, field_path: impl Into<String>, direction: Direction) -> Self {
        self.with_state(self.state.clone().order_by(field_path, direction))
    }

    /// Limit query results to first n documents
    pub fn limit(&self, limit: i64) -> Self {
        self.with_state(self.state.clone().limit(limit))
    }

    /// Start after the position described by a cursor map
    pub fn start_after(&self, cursor: Fields) -> Self {
        self.with_state(self.state.clone().start_after(cursor))
    }

    /// Start at the position described by a cursor map
    pub fn start_at(&self, cursor: Fields) -> Self {
        self.with_state(self.state.clone().start_at(cursor))
    }

    /// Execute the query, streaming matching documents
    pub fn stream(&self) -> DocumentStream {
        tracing::debug!(
            target: "firestore_odm::driver",
            collection = %self.state.collection_path,
            filters = self.state.filters.len(),
            orders = self.state.orders.len(),
            limit = ?self.state.limit,
            "run query"
        );
        self.driver.run_query(self.state.clone())
    }

    /// Aggregation over this query
    pub fn aggregate(&self, aggregations: Vec<AggregateField>) -> AggregateQuery {
        AggregateQuery::new(self.driver.clone(), self.state.clone(), aggregations)
    }

    /// Count aggregation over this query
    pub fn count(&self) -> AggregateQuery {
        self.aggregate(vec![AggregateField::count()])
    }
}

impl fmt::Debug for CollectionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionReference")
            .field("query", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::InMemoryDriver;
    use futures::TryStreamExt;
    use serde_json::json;

    fn products() -> CollectionReference {
        CollectionReference::new("products", Arc::new(InMemoryDriver::new()))
    }

    #[test]
    fn test_document_ids() {
        let collection = products();
        assert_eq!(collection.document(Some("abc")).path, "products/abc");
        let generated = collection.document(None);
        assert_eq!(generated.parent_path(), Some("products"));
        assert_eq!(generated.id().len(), 20);
    }

    #[test]
    fn test_query_methods_do_not_mutate_receiver() {
        let collection = products();
        let narrowed = collection
            .where_("price", FilterOperator::LessThan, json!(10))
            .limit(1);
        assert!(collection.query().filters.is_empty());
        assert_eq!(narrowed.query().limit, Some(1));
        assert_eq!(narrowed.id(), "products");
    }

    #[tokio::test]
    async fn test_add_and_query() {
        let collection = products();
        for price in [5, 15, 25] {
            let data = json!({"price": price});
            collection.add(data.as_object().cloned().unwrap()).await.unwrap();
        }

        let cheap: Vec<_> = collection
            .where_("price", FilterOperator::GreaterThan, json!(10))
            .order_by("price", Direction::Descending)
            .stream()
            .try_collect()
            .await
            .unwrap();
        let prices: Vec<_> = cheap.iter().map(|doc| doc.get("price").cloned()).collect();
        assert_eq!(prices, vec![Some(json!(25)), Some(json!(15))]);

        let counted = collection.count().get().await.unwrap();
        assert_eq!(counted.count(), Some(3));
    }
}

//! Immutable chainable query
//!
//! Every chain method returns a new [`Query`] and leaves the receiver
//! untouched, so a query can be stored, branched and executed repeatedly.
//! Criteria are only compiled into a driver query when the query runs.

use super::document::{json_kind, Document};
use super::lookup::{Filters, Lookup};
use super::manager::Manager;
use super::paginator::Paginator;
use crate::error::{OdmError, Result};
use crate::firestore::{AggregateField, CollectionReference, Direction, FieldFilter, Fields, Order};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt;

/// Cursor as supplied; invalid cursors are reported when the query compiles
type CursorInput = std::result::Result<Fields, String>;

/// Query over the collection of one [`Manager`]
pub struct Query<D> {
    manager: Manager<D>,
    filters: Filters,
    orders: Vec<Order>,
    limit: Option<i64>,
    start_after: Option<CursorInput>,
    start_at: Option<CursorInput>,
}

impl<D> Clone for Query<D> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            filters: self.filters.clone(),
            orders: self.orders.clone(),
            limit: self.limit,
            start_after: self.start_after.clone(),
            start_at: self.start_at.clone(),
        }
    }
}

fn cursor_input<C: Serialize + ?Sized>(cursor: &C) -> CursorInput {
    match serde_json::to_value(cursor) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(format!("cursor must be a map, got {}", json_kind(&other))),
        Err(err) => Err(err.to_string()),
    }
}

impl<D: Document> Query<D> {
    /// Unfiltered query over the manager's collection
    pub fn new(manager: Manager<D>) -> Self {
        Self {
            manager,
            filters: Filters::new(),
            orders: Vec::new(),
            limit: None,
            start_after: None,
            start_at: None,
        }
    }

    /// Add one `lookup key = value` filter
    ///
    /// ```no_run
    /// # use firestore_odm::{Document, Manager};
    /// # fn example<P: Document>(products: &Manager<P>) {
    /// let cheap = products.all().filter("price__lt", 100).filter("stock__gt", 0);
    /// # }
    /// ```
    pub fn filter(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut query = self.clone();
        query.filters.insert(key, value);
        query
    }

    /// Add every filter from `filters`
    pub fn filter_many(&self, filters: Filters) -> Self {
        let mut query = self.clone();
        query.filters.extend(filters);
        query
    }

    /// Append order-by clauses; `-field` sorts descending
    pub fn order_by<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = self.clone();
        for field in fields {
            let field = field.as_ref();
            let order = match field.strip_prefix('-') {
                Some(name) => Order::new(name, Direction::Descending),
                None => Order::new(field.strip_prefix('+').unwrap_or(field), Direction::Ascending),
            };
            query.orders.push(order);
        }
        query
    }

    /// Cap the number of results; `0` removes the cap
    pub fn limit(&self, limit: i64) -> Self {
        let mut query = self.clone();
        query.limit = Some(limit);
        query
    }

    /// Start after the position of `cursor` (a document or a field map)
    pub fn start_after<C: Serialize + ?Sized>(&self, cursor: &C) -> Self {
        let mut query = self.clone();
        query.start_after = Some(cursor_input(cursor));
        query
    }

    /// Start at the position of `cursor`, including it
    pub fn start_at<C: Serialize + ?Sized>(&self, cursor: &C) -> Self {
        let mut query = self.clone();
        query.start_at = Some(cursor_input(cursor));
        query
    }

    pub(crate) fn without_cursors(&self) -> Self {
        let mut query = self.clone();
        query.start_after = None;
        query.start_at = None;
        query
    }

    pub(crate) fn without_limit(&self) -> Self {
        let mut query = self.clone();
        query.limit = None;
        query
    }

    /// Owning manager
    pub fn manager(&self) -> &Manager<D> {
        &self.manager
    }

    /// Filters as given, in order
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Filters parsed into driver triples
    pub fn field_filters(&self) -> Vec<FieldFilter> {
        self.filters.to_field_filters()
    }

    /// Order-by clauses, in call order
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Limit as given
    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    /// The `start_after` cursor, when one was set and is a valid map
    pub fn start_after_cursor(&self) -> Option<&Fields> {
        self.start_after.as_ref().and_then(|cursor| cursor.as_ref().ok())
    }

    /// The `start_at` cursor, when one was set and is a valid map
    pub fn start_at_cursor(&self) -> Option<&Fields> {
        self.start_at.as_ref().and_then(|cursor| cursor.as_ref().ok())
    }

    fn checked_cursor(cursor: &Option<CursorInput>) -> Result<Option<Fields>> {
        match cursor {
            None => Ok(None),
            Some(Ok(fields)) => Ok(Some(fields.clone())),
            Some(Err(reason)) => Err(OdmError::InvalidCursor(reason.clone())),
        }
    }

    /// Compile into a driver query: filters, order, cursors, limit
    ///
    /// Cursor errors are raised here, before the driver is touched.
    pub async fn build(&self) -> Result<CollectionReference> {
        if (self.start_after.is_some() || self.start_at.is_some()) && self.orders.is_empty() {
            return Err(OdmError::CursorRequiresOrderBy);
        }
        let start_after = Self::checked_cursor(&self.start_after)?;
        let start_at = Self::checked_cursor(&self.start_at)?;

        let mut collection = self.manager.collection().await?;
        for filter in self.field_filters() {
            collection = collection.where_(filter.field_path, filter.op, filter.value);
        }
        for order in &self.orders {
            collection = collection.order_by(order.field_path.clone(), order.direction);
        }
        if let Some(cursor) = start_after {
            collection = collection.start_after(cursor);
        }
        if let Some(cursor) = start_at {
            collection = collection.start_at(cursor);
        }
        if let Some(limit) = self.limit.filter(|limit| *limit != 0) {
            collection = collection.limit(limit);
        }
        Ok(collection)
    }

    /// Lazily stream matching documents
    ///
    /// Nothing is sent to the driver until the stream is polled; each call
    /// replays the query from scratch.
    pub fn stream(&self) -> BoxStream<'static, Result<D>> {
        let query = self.clone();
        try_stream! {
            let collection = query.build().await?;
            tracing::debug!(
                target: "firestore_odm::query",
                document_type = query.manager.document_type(),
                query = %query,
                "stream"
            );
            let mut snapshots = collection.stream();
            while let Some(snapshot) = snapshots.next().await {
                let snapshot = snapshot?;
                yield query.manager.to_document(snapshot)?;
            }
        }
        .boxed()
    }

    /// Collect every matching document
    pub async fn fetch(&self) -> Result<Vec<D>> {
        self.stream().try_collect().await
    }

    /// The single matching document
    ///
    /// # Errors
    /// `DoesNotExist` for no match, `MultipleObjectsFound` for more than one.
    pub async fn get(&self) -> Result<D> {
        let mut found = self.limit(2).fetch().await?;
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(OdmError::DoesNotExist {
                document_type: self.manager.document_type(),
                lookup: Lookup::Filters(self.filters.clone()),
            }),
            _ => Err(OdmError::MultipleObjectsFound {
                document_type: self.manager.document_type(),
                lookup: Lookup::Filters(self.filters.clone()),
            }),
        }
    }

    /// Number of matching documents
    pub async fn count(&self) -> Result<u64> {
        let snapshot = self.build().await?.count().get().await?;
        Ok(snapshot
            .count()
            .and_then(|count| u64::try_from(count).ok())
            .unwrap_or(0))
    }

    /// Sum of a numeric field over the matching documents
    pub async fn sum(&self, field: &str) -> Result<Number> {
        let aggregation = AggregateField::sum(field);
        let alias = aggregation.result_alias();
        let snapshot = self.build().await?.aggregate(vec![aggregation]).get().await?;
        Ok(snapshot
            .get_number(&alias)
            .cloned()
            .unwrap_or_else(|| Number::from(0)))
    }

    /// Average of a numeric field; `None` when no document has a number there
    pub async fn avg(&self, field: &str) -> Result<Option<f64>> {
        let aggregation = AggregateField::average(field);
        let alias = aggregation.result_alias();
        let snapshot = self.build().await?.aggregate(vec![aggregation]).get().await?;
        Ok(snapshot.get_double(&alias))
    }

    /// Page through the matching documents
    pub fn paginate(&self, per_page: usize) -> Paginator<D> {
        Paginator::new(self.clone(), per_page)
    }
}

impl<D> fmt::Display for Query<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filters)?;
        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|order| match order.direction {
                    Direction::Ascending => order.field_path.clone(),
                    Direction::Descending => format!("-{}", order.field_path),
                })
                .collect();
            write!(f, " order_by={}", orders.join(","))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit={}", limit)?;
        }
        Ok(())
    }
}

impl<D> fmt::Debug for Query<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("manager", &self.manager)
            .field("filters", &self.filters)
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("start_after", &self.start_after)
            .field("start_at", &self.start_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::FilterOperator;
    use crate::odm::Database;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: Option<String>,
        name: String,
        price: i64,
    }

    impl Document for Product {
        fn pk(&self) -> Option<&str> {
            self.id.as_deref()
        }
        fn set_pk(&mut self, pk: String) {
            self.id = Some(pk);
        }
    }

    async fn seeded() -> Manager<Product> {
        let manager = Database::in_memory().manager::<Product>().unwrap();
        for (name, price) in [("a", 10), ("b", 20), ("c", 30)] {
            manager
                .create(&json!({"name": name, "price": price}), None)
                .await
                .unwrap();
        }
        manager
    }

    #[test]
    fn test_chain_leaves_receiver_untouched() {
        let manager = Database::in_memory().manager::<Product>().unwrap();
        let base = manager.all();
        let narrowed = base.filter("price__gt", 10).order_by(["-price"]).limit(5);
        assert!(base.filters().is_empty());
        assert!(base.orders().is_empty());
        assert_eq!(base.limit_value(), None);

        assert_eq!(
            narrowed.field_filters(),
            vec![FieldFilter::new("price", FilterOperator::GreaterThan, json!(10))]
        );
        assert_eq!(narrowed.orders(), &[Order::new("price", Direction::Descending)]);
        assert_eq!(narrowed.limit_value(), Some(5));
    }

    #[test]
    fn test_order_by_prefixes() {
        let manager = Database::in_memory().manager::<Product>().unwrap();
        let query = manager.all().order_by(["+name", "price"]).order_by(["-stock"]);
        assert_eq!(
            query.orders(),
            &[
                Order::new("name", Direction::Ascending),
                Order::new("price", Direction::Ascending),
                Order::new("stock", Direction::Descending),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_filtered_and_ordered() {
        let manager = seeded().await;
        let names: Vec<String> = manager
            .all()
            .filter("price__gte", 20)
            .order_by(["-price"])
            .fetch()
            .await
            .unwrap()
            .into_iter()
            .map(|product| product.name)
            .collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_limit_zero_means_unbounded() {
        let manager = seeded().await;
        assert_eq!(manager.all().limit(0).fetch().await.unwrap().len(), 3);
        assert_eq!(manager.all().limit(1).fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_without_order_by() {
        let manager = seeded().await;
        let err = manager
            .all()
            .start_after(&json!({"price": 10}))
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, OdmError::CursorRequiresOrderBy));
    }

    #[tokio::test]
    async fn test_non_map_cursor_is_invalid() {
        let manager = seeded().await;
        let err = manager
            .all()
            .order_by(["price"])
            .start_at(&json!(10))
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, OdmError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn test_aggregations() {
        let manager = seeded().await;
        let expensive = manager.all().filter("price__gt", 10);
        assert_eq!(expensive.count().await.unwrap(), 2);
        assert_eq!(expensive.sum("price").await.unwrap(), Number::from(50));
        assert_eq!(expensive.avg("price").await.unwrap(), Some(25.0));
        assert_eq!(manager.all().filter("price", 99).avg("price").await.unwrap(), None);
    }

    #[test]
    fn test_display() {
        let manager = Database::in_memory().manager::<Product>().unwrap();
        let query = manager.all().filter("name", "Laptop").order_by(["-price"]).limit(3);
        assert_eq!(query.to_string(), r#"{name="Laptop"} order_by=-price limit=3"#);
    }
}

//! Shared fixtures for the in-memory integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use firestore_odm::firestore::{
    AggregateField, DocumentSnapshot, DocumentStream, Driver, Fields, InMemoryDriver,
    StructuredQuery, WriteOperation,
};
use firestore_odm::{Database, Document, FirestoreError, Meta, Subcollection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Install a `RUST_LOG`-driven subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nested {
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub nested: Option<Nested>,
}

impl Product {
    pub const REVIEWS: Subcollection<Review> = Subcollection::new("reviews");

    pub fn new(name: &str, price: f64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            price,
            stock: 0,
            tags: Vec::new(),
            attributes: HashMap::new(),
            nested: None,
        }
    }
}

impl Document for Product {
    fn pk(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_pk(&mut self, pk: String) {
        self.id = Some(pk);
    }
    fn meta() -> Meta {
        Meta::collection("products")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: Option<String>,
    pub author: String,
    pub stars: i64,
}

impl Review {
    pub fn new(author: &str, stars: i64) -> Self {
        Self {
            id: None,
            author: author.to_string(),
            stars,
        }
    }
}

impl Document for Review {
    fn pk(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_pk(&mut self, pk: String) {
        self.id = Some(pk);
    }
}

/// In-memory driver that counts round trips and records committed paths
#[derive(Clone, Default)]
pub struct CountingDriver {
    pub inner: InMemoryDriver,
    pub queries: Arc<AtomicUsize>,
    pub commits: Arc<AtomicUsize>,
    pub committed: Arc<Mutex<Vec<Vec<String>>>>,
}

impl CountingDriver {
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Write paths of every commit, in commit order
    pub fn committed_paths(&self) -> Vec<Vec<String>> {
        self.committed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for CountingDriver {
    async fn get_document(&self, path: &str) -> Result<Option<DocumentSnapshot>, FirestoreError> {
        self.inner.get_document(path).await
    }

    fn run_query(&self, query: StructuredQuery) -> DocumentStream {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.run_query(query)
    }

    async fn run_aggregation(
        &self,
        query: &StructuredQuery,
        aggregations: &[AggregateField],
    ) -> Result<Fields, FirestoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.run_aggregation(query, aggregations).await
    }

    async fn commit(&self, writes: Vec<WriteOperation>) -> Result<(), FirestoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.committed
            .lock()
            .unwrap()
            .push(writes.iter().map(|write| write.path().to_string()).collect());
        self.inner.commit(writes).await
    }
}

/// Database over a counting in-memory driver
pub fn counting_database() -> (Database, CountingDriver) {
    init_tracing();
    let driver = CountingDriver::default();
    (Database::with_driver(Arc::new(driver.clone())), driver)
}

//! Document-store driver capability
//!
//! The document mapper never talks to a backend directly. It goes through
//! [`CollectionReference`](super::CollectionReference) and
//! [`DocumentReference`](super::DocumentReference), which delegate every round
//! trip to a [`Driver`]. Two drivers ship with the crate:
//! [`InMemoryDriver`](super::InMemoryDriver) and, with the `grpc` feature,
//! `GrpcDriver`.
//!
//! Single-document writes default to one-element commits, so a driver only
//! has to implement reads, queries, aggregations and `commit`.

use super::aggregate_query::AggregateField;
use super::document_snapshot::DocumentSnapshot;
use super::field_value::Fields;
use super::query::StructuredQuery;
use super::write_batch::{UpdateData, WriteOperation};
use crate::error::FirestoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use rand::Rng;

/// Length of generated document ids
pub const AUTO_ID_LENGTH: usize = 20;

/// Stream of query results, delivered as the driver receives them
pub type DocumentStream = BoxStream<'static, Result<DocumentSnapshot, FirestoreError>>;

/// Generate a random document id (20 alphanumeric characters)
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Backend executing document reads and writes
///
/// Paths are slash-separated and relative to the database root:
/// `products/abc`, `products/abc/reviews/xyz`. Implementations must be safe
/// to share between concurrent tasks.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Allocate an id for a new document
    fn allocate_id(&self) -> String {
        auto_id()
    }

    /// Read one document; `None` when it does not exist
    async fn get_document(&self, path: &str) -> Result<Option<DocumentSnapshot>, FirestoreError>;

    /// Run a query, streaming matching documents
    ///
    /// Errors (invalid limit, unresolvable cursor, transport failures) are
    /// reported as stream items.
    fn run_query(&self, query: StructuredQuery) -> DocumentStream;

    /// Run aggregations over a query; results are keyed by alias
    async fn run_aggregation(
        &self,
        query: &StructuredQuery,
        aggregations: &[AggregateField],
    ) -> Result<Fields, FirestoreError>;

    /// Apply a list of writes atomically: all or nothing
    async fn commit(&self, writes: Vec<WriteOperation>) -> Result<(), FirestoreError>;

    /// Create or overwrite a document
    async fn set_document(&self, path: &str, data: Fields) -> Result<(), FirestoreError> {
        self.commit(vec![WriteOperation::Set {
            path: path.to_string(),
            data,
        }])
        .await
    }

    /// Update fields of an existing document; `NotFound` if it is missing
    async fn update_document(&self, path: &str, update: UpdateData) -> Result<(), FirestoreError> {
        self.commit(vec![WriteOperation::Update {
            path: path.to_string(),
            update,
        }])
        .await
    }

    /// Delete a document; deleting a missing document is not an error
    async fn delete_document(&self, path: &str) -> Result<(), FirestoreError> {
        self.commit(vec![WriteOperation::Delete {
            path: path.to_string(),
        }])
        .await
    }
}

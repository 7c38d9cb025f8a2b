//! Document-store driver layer
//!
//! Everything the document mapper needs from Firestore, behind the
//! [`Driver`] trait:
//! - `driver.rs`: the capability trait and id allocation
//! - `collection_reference.rs` / `document_reference.rs`: path-bound handles
//! - `query.rs`: the structured query a driver executes
//! - `write_batch.rs`: atomic multi-document writes
//! - `aggregate_query.rs`: count/sum/average
//! - `field_value.rs`: field paths, value ordering, field transforms
//! - `in_memory.rs`: process-local driver
//! - `grpc/`: Cloud Firestore over gRPC (feature `grpc`)
//! - `provider.rs` / `settings.rs`: lazy client creation and configuration

pub mod aggregate_query;
pub mod collection_reference;
pub mod document_reference;
pub mod document_snapshot;
pub mod driver;
pub mod field_value;
pub mod in_memory;
pub mod provider;
pub mod query;
pub mod settings;
pub mod write_batch;

/// Cloud Firestore over gRPC
#[cfg(feature = "grpc")]
pub mod grpc;

pub use aggregate_query::{AggregateField, AggregateQuery, AggregateQuerySnapshot, AggregationType};
pub use collection_reference::CollectionReference;
pub use document_reference::DocumentReference;
pub use document_snapshot::DocumentSnapshot;
pub use driver::{auto_id, DocumentStream, Driver};
pub use field_value::{FieldTransform, Fields};
pub use in_memory::InMemoryDriver;
pub use provider::ClientProvider;
pub use query::{Direction, FieldFilter, FilterOperator, Order, StructuredQuery};
pub use settings::Settings;
pub use write_batch::{UpdateData, WriteBatch, WriteOperation};

#[cfg(feature = "grpc")]
pub use grpc::GrpcDriver;

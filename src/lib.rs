//! Firestore ODM
//!
//! Typed document mapping over Cloud Firestore: declare a serde struct,
//! implement [`Document`], then read and write it through a [`Manager`].
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), firestore_odm::OdmError> {
//! use firestore_odm::{filters, Database, Document, DocumentExt};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Product {
//!     id: Option<String>,
//!     name: String,
//!     price: f64,
//! }
//!
//! impl Document for Product {
//!     fn pk(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//!     fn set_pk(&mut self, pk: String) {
//!         self.id = Some(pk);
//!     }
//! }
//!
//! let db = Database::in_memory();
//! let products = db.manager::<Product>()?;
//!
//! let mut laptop = Product { id: None, name: "Laptop".into(), price: 1200.0 };
//! laptop.save(&products).await?;
//!
//! let cheap = products
//!     .filter(filters! { "price__lt" => 100 })
//!     .order_by(["-price"])
//!     .fetch()
//!     .await?;
//! println!("{} cheap products", cheap.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

// Driver layer
pub mod firestore;

// Document mapper
pub mod odm {
    //! Typed documents, managers and queries

    pub mod atomic;
    pub mod database;
    pub mod document;
    pub mod lookup;
    pub mod manager;
    pub mod options;
    pub mod paginator;
    pub mod query;
    pub mod subcollection;

    pub use database::Database;
    pub use document::{Document, DocumentExt};
    pub use lookup::{Filters, Lookup};
    pub use manager::Manager;
    pub use options::{Meta, Options};
    pub use paginator::{Page, Paginator};
    pub use query::Query;
    pub use subcollection::Subcollection;
}

// Re-exports for convenience
pub use error::{FirestoreError, OdmError, Result};
pub use odm::atomic;
pub use odm::{
    Database, Document, DocumentExt, Filters, Lookup, Manager, Meta, Page, Paginator, Query,
    Subcollection,
};

//! Firestore DocumentReference type

use super::collection_reference::CollectionReference;
use super::document_snapshot::DocumentSnapshot;
use super::driver::Driver;
use super::field_value::Fields;
use super::write_batch::UpdateData;
use crate::error::FirestoreError;
use std::fmt;
use std::sync::Arc;

/// Reference to a Firestore document
#[derive(Clone)]
pub struct DocumentReference {
    /// Full document path (e.g., "users/alice")
    pub path: String,
    driver: Arc<dyn Driver>,
}

impl DocumentReference {
    /// Create a new document reference
    pub fn new(path: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self {
            path: path.into(),
            driver,
        }
    }

    /// Get the document ID (last segment of path)
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Get the parent collection path
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Reference to a subcollection of this document
    pub fn collection(&self, collection_id: &str) -> CollectionReference {
        CollectionReference::new(
            format!("{}/{}", self.path, collection_id),
            self.driver.clone(),
        )
    }

    /// Set document data, replacing whatever is stored
    pub async fn set(&self, data: Fields) -> Result<(), FirestoreError> {
        tracing::debug!(target: "firestore_odm::driver", path = %self.path, "set document");
        self.driver.set_document(&self.path, data).await
    }

    /// Update document fields
    ///
    /// Fails with `NotFound` when the document does not exist.
    pub async fn update(&self, update: impl Into<UpdateData>) -> Result<(), FirestoreError> {
        let update = update.into();
        tracing::debug!(
            target: "firestore_odm::driver",
            path = %self.path,
            fields = ?update.field_paths(),
            "update document"
        );
        self.driver.update_document(&self.path, update).await
    }

    /// Delete document
    pub async fn delete(&self) -> Result<(), FirestoreError> {
        tracing::debug!(target: "firestore_odm::driver", path = %self.path, "delete document");
        self.driver.delete_document(&self.path).await
    }

    /// Get document snapshot
    ///
    /// A missing document yields a snapshot whose `exists()` is false.
    pub async fn get(&self) -> Result<DocumentSnapshot, FirestoreError> {
        tracing::debug!(target: "firestore_odm::driver", path = %self.path, "get document");
        Ok(self
            .driver
            .get_document(&self.path)
            .await?
            .unwrap_or_else(|| DocumentSnapshot::missing(self.path.clone())))
    }
}

impl fmt::Debug for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentReference")
            .field("path", &self.path)
            .finish()
    }
}

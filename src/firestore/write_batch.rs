//! Firestore WriteBatch type
//!
//! Accumulates writes and applies them with a single atomic commit. If any
//! write fails (e.g. an update of a missing document) none are applied.

use super::driver::Driver;
use super::field_value::{FieldTransform, Fields};
use crate::error::FirestoreError;
use std::sync::Arc;

/// Payload of a partial update: plain field values plus field transforms
///
/// Keys are field paths; a dotted key (`nested.name`) updates one nested
/// field without touching its siblings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateData {
    /// Field paths to overwrite with the given values
    pub fields: Fields,
    /// Server-side transforms, applied after `fields`
    pub transforms: Vec<(String, FieldTransform)>,
}

impl UpdateData {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field path to a value
    pub fn set(mut self, field_path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field_path.into(), value.into());
        self
    }

    /// Add a transform on one field path
    pub fn transform(mut self, field_path: impl Into<String>, transform: FieldTransform) -> Self {
        self.transforms.push((field_path.into(), transform));
        self
    }

    /// True when the update would change nothing
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.transforms.is_empty()
    }

    /// Every field path touched by this update
    pub fn field_paths(&self) -> Vec<String> {
        self.fields
            .keys()
            .cloned()
            .chain(self.transforms.iter().map(|(path, _)| path.clone()))
            .collect()
    }
}

impl From<Fields> for UpdateData {
    fn from(fields: Fields) -> Self {
        Self {
            fields,
            transforms: Vec::new(),
        }
    }
}

/// Write operations for batch writes
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    /// Set (overwrite) a document
    Set {
        /// Document path
        path: String,
        /// Document data
        data: Fields,
    },
    /// Update specific fields of an existing document
    Update {
        /// Document path
        path: String,
        /// Fields and transforms to apply
        update: UpdateData,
    },
    /// Delete a document
    Delete {
        /// Document path to delete
        path: String,
    },
}

impl WriteOperation {
    /// Path of the document this write targets
    pub fn path(&self) -> &str {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// Write batch for atomic operations
pub struct WriteBatch {
    operations: Vec<WriteOperation>,
    driver: Arc<dyn Driver>,
}

impl WriteBatch {
    /// Create an empty batch committing through `driver`
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            operations: Vec::new(),
            driver,
        }
    }

    /// Stage an already built write
    pub fn push(&mut self, operation: WriteOperation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Set document data (overwrites existing document)
    pub fn set(&mut self, path: impl Into<String>, data: Fields) -> &mut Self {
        self.push(WriteOperation::Set {
            path: path.into(),
            data,
        })
    }

    /// Update document fields (document must exist at commit time)
    pub fn update(&mut self, path: impl Into<String>, update: UpdateData) -> &mut Self {
        self.push(WriteOperation::Update {
            path: path.into(),
            update,
        })
    }

    /// Delete document
    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.push(WriteOperation::Delete { path: path.into() })
    }

    /// Commit the batch
    ///
    /// Commits all batched write operations atomically. If any operation
    /// fails, none of the operations are applied.
    ///
    /// # Errors
    /// Returns `FirestoreError` if:
    /// - Batch is empty (nothing to commit)
    /// - The driver rejects any write (entire batch is rolled back)
    pub async fn commit(self) -> Result<(), FirestoreError> {
        if self.operations.is_empty() {
            return Err(FirestoreError::InvalidArgument(
                "Cannot commit empty batch".to_string(),
            ));
        }
        self.driver.commit(self.operations).await
    }

    /// Staged operations, in the order they were added
    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    /// Check if batch is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Get number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

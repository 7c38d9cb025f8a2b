//! Firestore DocumentSnapshot type

use super::field_value::{get_path, Fields};
use serde_json::Value;

/// Point-in-time read of one document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// Full document path (e.g., "products/abc")
    pub path: String,

    /// Document data (None if document doesn't exist)
    pub data: Option<Fields>,
}

impl DocumentSnapshot {
    /// Snapshot of an existing document
    pub fn new(path: impl Into<String>, data: Fields) -> Self {
        Self {
            path: path.into(),
            data: Some(data),
        }
    }

    /// Snapshot of a document that does not exist
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
        }
    }

    /// Check if document exists
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Get a field value by dotted path
    pub fn get(&self, field: &str) -> Option<&Value> {
        let Some(data) = &self.data else {
            return None;
        };
        get_path(data, field)
    }

    /// Get document ID (last segment of path)
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Consume the snapshot, keeping its data
    pub fn into_data(self) -> Option<Fields> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_id_is_last_segment() {
        let snapshot = DocumentSnapshot::missing("products/abc/reviews/xyz");
        assert_eq!(snapshot.id(), "xyz");
        assert!(!snapshot.exists());
    }

    #[test]
    fn test_snapshot_get_nested() {
        let data = json!({"nested": {"name": "a"}}).as_object().cloned().unwrap();
        let snapshot = DocumentSnapshot::new("items/1", data);
        assert!(snapshot.exists());
        assert_eq!(snapshot.get("nested.name"), Some(&json!("a")));
        assert_eq!(snapshot.get("missing"), None);
    }
}

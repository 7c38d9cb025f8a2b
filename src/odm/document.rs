//! Document model
//!
//! A document type is a serde struct whose primary key serializes under
//! `id`. Implementing [`Document`] is all that is needed to store it:
//!
//! ```
//! use firestore_odm::Document;
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
//! ```
//!
//! Instance-level persistence lives on [`DocumentExt`], implemented for
//! every document type.

use super::manager::Manager;
use super::options::{short_type_name, Meta, PK_FIELD};
use crate::error::{OdmError, Result};
use crate::firestore::{Fields, UpdateData};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// A typed record stored in one collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Primary key; `None` until the document has been saved
    fn pk(&self) -> Option<&str>;

    /// Adopt a primary key assigned on creation
    fn set_pk(&mut self, pk: String);

    /// Type-level declarations (collection name)
    fn meta() -> Meta {
        Meta::default()
    }
}

/// Serialize a document's fields, without its primary key
pub fn to_fields<D: Document>(document: &D) -> Result<Fields> {
    let mut fields = match serde_json::to_value(document)? {
        Value::Object(map) => map,
        other => {
            return Err(OdmError::InvalidDocument(format!(
                "{} serialized to {} instead of a map",
                short_type_name::<D>(),
                json_kind(&other)
            )))
        }
    };
    let serialized_pk = fields.remove(PK_FIELD);
    if let Some(pk) = document.pk() {
        if serialized_pk.as_ref().and_then(Value::as_str) != Some(pk) {
            return Err(OdmError::MissingPrimaryKey {
                document_type: short_type_name::<D>(),
            });
        }
    }
    Ok(fields)
}

/// Build a document from stored fields and its primary key
pub fn from_fields<D: Document>(pk: &str, mut fields: Fields) -> Result<D> {
    fields.insert(PK_FIELD.to_string(), Value::String(pk.to_string()));
    let document: D = serde_json::from_value(Value::Object(fields))?;
    if document.pk() != Some(pk) {
        return Err(OdmError::MissingPrimaryKey {
            document_type: short_type_name::<D>(),
        });
    }
    Ok(document)
}

/// Serialize any value that must be a map (document data, cursors)
pub fn to_map<T: Serialize + ?Sized>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(OdmError::InvalidDocument(format!(
            "expected a map, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}

/// Persistence operations on document instances
///
/// Every operation goes through the given manager, so the same value can be
/// saved into a top-level collection or a subcollection.
pub trait DocumentExt: Document + Sized {
    /// Create the document (no pk) or overwrite its fields (pk set)
    ///
    /// Every field except the pk is written. A new document adopts the pk
    /// the store allocated.
    fn save<'a>(
        &'a mut self,
        manager: &'a Manager<Self>,
    ) -> impl Future<Output = Result<&'a mut Self>> + Send + 'a;

    /// Partially update the stored document; local fields are left alone
    fn update<'a>(
        &'a self,
        manager: &'a Manager<Self>,
        update: impl Into<UpdateData> + Send + 'a,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Reload every field from the store
    fn refresh<'a>(
        &'a mut self,
        manager: &'a Manager<Self>,
    ) -> impl Future<Output = Result<()>> + Send + 'a;

    /// Delete the stored document; the local pk stays set
    fn delete<'a>(&'a self, manager: &'a Manager<Self>) -> impl Future<Output = Result<()>> + Send + 'a;

    /// `<Type pk=...>`
    fn describe(&self) -> String;
}

fn require_pk<D: Document>(document: &D, operation: &'static str) -> Result<String> {
    document
        .pk()
        .filter(|pk| !pk.is_empty())
        .map(str::to_string)
        .ok_or(OdmError::UnsavedDocument {
            operation,
            document_type: short_type_name::<D>(),
        })
}

impl<D: Document> DocumentExt for D {
    fn save<'a>(
        &'a mut self,
        manager: &'a Manager<Self>,
    ) -> impl Future<Output = Result<&'a mut Self>> + Send + 'a {
        async move {
            let fields = to_fields(self)?;
            match self.pk().filter(|pk| !pk.is_empty()).map(str::to_string) {
                Some(pk) => manager.update(&pk, fields).await?,
                None => {
                    let created = manager.create(&fields, None).await?;
                    if let Some(pk) = created.pk() {
                        self.set_pk(pk.to_string());
                    }
                }
            }
            Ok(self)
        }
    }

    fn update<'a>(
        &'a self,
        manager: &'a Manager<Self>,
        update: impl Into<UpdateData> + Send + 'a,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let pk = require_pk(self, "update")?;
            manager.update(&pk, update).await
        }
    }

    fn refresh<'a>(
        &'a mut self,
        manager: &'a Manager<Self>,
    ) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let pk = require_pk(self, "refresh")?;
            *self = manager.get_pk(&pk).await?;
            Ok(())
        }
    }

    fn delete<'a>(&'a self, manager: &'a Manager<Self>) -> impl Future<Output = Result<()>> + Send + 'a {
        async move {
            let pk = require_pk(self, "delete")?;
            manager.delete(&pk).await
        }
    }

    fn describe(&self) -> String {
        format!(
            "<{} pk={}>",
            short_type_name::<D>(),
            self.pk().unwrap_or("None")
        )
    }
}

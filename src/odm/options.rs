//! Per-type document metadata
//!
//! [`Options`] are computed once per document type, the first time the type
//! is registered, and shared afterwards through a process-wide registry.

use super::document::Document;
use crate::error::{OdmError, Result};
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Serialized name of the primary key
pub const PK_FIELD: &str = "id";

/// Optional declarations a document type can make
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    /// Collection name; defaults to the lower-cased type name
    pub collection_name: Option<&'static str>,
}

impl Meta {
    /// Declare an explicit collection name
    pub const fn collection(name: &'static str) -> Self {
        Self {
            collection_name: Some(name),
        }
    }
}

/// Resolved metadata of one document type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Short type name, used in errors and debug output
    pub document_type: &'static str,
    /// Collection the type's documents live in
    pub collection_name: String,
    /// Key the primary key is serialized under
    pub pk_field_name: &'static str,
}

static OPTIONS: Lazy<RwLock<HashMap<TypeId, Arc<Options>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Last path segment of a type name, without generic arguments
pub fn short_type_name<D: ?Sized>() -> &'static str {
    let full = std::any::type_name::<D>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl Options {
    /// Resolve options from a type's declarations
    pub fn resolve<D: Document>() -> Result<Self> {
        let document_type = short_type_name::<D>();
        let collection_name = match D::meta().collection_name {
            Some(name) => name.to_string(),
            None => document_type.to_lowercase(),
        };

        let invalid = |reason: &str| OdmError::InvalidDefinition {
            document_type,
            reason: reason.to_string(),
        };
        if collection_name.trim().is_empty() {
            return Err(invalid("collection name is empty"));
        }
        if collection_name.contains('/') {
            return Err(invalid("collection name must not contain `/`"));
        }

        Ok(Self {
            document_type,
            collection_name,
            pk_field_name: PK_FIELD,
        })
    }

    /// Options of `D`, computed on first use and cached
    pub fn of<D: Document>() -> Result<Arc<Self>> {
        let type_id = TypeId::of::<D>();
        if let Some(options) = OPTIONS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
        {
            return Ok(options.clone());
        }

        let resolved = Arc::new(Self::resolve::<D>()?);
        let mut registry = OPTIONS.write().unwrap_or_else(PoisonError::into_inner);
        Ok(registry.entry(type_id).or_insert(resolved).clone())
    }
}

//! Typed subcollection descriptor
//!
//! Declared on the parent type, usually as an associated const:
//!
//! ```
//! use firestore_odm::{Document, Subcollection};
//! # use serde::{Deserialize, Serialize};
//! # #[derive(Serialize, Deserialize)]
//! # struct Product { id: Option<String> }
//! # impl Document for Product {
//! #     fn pk(&self) -> Option<&str> { self.id.as_deref() }
//! #     fn set_pk(&mut self, pk: String) { self.id = Some(pk); }
//! # }
//! # #[derive(Serialize, Deserialize)]
//! # struct Review { id: Option<String>, stars: u8 }
//! # impl Document for Review {
//! #     fn pk(&self) -> Option<&str> { self.id.as_deref() }
//! #     fn set_pk(&mut self, pk: String) { self.id = Some(pk); }
//! # }
//! impl Product {
//!     const REVIEWS: Subcollection<Review> = Subcollection::new("reviews");
//! }
//! ```

use super::document::Document;
use super::manager::Manager;
use super::options::short_type_name;
use crate::error::{OdmError, Result};
use std::fmt;
use std::marker::PhantomData;

/// Subcollection of `C` documents under each parent document
pub struct Subcollection<C> {
    name: &'static str,
    _child: PhantomData<fn() -> C>,
}

impl<C> Clone for Subcollection<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Subcollection<C> {}

impl<C: Document> Subcollection<C> {
    /// Descriptor for the subcollection `name`
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _child: PhantomData,
        }
    }

    /// Subcollection name under each parent document
    pub fn collection_name(&self) -> &'static str {
        self.name
    }

    /// Short name of the child type
    pub fn document_type(&self) -> &'static str {
        short_type_name::<C>()
    }

    /// Manager of this subcollection under `parent`
    ///
    /// # Errors
    /// `ParentNotSaved` when `parent` has no pk yet.
    pub fn of<P: Document>(&self, parent_manager: &Manager<P>, parent: &P) -> Result<Manager<C>> {
        let parent_pk = parent
            .pk()
            .filter(|pk| !pk.is_empty())
            .ok_or_else(|| OdmError::ParentNotSaved {
                parent_type: parent_manager.document_type(),
                collection: self.name.to_string(),
            })?;
        parent_manager.child_named::<C>(parent_pk, self.name)
    }
}

impl<C> fmt::Debug for Subcollection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subcollection").field("name", &self.name).finish()
    }
}

//! Per-type gateway to a collection
//!
//! A [`Manager`] is bound to one document type and, for subcollections, to
//! one parent document. It performs single-document CRUD and hands out
//! [`Query`] values for everything that reads more than one document.
//!
//! Writes go through the active [batch](super::atomic::batch) when one is
//! open in the current task.

use super::atomic;
use super::document::{from_fields, to_map, Document};
use super::lookup::{Filters, Lookup};
use super::options::{Options, PK_FIELD};
use super::paginator::Paginator;
use super::query::Query;
use crate::error::{OdmError, Result};
use crate::firestore::{
    ClientProvider, CollectionReference, DocumentSnapshot, Driver, UpdateData, WriteOperation,
};
use serde::Serialize;
use serde_json::Number;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Live subcollection managers by child type and collection path
type SubcollectionCache = HashMap<(TypeId, String), Weak<ManagerInner>>;

struct ManagerInner {
    options: Arc<Options>,
    provider: ClientProvider,
    parent_path: Option<String>,
    subcollections: Mutex<SubcollectionCache>,
}

/// CRUD gateway for one document type
pub struct Manager<D> {
    inner: Arc<ManagerInner>,
    _document: PhantomData<fn() -> D>,
}

impl<D> Clone for Manager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _document: PhantomData,
        }
    }
}

impl<D: Document> Manager<D> {
    pub(crate) fn new(
        options: Arc<Options>,
        provider: ClientProvider,
        parent_path: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                options,
                provider,
                parent_path,
                subcollections: Mutex::new(HashMap::new()),
            }),
            _document: PhantomData,
        }
    }

    /// Metadata of the managed type
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Short name of the managed type
    pub fn document_type(&self) -> &'static str {
        self.inner.options.document_type
    }

    /// Collection name, without any parent prefix
    pub fn collection_name(&self) -> &str {
        &self.inner.options.collection_name
    }

    /// Path of the parent document for subcollection managers
    pub fn parent_path(&self) -> Option<&str> {
        self.inner.parent_path.as_deref()
    }

    /// Full collection path (`products` or `products/abc/reviews`)
    pub fn collection_path(&self) -> String {
        match &self.inner.parent_path {
            Some(parent) => format!("{}/{}", parent, self.collection_name()),
            None => self.collection_name().to_string(),
        }
    }

    /// True when both handles share one registration
    pub fn same_manager(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The shared driver
    pub async fn client(&self) -> Result<Arc<dyn Driver>> {
        Ok(self.inner.provider.client().await?)
    }

    /// Reference to the managed collection
    pub async fn collection(&self) -> Result<CollectionReference> {
        Ok(CollectionReference::new(self.collection_path(), self.client().await?))
    }

    /// `pk` when it can address a document of this collection
    fn checked_pk<'a>(&self, pk: &'a str) -> Result<&'a str> {
        if pk.is_empty() || pk.contains('/') {
            return Err(OdmError::InvalidPrimaryKey {
                document_type: self.document_type(),
                pk: pk.to_string(),
            });
        }
        Ok(pk)
    }

    pub(crate) fn to_document(&self, snapshot: DocumentSnapshot) -> Result<D> {
        let id = snapshot.id().to_string();
        let data = snapshot.into_data().ok_or_else(|| OdmError::DoesNotExist {
            document_type: self.document_type(),
            lookup: Lookup::Pk(id.clone()),
        })?;
        from_fields(&id, data)
    }

    /// Fetch one document by pk or by filters
    ///
    /// # Errors
    /// - `PkWithFilters` when both are given
    /// - `DoesNotExist` when nothing matches
    /// - `MultipleObjectsFound` when the filters match more than one document
    pub async fn get(&self, pk: Option<&str>, filters: Filters) -> Result<D> {
        match pk.filter(|pk| !pk.is_empty()) {
            Some(_) if !filters.is_empty() => Err(OdmError::PkWithFilters),
            Some(pk) => self.get_pk(pk).await,
            None => self.get_by(filters).await,
        }
    }

    /// Fetch one document by primary key
    pub async fn get_pk(&self, pk: &str) -> Result<D> {
        let pk = self.checked_pk(pk)?;
        tracing::debug!(
            target: "firestore_odm::manager",
            document_type = self.document_type(),
            pk,
            "get"
        );
        let snapshot = self.collection().await?.document(Some(pk)).get().await?;
        if !snapshot.exists() {
            return Err(OdmError::DoesNotExist {
                document_type: self.document_type(),
                lookup: Lookup::Pk(pk.to_string()),
            });
        }
        self.to_document(snapshot)
    }

    /// Fetch the single document matching `filters`
    pub async fn get_by(&self, filters: Filters) -> Result<D> {
        self.filter(filters).get().await
    }

    /// Store a new document and return it
    ///
    /// `data` must serialize to a map; an `id` key in it is ignored. The pk
    /// is allocated by the driver unless given. Inside a batch the write is
    /// staged and the returned document already carries its pk. A given pk
    /// containing `/` fails with [`OdmError::InvalidPrimaryKey`].
    pub async fn create<T>(&self, data: &T, pk: Option<&str>) -> Result<D>
    where
        T: Serialize + ?Sized,
    {
        let pk = pk
            .filter(|pk| !pk.is_empty())
            .map(|pk| self.checked_pk(pk))
            .transpose()?;
        let mut fields = to_map(data)?;
        fields.remove(PK_FIELD);

        let doc_ref = self.collection().await?.document(pk);
        let document = from_fields(doc_ref.id(), fields.clone())?;

        tracing::debug!(
            target: "firestore_odm::manager",
            document_type = self.document_type(),
            path = %doc_ref.path,
            "create"
        );
        let write = WriteOperation::Set {
            path: doc_ref.path.clone(),
            data: fields,
        };
        if let Some(WriteOperation::Set { data, .. }) = self.stage(write)? {
            doc_ref.set(data).await?;
        }
        Ok(document)
    }

    /// Partially update a stored document
    ///
    /// Accepts plain fields (`Fields`) or an [`UpdateData`] carrying field
    /// transforms. Fails with a driver `NotFound` when the document is
    /// missing (at commit time inside a batch).
    pub async fn update(&self, pk: &str, update: impl Into<UpdateData>) -> Result<()> {
        let pk = self.checked_pk(pk)?;
        let update = update.into();
        let doc_ref = self.collection().await?.document(Some(pk));

        tracing::debug!(
            target: "firestore_odm::manager",
            document_type = self.document_type(),
            path = %doc_ref.path,
            fields = ?update.field_paths(),
            "update"
        );
        let write = WriteOperation::Update {
            path: doc_ref.path.clone(),
            update,
        };
        if let Some(WriteOperation::Update { update, .. }) = self.stage(write)? {
            doc_ref.update(update).await?;
        }
        Ok(())
    }

    /// Delete a stored document; deleting a missing document succeeds
    pub async fn delete(&self, pk: &str) -> Result<()> {
        let pk = self.checked_pk(pk)?;
        let doc_ref = self.collection().await?.document(Some(pk));

        tracing::debug!(
            target: "firestore_odm::manager",
            document_type = self.document_type(),
            path = %doc_ref.path,
            "delete"
        );
        let write = WriteOperation::Delete {
            path: doc_ref.path.clone(),
        };
        if self.stage(write)?.is_some() {
            doc_ref.delete().await?;
        }
        Ok(())
    }

    fn stage(&self, write: WriteOperation) -> Result<Option<WriteOperation>> {
        atomic::stage(&self.inner.provider, self.document_type(), write)
    }

    /// Query narrowed by `filters`
    pub fn filter(&self, filters: Filters) -> Query<D> {
        Query::new(self.clone()).filter_many(filters)
    }

    /// Query over the whole collection
    pub fn all(&self) -> Query<D> {
        Query::new(self.clone())
    }

    /// Paginator over the whole collection
    pub fn paginate(&self, per_page: usize) -> Paginator<D> {
        self.all().paginate(per_page)
    }

    /// Number of documents in the collection
    pub async fn count(&self) -> Result<u64> {
        self.all().count().await
    }

    /// Sum of a numeric field over the collection
    pub async fn sum(&self, field: &str) -> Result<Number> {
        self.all().sum(field).await
    }

    /// Average of a numeric field; `None` when no document has a number there
    pub async fn avg(&self, field: &str) -> Result<Option<f64>> {
        self.all().avg(field).await
    }

    /// Manager of the subcollection `name` of `C` documents under `parent_pk`
    ///
    /// Handles for one child type and collection path are shared while any
    /// of them is alive.
    pub(crate) fn child_named<C: Document>(&self, parent_pk: &str, name: &str) -> Result<Manager<C>> {
        let parent_pk = self.checked_pk(parent_pk)?;
        let parent_path = format!("{}/{}", self.collection_path(), parent_pk);
        let key = (TypeId::of::<C>(), format!("{}/{}", parent_path, name));

        let mut cache = self
            .inner
            .subcollections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Entries are keyed by the child's TypeId, so a live entry was built for `C`.
        if let Some(inner) = cache.get(&key).and_then(Weak::upgrade) {
            return Ok(Manager {
                inner,
                _document: PhantomData,
            });
        }

        let mut options = Options::clone(&*Options::of::<C>()?);
        if name.is_empty() || name.contains('/') {
            return Err(OdmError::InvalidDefinition {
                document_type: options.document_type,
                reason: format!("invalid subcollection name `{}`", name),
            });
        }
        options.collection_name = name.to_string();

        tracing::debug!(
            target: "firestore_odm::manager",
            document_type = options.document_type,
            parent = %parent_path,
            collection = name,
            "subcollection manager"
        );
        let manager = Manager::<C>::new(
            Arc::new(options),
            self.inner.provider.clone(),
            Some(parent_path),
        );
        cache.retain(|_, entry| entry.strong_count() > 0);
        cache.insert(key, Arc::downgrade(&manager.inner));
        Ok(manager)
    }
}

impl<D> fmt::Debug for Manager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("document_type", &self.inner.options.document_type)
            .field("collection", &self.inner.options.collection_name)
            .field("parent", &self.inner.parent_path)
            .finish()
    }
}

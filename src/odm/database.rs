//! Manager registry
//!
//! A [`Database`] owns the [`ClientProvider`] all of its managers share and
//! registers one top-level [`Manager`] per document type. Options are
//! computed once, the first time a type is registered.

use super::document::Document;
use super::manager::Manager;
use super::options::Options;
use crate::error::Result;
use crate::firestore::{ClientProvider, Driver};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

struct DatabaseInner {
    provider: ClientProvider,
    managers: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

/// Entry point: a client provider plus one manager per document type
///
/// Cloning a `Database` shares its provider and registry.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Database over the given provider
    pub fn new(provider: ClientProvider) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                provider,
                managers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Database over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(ClientProvider::in_memory())
    }

    /// Database over an existing driver
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Self::new(ClientProvider::from_driver(driver))
    }

    /// Database connecting over gRPC on first use
    #[cfg(feature = "grpc")]
    pub fn connect_lazy(settings: crate::firestore::Settings) -> Self {
        Self::new(ClientProvider::from_settings(settings))
    }

    /// The shared client provider
    pub fn provider(&self) -> &ClientProvider {
        &self.inner.provider
    }

    /// The driver, created on first use
    pub async fn client(&self) -> Result<Arc<dyn Driver>> {
        Ok(self.inner.provider.client().await?)
    }

    /// Top-level manager of `D`, registering it on first use
    ///
    /// # Errors
    /// `InvalidDefinition` when `D`'s declarations are unusable.
    pub fn manager<D: Document>(&self) -> Result<Manager<D>> {
        let type_id = TypeId::of::<D>();
        let registered = self
            .inner
            .managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .and_then(|entry| entry.downcast_ref::<Manager<D>>())
            .cloned();
        if let Some(manager) = registered {
            return Ok(manager);
        }

        let options = Options::of::<D>()?;
        let mut managers = self
            .inner
            .managers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = managers
            .get(&type_id)
            .and_then(|entry| entry.downcast_ref::<Manager<D>>())
        {
            return Ok(existing.clone());
        }

        tracing::debug!(
            target: "firestore_odm::database",
            document_type = options.document_type,
            collection = %options.collection_name,
            "registered document type"
        );
        let manager = Manager::<D>::new(options, self.inner.provider.clone(), None);
        managers.insert(type_id, Box::new(manager.clone()));
        Ok(manager)
    }

    /// Number of registered document types
    pub fn registered_types(&self) -> usize {
        self.inner
            .managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("provider", &self.inner.provider)
            .field("registered_types", &self.registered_types())
            .finish()
    }
}

//! Lazily initialised driver handle
//!
//! A [`ClientProvider`] creates its driver on first use and hands out the
//! same `Arc<dyn Driver>` afterwards. Concurrent first calls race on a
//! `tokio::sync::OnceCell`, so the factory runs at most once per provider
//! even when several tasks ask for the client at the same time.

use super::driver::Driver;
use super::in_memory::InMemoryDriver;
use crate::error::FirestoreError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Factory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Driver>, FirestoreError>> + Send + Sync>;

struct ProviderInner {
    client: OnceCell<Arc<dyn Driver>>,
    factory: Factory,
}

/// Shared, lazily created driver handle
///
/// Cloning a provider shares the underlying client.
#[derive(Clone)]
pub struct ClientProvider {
    inner: Arc<ProviderInner>,
}

impl ClientProvider {
    /// Provider creating its driver with `factory` on first use
    ///
    /// # Example
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use firestore_odm::firestore::{ClientProvider, Driver, InMemoryDriver};
    /// let provider = ClientProvider::new(|| async {
    ///     Ok(Arc::new(InMemoryDriver::new()) as Arc<dyn Driver>)
    /// });
    /// ```
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Arc<dyn Driver>, FirestoreError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(ProviderInner {
                client: OnceCell::new(),
                factory: Box::new(move || Box::pin(factory())),
            }),
        }
    }

    /// Provider wrapping an already built driver
    pub fn from_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                client: OnceCell::new_with(Some(driver.clone())),
                factory: Box::new(move || {
                    let driver = driver.clone();
                    Box::pin(async move { Ok(driver) })
                }),
            }),
        }
    }

    /// Provider over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::from_driver(Arc::new(InMemoryDriver::new()))
    }

    /// Provider connecting to Firestore over gRPC on first use
    #[cfg(feature = "grpc")]
    pub fn from_settings(settings: super::settings::Settings) -> Self {
        Self::new(move || {
            let settings = settings.clone();
            async move {
                let driver = super::grpc::GrpcDriver::connect(settings).await?;
                Ok(Arc::new(driver) as Arc<dyn Driver>)
            }
        })
    }

    /// The driver, creating it if this is the first call
    pub async fn client(&self) -> Result<Arc<dyn Driver>, FirestoreError> {
        let client = self
            .inner
            .client
            .get_or_try_init(|| async {
                tracing::info!(target: "firestore_odm::provider", "initialising document store client");
                (self.inner.factory)().await
            })
            .await?;
        Ok(client.clone())
    }

    /// Whether the driver has been created yet
    pub fn is_initialized(&self) -> bool {
        self.inner.client.initialized()
    }

    /// True when both handles share one client
    pub fn same_provider(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProvider")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = ClientProvider::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(Arc::new(InMemoryDriver::new()) as Arc<dyn Driver>) }
        });
        assert!(!provider.is_initialized());

        let other = provider.clone();
        let (a, b) = tokio::join!(provider.client(), other.client());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(provider.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_init_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = ClientProvider::new(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(FirestoreError::Unavailable)
                } else {
                    Ok(Arc::new(InMemoryDriver::new()) as Arc<dyn Driver>)
                }
            }
        });
        assert!(provider.client().await.is_err());
        assert!(provider.client().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_driver_is_initialized() {
        assert!(ClientProvider::in_memory().is_initialized());
    }

    #[test]
    fn test_clones_share_one_client() {
        let provider = ClientProvider::in_memory();
        let clone = provider.clone();
        assert!(provider.same_provider(&clone));
        assert!(!provider.same_provider(&ClientProvider::in_memory()));

        let a = tokio_test::block_on(provider.client()).unwrap();
        let b = tokio_test::block_on(clone.client()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

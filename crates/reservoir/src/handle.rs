//! Per-borrow handle guarding a pooled resource.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pool::PoolCore;
use crate::resource::Factory;

/// Per-borrow proxy for a pooled resource.
///
/// Every capability of the underlying resource is reached through
/// [`get`](Handle::get) / [`get_mut`](Handle::get_mut), which refuse
/// with [`Error::InvalidState`] once the resource has been returned or
/// the pool has shut down: one guarded accessor instead of one wrapper
/// per operation family.
///
/// Dropping a handle returns the resource on a spawned task, so it
/// must happen inside a tokio runtime. [`release`](Handle::release)
/// does the same work inline and is the preferred path.
pub struct Handle<F: Factory> {
    resource: Option<F::Resource>,
    id: u64,
    core: Arc<PoolCore<F>>,
}

impl<F: Factory> Handle<F> {
    pub(crate) fn new(core: Arc<PoolCore<F>>, id: u64, resource: F::Resource) -> Self {
        Self {
            resource: Some(resource),
            id,
            core,
        }
    }

    /// Whether the handle is still backed by a live borrow.
    pub fn is_valid(&self) -> bool {
        self.resource.is_some() && !self.core.is_shut_down()
    }

    /// Borrow the underlying resource.
    ///
    /// # Errors
    /// [`Error::InvalidState`] once the resource has been returned or
    /// the pool has shut down.
    pub fn get(&self) -> Result<&F::Resource> {
        if self.core.is_shut_down() {
            return Err(Error::InvalidState);
        }
        self.resource.as_ref().ok_or(Error::InvalidState)
    }

    /// Mutably borrow the underlying resource.
    ///
    /// # Errors
    /// [`Error::InvalidState`], as for [`get`](Handle::get).
    pub fn get_mut(&mut self) -> Result<&mut F::Resource> {
        if self.core.is_shut_down() {
            return Err(Error::InvalidState);
        }
        self.resource.as_mut().ok_or(Error::InvalidState)
    }

    /// Return the resource to the pool.
    ///
    /// Never waits for capacity: the resource is re-queued if it is
    /// still open, closed otherwise.
    pub async fn release(mut self) {
        if let Some(resource) = self.resource.take() {
            let core = Arc::clone(&self.core);
            core.return_resource(self.id, resource).await;
        }
    }

    /// Detach the resource from the pool and take ownership of it.
    ///
    /// The pool gives up the allocation slot as if the resource had
    /// been discarded, but the resource itself is handed over
    /// un-closed.
    #[must_use]
    pub fn into_inner(mut self) -> F::Resource {
        let resource = self
            .resource
            .take()
            .expect("handle resource taken exactly once");
        self.core.forget(self.id);
        resource
    }

    pub(crate) fn is_from(&self, core: &Arc<PoolCore<F>>) -> bool {
        Arc::ptr_eq(&self.core, core)
    }

    pub(crate) fn take_parts(mut self) -> Option<(u64, F::Resource)> {
        self.resource.take().map(|resource| (self.id, resource))
    }
}

impl<F: Factory> fmt::Debug for Handle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

impl<F: Factory> Drop for Handle<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            let core = Arc::clone(&self.core);
            let id = self.id;
            // Drop cannot await; return on a background task instead.
            drop(tokio::spawn(async move {
                core.return_resource(id, resource).await;
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::PoolConfig;
    use crate::error::Error;
    use crate::pool::Pool;
    use crate::resource::Resource;
    use crate::testing::TestFactory;

    fn pool() -> (Pool<TestFactory>, TestFactory) {
        let factory = TestFactory::default();
        let pool = Pool::new(factory.clone(), PoolConfig::default()).unwrap();
        (pool, factory)
    }

    #[tokio::test]
    async fn guarded_access_while_valid() {
        let (pool, _factory) = pool();
        let mut handle = pool.acquire().await.unwrap();
        assert!(handle.is_valid());
        assert!(handle.get().unwrap().is_open());
        handle.get_mut().unwrap().set_open(true);
        handle.release().await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_invalidates_outstanding_handles() {
        let (pool, _factory) = pool();
        let handle = pool.acquire().await.unwrap();
        pool.shutdown().await;

        assert!(!handle.is_valid());
        assert!(matches!(handle.get(), Err(Error::InvalidState)));
        handle.release().await;
    }

    #[tokio::test]
    async fn into_inner_detaches_without_closing() {
        let (pool, factory) = pool();
        let handle = pool.acquire().await.unwrap();
        assert_eq!(pool.size(), 1);

        let resource = handle.into_inner();
        assert!(resource.is_open());
        assert_eq!(pool.size(), 0);
        assert_eq!(factory.closed(), 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn debug_omits_the_resource() {
        let (pool, _factory) = pool();
        let handle = pool.acquire().await.unwrap();
        let rendered = format!("{handle:?}");
        assert!(rendered.contains("valid: true"));
        handle.release().await;
        pool.shutdown().await;
    }
}

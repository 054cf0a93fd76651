//! Test doubles for exercising pools without a real backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{CloseError, Error, Result};
use crate::resource::{Factory, Resource};

/// In-memory resource driven by tests: liveness can be toggled and
/// close failures injected.
#[derive(Debug)]
pub struct TestResource {
    serial: usize,
    open: bool,
    fail_close: bool,
    closed: Arc<AtomicUsize>,
}

impl TestResource {
    /// Creation order of this resource within its factory, from 0.
    pub fn serial(&self) -> usize {
        self.serial
    }

    /// Toggle the liveness flag reported by `is_open`.
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }
}

impl Resource for TestResource {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> std::result::Result<(), CloseError> {
        self.open = false;
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(CloseError::new("injected close failure"));
        }
        Ok(())
    }
}

/// Factory double: counts creations, shares a close counter with every
/// resource it makes, and fails on demand.
///
/// Clones share their counters, so tests keep a clone for assertions
/// after handing the factory to a pool.
#[derive(Debug, Default, Clone)]
pub struct TestFactory {
    created: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
}

impl TestFactory {
    /// Number of resources created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of resources closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Make the next `create` call fail with a connect error.
    pub fn fail_next_connect(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make every resource created from now on fail its `close`.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }
}

impl Factory for TestFactory {
    type Resource = TestResource;

    async fn create(&self) -> Result<TestResource> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::connect(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "injected connect failure",
            )));
        }
        Ok(TestResource {
            serial: self.created.fetch_add(1, Ordering::SeqCst),
            open: true,
            fail_close: self.fail_close.load(Ordering::SeqCst),
            closed: Arc::clone(&self.closed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_counts_creations() {
        let factory = TestFactory::default();
        let first = factory.create().await.unwrap();
        let second = factory.create().await.unwrap();
        assert_eq!(first.serial(), 0);
        assert_eq!(second.serial(), 1);
        assert_eq!(factory.created(), 2);
    }

    #[tokio::test]
    async fn close_is_counted_and_can_fail() {
        let factory = TestFactory::default();
        let mut resource = factory.create().await.unwrap();
        resource.close().await.unwrap();
        assert!(!resource.is_open());
        assert_eq!(factory.closed(), 1);

        factory.fail_close();
        let mut flaky = factory.create().await.unwrap();
        assert!(flaky.close().await.is_err());
        assert_eq!(factory.closed(), 2);
    }

    #[tokio::test]
    async fn connect_failure_is_one_shot() {
        let factory = TestFactory::default();
        factory.fail_next_connect();
        assert!(matches!(
            factory.create().await,
            Err(Error::Connect { .. })
        ));
        assert!(factory.create().await.is_ok());
        assert_eq!(factory.created(), 1);
    }
}

//! Collaborator contracts: pooled resources and their factory.

use crate::error::{CloseError, Result};

/// A pooled resource with an open/close lifecycle.
///
/// Implementations are expensive stateful handles, typically database
/// connections. The pool asks exactly two things of them: whether they
/// can still serve requests, and to tear down when discarded.
pub trait Resource: Send + 'static {
    /// Whether the resource can still serve requests.
    ///
    /// Consulted when a borrow is returned; a `false` answer removes
    /// the resource from the pool instead of re-queueing it. This is a
    /// cheap local liveness flag, not a round-trip health check.
    fn is_open(&self) -> bool;

    /// Tear the resource down, releasing any server-side state.
    ///
    /// The pool's teardown paths (release of a broken resource,
    /// watcher eviction, shutdown) log the error and move on.
    fn close(&mut self) -> impl Future<Output = std::result::Result<(), CloseError>> + Send;
}

/// Creates new live resources on demand.
///
/// A factory is pooling-unaware: one attempt per call, no retry. A
/// failure surfaces to the `acquire` caller as
/// [`Error::Connect`](crate::Error::Connect); wrap the underlying
/// error with [`Error::connect`](crate::Error::connect).
pub trait Factory: Send + Sync + 'static {
    /// The resource type this factory produces.
    type Resource: Resource;

    /// Attempt to create one new resource.
    fn create(&self) -> impl Future<Output = Result<Self::Resource>> + Send;
}

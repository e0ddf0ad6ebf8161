//! Error-tracking collaborator seam.

use crate::fault::Fault;

/// An external error-tracking backend.
///
/// Used by the dedup guard on first observation of a fault, and by the
/// unhandled-error adapter on [`crate::Hub::notify_unhandled`].
pub trait ErrorTracker: Send + Sync {
    /// Register a fault with the backend.
    fn register(&self, fault: &Fault);
}

/// No-op tracker for testing or when error tracking is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl ErrorTracker for NoopTracker {
    fn register(&self, _fault: &Fault) {}
}

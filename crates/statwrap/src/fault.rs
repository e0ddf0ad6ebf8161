//! The `Fault` error wrapper and its report-once marker.
//!
//! An instrumented operation's error converts into a [`Fault`] at the
//! capture boundary. The wrapper carries a hidden `reported` flag whose
//! lifetime is exactly the fault's lifetime: the innermost instrumented
//! frame that observes the flag unset reports the error and sets it, every
//! enclosing frame re-raises silently. The original error stays reachable
//! by reference and by downcast, so callers see the same kind and message
//! they would without instrumentation.
//!
//! `Fault` deliberately does not implement `std::error::Error`: that keeps
//! the blanket `From<E: Error>` conversion coherent, so instrumented bodies
//! can return any standard error type (or an already-wrapped `Fault` from a
//! nested instrumented call) with `?`.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// An application error captured by the instrumentation layer.
pub struct Fault {
    source: Box<dyn StdError + Send + Sync + 'static>,
    reported: AtomicBool,
    backtrace: Backtrace,
}

impl Fault {
    /// Wrap a standard error, capturing the current backtrace.
    ///
    /// Backtrace capture honors `RUST_BACKTRACE`; without it the backtrace
    /// renders empty and frame cleaning yields no frames.
    pub fn new<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            source: Box::new(source),
            reported: AtomicBool::new(false),
            backtrace: Backtrace::capture(),
        }
    }

    /// Wrap an ad-hoc message as a fault.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(StringError(message.into()))
    }

    /// The wrapped error's message.
    pub fn message(&self) -> String {
        self.source.to_string()
    }

    /// Atomically mark this fault as reported, returning whether it had
    /// already been reported.
    ///
    /// The first observer gets `false` and performs the report; every
    /// later observer of the same instance gets `true` and must re-raise
    /// without reporting.
    pub fn mark_reported(&self) -> bool {
        self.reported.swap(true, Ordering::Relaxed)
    }

    /// Whether this fault has been reported.
    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Relaxed)
    }

    /// Borrow the wrapped error.
    pub fn source(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Downcast the wrapped error to a concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.source.downcast_ref::<E>()
    }

    /// The backtrace captured when the fault was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The captured backtrace rendered and stripped of vendored frames.
    ///
    /// Empty when backtrace capture was disabled.
    pub fn clean_frames(&self) -> Vec<String> {
        crate::report::clean_backtrace(&self.backtrace.to_string())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("source", &self.source)
            .field("reported", &self.is_reported())
            .finish_non_exhaustive()
    }
}

impl<E> From<E> for Fault
where
    E: StdError + Send + Sync + 'static,
{
    fn from(source: E) -> Self {
        Self::new(source)
    }
}

/// Message-only error used by [`Fault::msg`].
#[derive(Debug)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for StringError {}

//! Process-wide configuration: namespace, collaborators, and the stat
//! forwarding surface.
//!
//! A [`Hub`] owns the stats reporter, tracer, error tracker, and memory
//! sampler. The stats reporter is lazily constructed on first use from
//! the environment; every collaborator is overridable by assignment,
//! which is the testing seam. Instrumentation degrades to a safe no-op
//! for any collaborator that is absent or failed to construct.
//!
//! Most programs use [`Hub::global`]; tests build private hubs for
//! isolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::clients::{DogStatsdReporter, StatsReporter};
use crate::fault::Fault;
use crate::mem::{MemorySampler, ProcStatmSampler};
use crate::tags::flatten;
use crate::trace::Tracer;
use crate::track::ErrorTracker;

static GLOBAL: Lazy<Arc<Hub>> = Lazy::new(|| Arc::new(Hub::new()));

enum StatsSlot {
    /// Not yet constructed; first use builds from the environment.
    Unset,
    Ready(Arc<dyn StatsReporter>),
    /// Construction failed; stats stay disabled until overridden.
    Unavailable,
}

/// Owner of the instrumentation collaborators.
pub struct Hub {
    namespace: RwLock<Option<String>>,
    stats: RwLock<StatsSlot>,
    tracer: RwLock<Option<Arc<dyn Tracer>>>,
    tracker: RwLock<Option<Arc<dyn ErrorTracker>>>,
    sampler: RwLock<Arc<dyn MemorySampler>>,
    missing_tracer_warned: AtomicBool,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// A hub with no collaborators assigned and stats not yet built.
    pub fn new() -> Self {
        Self {
            namespace: RwLock::new(None),
            stats: RwLock::new(StatsSlot::Unset),
            tracer: RwLock::new(None),
            tracker: RwLock::new(None),
            sampler: RwLock::new(Arc::new(ProcStatmSampler)),
            missing_tracer_warned: AtomicBool::new(false),
        }
    }

    /// The process-wide shared hub.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Set the namespace prepended to every emitted key by the transport.
    ///
    /// Takes effect for reporters constructed afterwards; set it before
    /// the first stat is emitted.
    pub fn set_namespace(&self, namespace: impl Into<String>) {
        *self.namespace.write() = Some(namespace.into());
    }

    /// The configured namespace.
    pub fn namespace(&self) -> Option<String> {
        self.namespace.read().clone()
    }

    /// Replace the stats reporter (testing seam).
    pub fn set_stats_reporter(&self, reporter: Arc<dyn StatsReporter>) {
        *self.stats.write() = StatsSlot::Ready(reporter);
    }

    /// Assign the tracer collaborator.
    pub fn set_tracer(&self, tracer: Arc<dyn Tracer>) {
        *self.tracer.write() = Some(tracer);
    }

    /// Assign the error-tracking collaborator.
    pub fn set_error_tracker(&self, tracker: Arc<dyn ErrorTracker>) {
        *self.tracker.write() = Some(tracker);
    }

    /// Replace the memory sampler.
    pub fn set_memory_sampler(&self, sampler: Arc<dyn MemorySampler>) {
        *self.sampler.write() = sampler;
    }

    /// The stats reporter, building it from the environment on first use.
    ///
    /// Construction failure logs a warning once and leaves stats disabled.
    pub fn stats(&self) -> Option<Arc<dyn StatsReporter>> {
        {
            let slot = self.stats.read();
            match &*slot {
                StatsSlot::Ready(reporter) => return Some(Arc::clone(reporter)),
                StatsSlot::Unavailable => return None,
                StatsSlot::Unset => {}
            }
        }

        let mut slot = self.stats.write();
        // Another thread may have raced us here.
        match &*slot {
            StatsSlot::Ready(reporter) => return Some(Arc::clone(reporter)),
            StatsSlot::Unavailable => return None,
            StatsSlot::Unset => {}
        }
        match DogStatsdReporter::from_env(self.namespace()) {
            Ok(reporter) => {
                let reporter: Arc<dyn StatsReporter> = Arc::new(reporter);
                *slot = StatsSlot::Ready(Arc::clone(&reporter));
                Some(reporter)
            }
            Err(e) => {
                tracing::warn!(error = %e, "stats reporter unavailable, metrics disabled");
                *slot = StatsSlot::Unavailable;
                None
            }
        }
    }

    /// The tracer, if one is configured.
    pub fn tracer(&self) -> Option<Arc<dyn Tracer>> {
        self.tracer.read().clone()
    }

    /// The error tracker, if one is configured.
    pub fn error_tracker(&self) -> Option<Arc<dyn ErrorTracker>> {
        self.tracker.read().clone()
    }

    pub(crate) fn memory_sampler(&self) -> Arc<dyn MemorySampler> {
        Arc::clone(&self.sampler.read())
    }

    // ========================================================================
    // Stat forwarding (no-op without a reporter)
    // ========================================================================

    /// Increment a counter by 1.
    pub fn increment(&self, key: &str, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.increment(key, tags);
        }
    }

    /// Decrement a counter by 1.
    pub fn decrement(&self, key: &str, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.decrement(key, tags);
        }
    }

    /// Add `value` to a counter.
    pub fn count(&self, key: &str, value: i64, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.count(key, value, tags);
        }
    }

    /// Record a gauge value.
    pub fn gauge(&self, key: &str, value: f64, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.gauge(key, value, tags);
        }
    }

    /// Record a set member.
    pub fn set(&self, key: &str, value: &str, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.set(key, value, tags);
        }
    }

    /// Record a histogram sample.
    pub fn histogram(&self, key: &str, value: f64, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.histogram(key, value, tags);
        }
    }

    /// Record a distribution sample.
    pub fn distribution(&self, key: &str, value: f64, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.distribution(key, value, tags);
        }
    }

    /// Record a timing sample in milliseconds.
    pub fn timing(&self, key: &str, value_ms: f64, tags: &[String]) {
        if let Some(stats) = self.stats() {
            stats.timing(key, value_ms, tags);
        }
    }

    /// Time a block and record the elapsed milliseconds under `key`.
    pub fn time<R>(&self, key: &str, tags: &[String], f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = f();
        self.timing(key, started.elapsed().as_secs_f64() * 1000.0, tags);
        result
    }

    // ========================================================================
    // Tracing and error tracking
    // ========================================================================

    /// Flatten nested metadata under `key` and attach it to the active
    /// span, if a tracer is configured.
    pub fn tag_active_span(&self, key: &str, value: &Value) {
        if let Some(tracer) = self.tracer() {
            tracer.tag_active_span(&flatten(value, Some(key)));
        }
    }

    /// Flatten nested metadata under `key` and attach it to the active
    /// root span, if a tracer is configured.
    pub fn tag_active_root_span(&self, key: &str, value: &Value) {
        if let Some(tracer) = self.tracer() {
            tracer.tag_active_root_span(&flatten(value, Some(key)));
        }
    }

    /// Register a fault with the error tracker, if one is configured.
    pub fn register_error(&self, fault: &Fault) {
        if let Some(tracker) = self.error_tracker() {
            tracker.register(fault);
        }
    }

    /// Forward an unhandled error from a host notification framework into
    /// the error-tracking registration path.
    pub fn notify_unhandled<E: Into<Fault>>(&self, error: E) -> Fault {
        let fault = error.into();
        self.register_error(&fault);
        fault
    }

    /// Warn once per hub that tracing was requested without a tracer.
    pub(crate) fn warn_missing_tracer(&self, qualified_name: &str) {
        if !self.missing_tracer_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                operation = qualified_name,
                "tracing requested but no tracer configured; delegating directly"
            );
        }
    }
}

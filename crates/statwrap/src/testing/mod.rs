//! Recording collaborators for asserting on emitted instrumentation.
//!
//! Enable with the `testing` feature. Each double records what production
//! code forwarded to it and exposes cloned snapshots for assertions;
//! [`TestHub`] bundles a private hub with all three doubles wired in.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clients::StatsReporter;
use crate::fault::Fault;
use crate::hub::Hub;
use crate::tags::TagSet;
use crate::trace::{Span, SpanOptions, Tracer};
use crate::track::ErrorTracker;

/// One recorded stat sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// The sample value (counter deltas widen to `f64`).
    pub value: f64,
    /// Tags exactly as emitted, in emission order.
    pub tags: Vec<String>,
}

type Samples = Mutex<HashMap<String, Vec<Recorded>>>;

/// Stats reporter that records every sample in memory.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    counts: Samples,
    gauges: Samples,
    sets: Mutex<HashMap<String, Vec<(String, Vec<String>)>>>,
    histograms: Samples,
    distributions: Samples,
    timings: Samples,
}

impl CapturingReporter {
    /// An empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count samples recorded under `key`.
    pub fn counts(&self, key: &str) -> Vec<Recorded> {
        self.counts.lock().get(key).cloned().unwrap_or_default()
    }

    /// Gauge samples recorded under `key`.
    pub fn gauges(&self, key: &str) -> Vec<Recorded> {
        self.gauges.lock().get(key).cloned().unwrap_or_default()
    }

    /// Set members recorded under `key`, as `(member, tags)` pairs.
    pub fn sets(&self, key: &str) -> Vec<(String, Vec<String>)> {
        self.sets.lock().get(key).cloned().unwrap_or_default()
    }

    /// Histogram samples recorded under `key`.
    pub fn histograms(&self, key: &str) -> Vec<Recorded> {
        self.histograms.lock().get(key).cloned().unwrap_or_default()
    }

    /// Distribution samples recorded under `key`.
    pub fn distributions(&self, key: &str) -> Vec<Recorded> {
        self.distributions.lock().get(key).cloned().unwrap_or_default()
    }

    /// Timing samples recorded under `key`.
    pub fn timings(&self, key: &str) -> Vec<Recorded> {
        self.timings.lock().get(key).cloned().unwrap_or_default()
    }

    fn record(store: &Samples, key: &str, value: f64, tags: &[String]) {
        store
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(Recorded { value, tags: tags.to_vec() });
    }
}

impl StatsReporter for CapturingReporter {
    fn count(&self, key: &str, value: i64, tags: &[String]) {
        Self::record(&self.counts, key, value as f64, tags);
    }

    fn gauge(&self, key: &str, value: f64, tags: &[String]) {
        Self::record(&self.gauges, key, value, tags);
    }

    fn set(&self, key: &str, value: &str, tags: &[String]) {
        self.sets
            .lock()
            .entry(key.to_string())
            .or_default()
            .push((value.to_string(), tags.to_vec()));
    }

    fn histogram(&self, key: &str, value: f64, tags: &[String]) {
        Self::record(&self.histograms, key, value, tags);
    }

    fn distribution(&self, key: &str, value: f64, tags: &[String]) {
        Self::record(&self.distributions, key, value, tags);
    }

    fn timing(&self, key: &str, value_ms: f64, tags: &[String]) {
        Self::record(&self.timings, key, value_ms, tags);
    }
}

/// One span's lifecycle as seen by the [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    /// Operation name the span was opened with.
    pub operation: String,
    /// Resource name from the span options.
    pub resource: String,
    /// Initial span tags.
    pub tags: TagSet,
    /// Tags attached after the span opened, in order.
    pub set_tags: Vec<(String, String)>,
    /// Whether the span was finished.
    pub finished: bool,
}

/// Tracer that records spans and active-span tagging calls.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
    active_span_tags: Mutex<Vec<TagSet>>,
    active_root_span_tags: Mutex<Vec<TagSet>>,
}

impl RecordingTracer {
    /// A tracer with no recorded activity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every span opened so far, in open order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().clone()
    }

    /// Tag sets attached to the active span, in call order.
    pub fn active_span_tags(&self) -> Vec<TagSet> {
        self.active_span_tags.lock().clone()
    }

    /// Tag sets attached to the active root span, in call order.
    pub fn active_root_span_tags(&self) -> Vec<TagSet> {
        self.active_root_span_tags.lock().clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, operation: &str, options: SpanOptions) -> Box<dyn Span> {
        let mut spans = self.spans.lock();
        spans.push(SpanRecord {
            operation: operation.to_string(),
            resource: options.resource,
            tags: options.tags,
            set_tags: Vec::new(),
            finished: false,
        });
        Box::new(RecordingSpan { spans: Arc::clone(&self.spans), index: spans.len() - 1 })
    }

    fn tag_active_span(&self, tags: &TagSet) {
        self.active_span_tags.lock().push(tags.clone());
    }

    fn tag_active_root_span(&self, tags: &TagSet) {
        self.active_root_span_tags.lock().push(tags.clone());
    }
}

struct RecordingSpan {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
    index: usize,
}

impl Span for RecordingSpan {
    fn set_tag(&mut self, name: &str, value: &str) {
        if let Some(record) = self.spans.lock().get_mut(self.index) {
            record.set_tags.push((name.to_string(), value.to_string()));
        }
    }

    fn finish(self: Box<Self>) {
        if let Some(record) = self.spans.lock().get_mut(self.index) {
            record.finished = true;
        }
    }
}

/// Error tracker that records each registered fault's message.
#[derive(Debug, Default)]
pub struct RecordingTracker {
    messages: Mutex<Vec<String>>,
}

impl RecordingTracker {
    /// A tracker with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many faults have been registered.
    pub fn registrations(&self) -> usize {
        self.messages.lock().len()
    }

    /// Messages of the registered faults, in registration order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ErrorTracker for RecordingTracker {
    fn register(&self, fault: &Fault) {
        self.messages.lock().push(fault.message());
    }
}

/// A private hub with recording collaborators wired in.
pub struct TestHub {
    /// The hub to instrument against.
    pub hub: Arc<Hub>,
    /// Records stat samples.
    pub stats: Arc<CapturingReporter>,
    /// Records spans; absent when built with [`TestHub::without_tracer`].
    pub tracer: Option<Arc<RecordingTracer>>,
    /// Records fault registrations.
    pub tracker: Arc<RecordingTracker>,
}

impl TestHub {
    /// A hub with all three recording collaborators.
    pub fn new() -> Self {
        let hub = Arc::new(Hub::new());
        let stats = Arc::new(CapturingReporter::new());
        let tracer = Arc::new(RecordingTracer::new());
        let tracker = Arc::new(RecordingTracker::new());
        hub.set_stats_reporter(Arc::clone(&stats) as _);
        hub.set_tracer(Arc::clone(&tracer) as _);
        hub.set_error_tracker(Arc::clone(&tracker) as _);
        Self { hub, stats, tracer: Some(tracer), tracker }
    }

    /// A hub with stats and error tracking but no tracer, for exercising
    /// the degraded tracing path.
    pub fn without_tracer() -> Self {
        let hub = Arc::new(Hub::new());
        let stats = Arc::new(CapturingReporter::new());
        let tracker = Arc::new(RecordingTracker::new());
        hub.set_stats_reporter(Arc::clone(&stats) as _);
        hub.set_error_tracker(Arc::clone(&tracker) as _);
        Self { hub, stats, tracer: None, tracker }
    }
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

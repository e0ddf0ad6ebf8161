//! Stats-reporter collaborator seam and concrete transports.

pub mod statsd;

pub use statsd::DogStatsdReporter;

/// A stats backend accepting string keys and tag lists.
///
/// All methods are fire-and-forget at this boundary: transports log their
/// failures and never raise into the instrumented call.
pub trait StatsReporter: Send + Sync {
    /// Add `value` to a counter.
    fn count(&self, key: &str, value: i64, tags: &[String]);

    /// Record a gauge value.
    fn gauge(&self, key: &str, value: f64, tags: &[String]);

    /// Record a set member.
    fn set(&self, key: &str, value: &str, tags: &[String]);

    /// Record a histogram sample.
    fn histogram(&self, key: &str, value: f64, tags: &[String]);

    /// Record a distribution sample.
    fn distribution(&self, key: &str, value: f64, tags: &[String]);

    /// Record a timing sample in milliseconds.
    fn timing(&self, key: &str, value_ms: f64, tags: &[String]);

    /// Increment a counter by 1.
    fn increment(&self, key: &str, tags: &[String]) {
        self.count(key, 1, tags);
    }

    /// Decrement a counter by 1.
    fn decrement(&self, key: &str, tags: &[String]) {
        self.count(key, -1, tags);
    }
}

/// No-op reporter for testing or when stats are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl StatsReporter for NoopReporter {
    fn count(&self, _key: &str, _value: i64, _tags: &[String]) {}

    fn gauge(&self, _key: &str, _value: f64, _tags: &[String]) {}

    fn set(&self, _key: &str, _value: &str, _tags: &[String]) {}

    fn histogram(&self, _key: &str, _value: f64, _tags: &[String]) {}

    fn distribution(&self, _key: &str, _value: f64, _tags: &[String]) {}

    fn timing(&self, _key: &str, _value_ms: f64, _tags: &[String]) {}
}

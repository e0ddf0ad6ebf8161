//! Tracer collaborator seam.
//!
//! The engine only needs to open a span with a resource name and tags, set
//! tags on it, and finish it; everything else about the tracing backend is
//! out of scope. A missing tracer degrades to direct delegation.

use crate::tags::TagSet;

/// Span label used for every instrumented call.
pub const SPAN_OPERATION: &str = "method.execution";

/// Resource name used when the trace configuration does not set one.
pub const DEFAULT_RESOURCE: &str = "instrumented.method";

/// Options for one span: the resource name and its initial tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanOptions {
    /// Resource name shown by the tracing backend.
    pub resource: String,
    /// Initial span tags.
    pub tags: TagSet,
}

/// One traced execution interval.
pub trait Span: Send {
    /// Attach a tag to the span.
    fn set_tag(&mut self, name: &str, value: &str);

    /// Close the span.
    fn finish(self: Box<Self>);
}

/// A distributed-tracing backend.
pub trait Tracer: Send + Sync {
    /// Open a span around an instrumented call.
    fn start_span(&self, operation: &str, options: SpanOptions) -> Box<dyn Span>;

    /// Attach tags to the currently active span, if the backend tracks
    /// one. Default: no-op.
    fn tag_active_span(&self, tags: &TagSet) {
        let _ = tags;
    }

    /// Attach tags to the active root span, if the backend tracks one.
    /// Default: no-op.
    fn tag_active_root_span(&self, tags: &TagSet) {
        let _ = tags;
    }
}

/// No-op tracer for testing or when tracing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _operation: &str, _options: SpanOptions) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

struct NoopSpan;

impl Span for NoopSpan {
    fn set_tag(&mut self, _name: &str, _value: &str) {}

    fn finish(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_tracer_spans_do_nothing() {
        let tracer = NoopTracer;
        let mut span = tracer.start_span(SPAN_OPERATION, SpanOptions::default());
        span.set_tag("anything", "goes");
        span.finish();
        tracer.tag_active_span(&TagSet::new());
        tracer.tag_active_root_span(&TagSet::new());
    }
}

//! The wrapping engine: registration and the per-call pipeline.
//!
//! [`instrument`] pairs an operation's identity with its options, stores a
//! descriptor in the process-wide registry, and returns an [`Instrumented`]
//! stub. Each [`Instrumented::call`] re-reads the registry (re-registration
//! takes effect on the next call), pushes a tag frame, emits call/timing/
//! success stats, optionally opens a trace span, and runs the capture step
//! that reports each fault exactly once before re-raising it.

use std::sync::Arc;
use std::time::Instant;

use crate::descriptor::{Descriptor, Options, OwnerKind};
use crate::fault::Fault;
use crate::hub::Hub;
use crate::registry;
use crate::report;
use crate::tags::{self, TagScope};
use crate::trace::SPAN_OPERATION;

type Inner<A, R> = Arc<dyn Fn(A) -> Result<R, Fault> + Send + Sync>;

/// Instrument an operation against the global hub.
///
/// Registers a descriptor for `(owner, kind, operation)` and returns the
/// callable stub. Registering the same operation again overwrites the
/// descriptor; existing stubs pick up the replacement on their next call.
pub fn instrument<A, R, E, F>(
    owner: impl Into<String>,
    kind: OwnerKind,
    operation: impl Into<String>,
    options: Options<A>,
    f: F,
) -> Instrumented<A, R>
where
    F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    E: Into<Fault>,
    A: 'static,
    R: 'static,
{
    instrument_with(Hub::global(), owner, kind, operation, options, f)
}

/// Instrument an operation against a specific hub.
pub fn instrument_with<A, R, E, F>(
    hub: Arc<Hub>,
    owner: impl Into<String>,
    kind: OwnerKind,
    operation: impl Into<String>,
    options: Options<A>,
    f: F,
) -> Instrumented<A, R>
where
    F: Fn(A) -> Result<R, E> + Send + Sync + 'static,
    E: Into<Fault>,
    A: 'static,
    R: 'static,
{
    let owner = owner.into();
    let operation = operation.into();
    registry::register(Arc::new(Descriptor::new(
        owner.clone(),
        kind,
        operation.clone(),
        options,
    )));

    let inner: Inner<A, R> = Arc::new(move |args| f(args).map_err(Into::into));
    Instrumented { hub, owner, owner_kind: kind, operation, inner }
}

/// A callable stub wrapping one instrumented operation.
///
/// Cheap to clone; clones share the delegate and resolve the same registry
/// entry.
pub struct Instrumented<A, R> {
    hub: Arc<Hub>,
    owner: String,
    owner_kind: OwnerKind,
    operation: String,
    inner: Inner<A, R>,
}

impl<A, R> Clone for Instrumented<A, R> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            operation: self.operation.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: 'static, R> Instrumented<A, R> {
    /// Invoke the wrapped operation through the full pipeline.
    ///
    /// The return value and error are the delegate's own; instrumentation
    /// is transparent to the caller.
    ///
    /// # Panics
    ///
    /// Panics when no descriptor (or one with a different argument type) is
    /// registered for this operation. That only happens when registry state
    /// was manipulated behind the stub's back, and silently delegating
    /// would hide the corruption.
    pub fn call(&self, args: A) -> Result<R, Fault> {
        let descriptor = self.descriptor();
        let key = descriptor.key();

        // The frame stays on the stack for the whole call, every exit path.
        let _frame = TagScope::push(descriptor.tags_for(&args));
        let active = tags::active_tags();

        self.hub.increment(&format!("{key}.count"), &active);

        let started = Instant::now();
        let result = self.capture(&descriptor, self.delegate(&descriptor, args));
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.hub.timing(&format!("{key}.timing"), elapsed_ms, &active);
        if result.is_ok() {
            self.hub.increment(&format!("{key}.success.count"), &active);
        }
        result
    }

    /// The qualified name of the wrapped operation, for logs.
    pub fn qualified_name(&self) -> String {
        format!("{}{}{}", self.owner, self.owner_kind.sigil(), self.operation)
    }

    fn descriptor(&self) -> Arc<Descriptor<A>> {
        registry::lookup::<A>(&self.owner, self.owner_kind, &self.operation).unwrap_or_else(
            || {
                panic!(
                    "statwrap: no instrumentation descriptor registered for {}",
                    self.qualified_name()
                )
            },
        )
    }

    /// Run the delegate, inside a trace span when one is configured.
    fn delegate(&self, descriptor: &Descriptor<A>, args: A) -> Result<R, Fault> {
        if !descriptor.is_traced() {
            return (self.inner)(args);
        }
        let Some(tracer) = self.hub.tracer() else {
            self.hub.warn_missing_tracer(&descriptor.qualified_name());
            return (self.inner)(args);
        };

        let mut span = tracer.start_span(SPAN_OPERATION, descriptor.trace_options());
        let sampler = self.hub.memory_sampler();
        let before = sampler.sample();
        let result = (self.inner)(args);
        if let (Some(before), Some(after)) = (before, sampler.sample()) {
            let delta = after.resident_pages as i64 - before.resident_pages as i64;
            span.set_tag("rss_pages.delta", &delta.to_string());
        }
        span.finish();
        result
    }

    /// Report a rescued fault exactly once, then re-raise unconditionally.
    fn capture(&self, descriptor: &Descriptor<A>, result: Result<R, Fault>) -> Result<R, Fault> {
        match result {
            Ok(value) => Ok(value),
            Err(fault) => {
                if descriptor.rescues(&fault) && !fault.mark_reported() {
                    report::report(&fault, &descriptor.qualified_name(), &self.hub);
                }
                Err(fault)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::io;

    use super::*;
    use crate::testing::CapturingReporter;

    fn capturing_hub() -> (Arc<Hub>, Arc<CapturingReporter>) {
        let hub = Arc::new(Hub::new());
        let reporter = Arc::new(CapturingReporter::new());
        hub.set_stats_reporter(Arc::clone(&reporter) as _);
        (hub, reporter)
    }

    #[test]
    fn successful_call_emits_count_timing_and_success() {
        let (hub, reporter) = capturing_hub();
        let double = instrument_with(
            hub,
            "engine_tests::Doubler",
            OwnerKind::Instance,
            "double",
            Options::new().with_key("engine.double"),
            |n: u64| Ok::<_, Infallible>(n * 2),
        );

        assert_eq!(double.call(21).expect("infallible delegate"), 42);

        assert_eq!(reporter.counts("engine.double.count").len(), 1);
        assert_eq!(reporter.timings("engine.double.timing").len(), 1);
        assert_eq!(reporter.counts("engine.double.success.count").len(), 1);
    }

    #[test]
    fn failing_call_skips_the_success_count() {
        let (hub, reporter) = capturing_hub();
        let fail = instrument_with(
            hub,
            "engine_tests::Failer",
            OwnerKind::Instance,
            "save",
            Options::new().with_key("engine.fail"),
            |_: ()| Err::<(), _>(io::Error::other("boom")),
        );

        let fault = fail.call(()).expect_err("delegate always fails");
        assert!(fault.is_reported());

        assert_eq!(reporter.counts("engine.fail.count").len(), 1);
        assert_eq!(reporter.timings("engine.fail.timing").len(), 1);
        assert!(reporter.counts("engine.fail.success.count").is_empty());
    }

    #[test]
    fn clones_share_the_delegate_and_registry_entry() {
        let (hub, reporter) = capturing_hub();
        let stub = instrument_with(
            hub,
            "engine_tests::Cloned",
            OwnerKind::Static,
            "tick",
            Options::new().with_key("engine.tick"),
            |_: ()| Ok::<_, Infallible>(()),
        );

        let other = stub.clone();
        stub.call(()).expect("infallible delegate");
        other.call(()).expect("infallible delegate");

        assert_eq!(reporter.counts("engine.tick.count").len(), 2);
    }

    #[test]
    fn qualified_names_use_the_binding_sigil() {
        let (hub, _) = capturing_hub();
        let instance = instrument_with(
            Arc::clone(&hub),
            "engine_tests::Named",
            OwnerKind::Instance,
            "save",
            Options::<()>::new(),
            |_: ()| Ok::<_, Infallible>(()),
        );
        let stat = instrument_with(
            hub,
            "engine_tests::Named",
            OwnerKind::Static,
            "sweep",
            Options::<()>::new(),
            |_: ()| Ok::<_, Infallible>(()),
        );

        assert_eq!(instance.qualified_name(), "engine_tests::Named#save");
        assert_eq!(stat.qualified_name(), "engine_tests::Named.sweep");
    }
}

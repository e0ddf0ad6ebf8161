//! Declarative instrumentation for application operations: counters,
//! timings, trace spans, and report-once error capture around any
//! fallible call.
//!
//! Wrap an operation with [`instrument`] and invoke it through the
//! returned stub. Every call emits a call counter, a timing, and a
//! success counter under a stable dotted key, carries `method:` and
//! `method_class:` tags, and re-raises the delegate's errors untouched
//! after reporting each underlying error exactly once, no matter how many
//! instrumented frames it crosses.
//!
//! Stats flow to a DogStatsD agent over UDP, configured from
//! `DATADOG_HOST`/`DATADOG_PORT`; tracing and error tracking are traits
//! wired into the [`Hub`]. Every collaborator degrades to a no-op when
//! absent, so instrumented code runs unchanged without an agent.
//!
//! ```
//! use statwrap::{instrument, Options, OwnerKind};
//!
//! let save = instrument(
//!     "orders::Order",
//!     OwnerKind::Instance,
//!     "save",
//!     Options::new().with_tags(["env:example"]),
//!     |order_id: u64| Ok::<_, std::io::Error>(order_id),
//! );
//!
//! // Emits orders.order.instance.save.{count,timing,success.count}.
//! assert_eq!(save.call(7)?, 7);
//! # Ok::<(), statwrap::Fault>(())
//! ```

pub mod clients;
mod descriptor;
mod engine;
mod error;
mod fault;
mod hub;
mod mem;
pub mod registry;
mod report;
pub mod tags;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trace;
pub mod track;

pub use clients::{DogStatsdReporter, NoopReporter, StatsReporter};
pub use descriptor::{
    CallContext, Descriptor, KeyFn, KeySource, Options, OwnerKind, RescueFn, TagSource, TagsFn,
    TraceConfig, TraceSetting,
};
pub use engine::{instrument, instrument_with, Instrumented};
pub use error::{Error, Result};
pub use fault::Fault;
pub use hub::Hub;
pub use mem::{MemorySample, MemorySampler, NoopSampler, ProcStatmSampler};
pub use report::clean_backtrace;
pub use tags::{flatten, TagScope, TagSet};
pub use trace::{NoopTracer, Span, SpanOptions, Tracer, DEFAULT_RESOURCE, SPAN_OPERATION};
pub use track::{ErrorTracker, NoopTracker};

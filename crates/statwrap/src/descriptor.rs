//! Per-operation instrumentation descriptors.
//!
//! A descriptor is built once at registration time and holds the wrapped
//! operation's identity plus the options that drive key derivation, tag
//! composition, tracing, and the rescue boundary. Polymorphic options
//! (literal-or-callable keys and tags) are typed variants resolved with a
//! single dispatch at call time.

use std::fmt;
use std::sync::Arc;

use crate::fault::Fault;
use crate::tags::{self, TagSet};
use crate::trace::{SpanOptions, DEFAULT_RESOURCE};

/// Computed instrumentation-key source.
pub type KeyFn = Arc<dyn Fn(&CallContext) -> String + Send + Sync>;

/// Computed tag source, invoked with the call arguments and context.
pub type TagsFn<A> = Arc<dyn Fn(&A, &CallContext) -> Vec<String> + Send + Sync>;

/// Predicate narrowing which faults the capture step reports.
pub type RescueFn = Arc<dyn Fn(&Fault) -> bool + Send + Sync>;

/// Whether an operation is bound to an instance or to the type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerKind {
    /// Instance-bound operation (`#` sigil, `instance` key segment).
    Instance,
    /// Static/type-bound operation (`.` sigil, `static` key segment).
    Static,
}

impl OwnerKind {
    /// The sigil used in `method:` tags and qualified names.
    pub fn sigil(self) -> char {
        match self {
            Self::Instance => '#',
            Self::Static => '.',
        }
    }

    /// The segment used in derived instrumentation keys.
    pub fn segment(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// The context handed to computed key and tag sources: the identity of the
/// operation being invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Fully-qualified owner path (e.g. `orders::Service`).
    pub owner: String,
    /// Instance or static binding.
    pub owner_kind: OwnerKind,
    /// Operation name.
    pub operation: String,
}

/// Where the instrumentation key comes from.
#[derive(Clone)]
pub enum KeySource {
    /// Derive `<owner base key>.<kind>.<operation>`.
    Derived,
    /// A literal key string.
    Literal(String),
    /// A function of the call context.
    Computed(KeyFn),
}

/// Where user-defined tags come from.
#[derive(Clone)]
pub enum TagSource<A> {
    /// No user-defined tags.
    Empty,
    /// A literal ordered sequence of tag strings.
    Fixed(Vec<String>),
    /// A function of the call arguments and context.
    Computed(TagsFn<A>),
}

/// Tracing behavior for an instrumented operation.
#[derive(Clone)]
pub enum TraceSetting {
    /// No span around the call.
    Disabled,
    /// Trace with defaults.
    Enabled,
    /// Trace with explicit configuration.
    Configured(TraceConfig),
}

/// Explicit trace configuration.
#[derive(Clone, Default)]
pub struct TraceConfig {
    /// Span resource name; defaults to [`DEFAULT_RESOURCE`].
    pub resource: Option<String>,
    /// Start the span's tags from the active-tag stack.
    pub include_parent_tags: bool,
    /// Tags merged over the base set (later wins).
    pub tags: TagSet,
}

/// User-supplied options for one instrumented operation.
pub struct Options<A> {
    pub(crate) key: KeySource,
    pub(crate) prefix: Option<String>,
    pub(crate) tags: TagSource<A>,
    pub(crate) trace: TraceSetting,
    pub(crate) rescue: Option<RescueFn>,
}

impl<A> Default for Options<A> {
    fn default() -> Self {
        Self {
            key: KeySource::Derived,
            prefix: None,
            tags: TagSource::Empty,
            trace: TraceSetting::Disabled,
            rescue: None,
        }
    }
}

impl<A> Options<A> {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a literal instrumentation key instead of the derived one.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = KeySource::Literal(key.into());
        self
    }

    /// Compute the instrumentation key from the call context.
    pub fn with_key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&CallContext) -> String + Send + Sync + 'static,
    {
        self.key = KeySource::Computed(Arc::new(f));
        self
    }

    /// Prepend `prefix.` to the computed key.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Append a literal sequence of user-defined tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = TagSource::Fixed(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Compute user-defined tags from the call arguments and context.
    pub fn with_tags_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&A, &CallContext) -> Vec<String> + Send + Sync + 'static,
    {
        self.tags = TagSource::Computed(Arc::new(f));
        self
    }

    /// Trace each call with default span options.
    pub fn traced(mut self) -> Self {
        self.trace = TraceSetting::Enabled;
        self
    }

    /// Trace each call with explicit configuration.
    pub fn with_trace_config(mut self, config: TraceConfig) -> Self {
        self.trace = TraceSetting::Configured(config);
        self
    }

    /// Narrow which faults the capture step reports.
    ///
    /// Faults rejected by the predicate propagate untouched: no marking,
    /// no logging, no registration.
    pub fn with_rescue_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&Fault) -> bool + Send + Sync + 'static,
    {
        self.rescue = Some(Arc::new(f));
        self
    }
}

/// The per-operation record stored in the registry at registration time.
pub struct Descriptor<A> {
    owner: String,
    owner_kind: OwnerKind,
    operation: String,
    options: Options<A>,
}

impl<A> Descriptor<A> {
    /// Build a descriptor for one operation.
    pub fn new(
        owner: impl Into<String>,
        owner_kind: OwnerKind,
        operation: impl Into<String>,
        options: Options<A>,
    ) -> Self {
        Self { owner: owner.into(), owner_kind, operation: operation.into(), options }
    }

    /// Fully-qualified owner path.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Instance or static binding.
    pub fn owner_kind(&self) -> OwnerKind {
        self.owner_kind
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The context value handed to computed key/tag sources.
    pub fn context(&self) -> CallContext {
        CallContext {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            operation: self.operation.clone(),
        }
    }

    /// Human-readable operation name for logs: `owner#op` or `owner.op`.
    pub fn qualified_name(&self) -> String {
        format!("{}{}{}", self.owner, self.owner_kind.sigil(), self.operation)
    }

    /// The stable instrumentation key for this invocation.
    ///
    /// Resolution order: computed function, literal, derived
    /// `<owner base key>.<kind>.<operation>`; an optional prefix prepends
    /// to whatever resolved.
    pub fn key(&self) -> String {
        let base = match &self.options.key {
            KeySource::Literal(key) => key.clone(),
            KeySource::Computed(f) => f(&self.context()),
            KeySource::Derived => format!(
                "{}.{}.{}",
                owner_base_key(&self.owner),
                self.owner_kind.segment(),
                self.operation
            ),
        };
        match &self.options.prefix {
            Some(prefix) => format!("{prefix}.{base}"),
            None => base,
        }
    }

    /// Tags for one invocation: the fixed `method:`/`method_class:` pair
    /// followed by user-defined tags.
    pub fn tags_for(&self, args: &A) -> Vec<String> {
        let mut out = vec![
            format!("method:{}{}", self.owner_kind.sigil(), self.operation),
            format!("method_class:{}", owner_class_name(&self.owner)),
        ];
        match &self.options.tags {
            TagSource::Empty => {}
            TagSource::Fixed(tags) => out.extend(tags.iter().cloned()),
            TagSource::Computed(f) => out.extend(f(args, &self.context())),
        }
        out
    }

    /// Whether calls should run inside a trace span.
    pub fn is_traced(&self) -> bool {
        !matches!(self.options.trace, TraceSetting::Disabled)
    }

    /// Span options for a traced call.
    ///
    /// With `include_parent_tags`, the base tag set is the current
    /// active-tag stack (which already includes this call's own frame);
    /// configured trace tags merge over it.
    pub fn trace_options(&self) -> SpanOptions {
        let config = match &self.options.trace {
            TraceSetting::Configured(config) => config.clone(),
            _ => TraceConfig::default(),
        };
        let mut span_tags =
            if config.include_parent_tags { tags::active_tag_set() } else { TagSet::new() };
        span_tags.merge(config.tags);
        SpanOptions {
            resource: config.resource.unwrap_or_else(|| DEFAULT_RESOURCE.to_string()),
            tags: span_tags,
        }
    }

    /// Whether the capture step should report this fault.
    pub fn rescues(&self, fault: &Fault) -> bool {
        match &self.options.rescue {
            Some(predicate) => predicate(fault),
            None => true,
        }
    }
}

/// Owner path normalized to a lowercase dotted key: `orders::Service`
/// becomes `orders.service`.
fn owner_base_key(owner: &str) -> String {
    owner.split("::").map(str::to_lowercase).collect::<Vec<_>>().join(".")
}

/// Last segment of the owner path, as written: `orders::Service` gives
/// `Service`.
fn owner_class_name(owner: &str) -> &str {
    owner.rsplit("::").next().unwrap_or(owner)
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::tags::TagScope;

    fn descriptor(options: Options<u64>) -> Descriptor<u64> {
        Descriptor::new("orders::Service", OwnerKind::Instance, "fetch", options)
    }

    #[test]
    fn derived_key_normalizes_the_owner_path() {
        assert_eq!(descriptor(Options::new()).key(), "orders.service.instance.fetch");
    }

    #[test]
    fn prefix_prepends_to_the_derived_key() {
        let desc = descriptor(Options::new().with_prefix("billing"));
        assert_eq!(desc.key(), "billing.orders.service.instance.fetch");
    }

    #[test]
    fn literal_and_computed_keys_win_over_derivation() {
        assert_eq!(descriptor(Options::new().with_key("orders.fetch")).key(), "orders.fetch");

        let desc = descriptor(
            Options::new().with_key_fn(|ctx| format!("dyn.{}.{}", ctx.owner_kind, ctx.operation)),
        );
        assert_eq!(desc.key(), "dyn.instance.fetch");
    }

    #[test]
    fn static_operations_use_their_own_segment_and_sigil() {
        let desc: Descriptor<()> =
            Descriptor::new("orders::Service", OwnerKind::Static, "sweep", Options::new());
        assert_eq!(desc.key(), "orders.service.static.sweep");
        assert_eq!(desc.qualified_name(), "orders::Service.sweep");
        assert_eq!(desc.tags_for(&())[0], "method:.sweep");
    }

    #[test]
    fn tags_always_lead_with_method_and_method_class() {
        let desc = descriptor(Options::new().with_tags(["env:test"]));
        assert_eq!(
            desc.tags_for(&7),
            vec![
                "method:#fetch".to_string(),
                "method_class:Service".to_string(),
                "env:test".to_string(),
            ]
        );
    }

    #[test]
    fn computed_tags_see_args_and_context() {
        let desc = descriptor(Options::new().with_tags_fn(|order_id: &u64, ctx| {
            vec![format!("order:{order_id}"), format!("op:{}", ctx.operation)]
        }));
        let tags = desc.tags_for(&42);
        assert!(tags.contains(&"order:42".to_string()));
        assert!(tags.contains(&"op:fetch".to_string()));
    }

    #[test]
    fn trace_options_default_resource_and_empty_tags() {
        let desc = descriptor(Options::new().traced());
        assert!(desc.is_traced());

        let opts = desc.trace_options();
        assert_eq!(opts.resource, DEFAULT_RESOURCE);
        assert!(opts.tags.is_empty());
    }

    #[test]
    fn trace_options_inherit_parent_tags_when_asked() {
        let _frame = TagScope::push(vec!["request_id:abc".into()]);

        let mut config = TraceConfig { include_parent_tags: true, ..TraceConfig::default() };
        config.tags.insert("shard", "7");
        config.resource = Some("orders.fetch".into());

        let opts = descriptor(Options::new().with_trace_config(config)).trace_options();
        assert_eq!(opts.resource, "orders.fetch");
        assert_eq!(opts.tags.get("request_id"), Some("abc"));
        assert_eq!(opts.tags.get("shard"), Some("7"));

        // Without the flag the parent frame stays invisible.
        let opts = descriptor(Options::new().with_trace_config(TraceConfig::default()))
            .trace_options();
        assert_eq!(opts.tags.get("request_id"), None);
    }

    #[test]
    fn rescue_filter_narrows_capture() {
        let desc = descriptor(Options::new().with_rescue_filter(|fault| {
            fault.downcast_ref::<io::Error>().is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
        }));

        let not_found: crate::Fault =
            io::Error::new(io::ErrorKind::NotFound, "missing").into();
        let timed_out: crate::Fault =
            io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(desc.rescues(&not_found));
        assert!(!desc.rescues(&timed_out));

        // Default: everything is rescued.
        assert!(descriptor(Options::new()).rescues(&timed_out));
    }
}

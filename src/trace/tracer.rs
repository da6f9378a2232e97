//! # Tracer
//!
//! The `Tracer` owns the registry of live traces and is the only place spans
//! are created and finished. It resolves each new span's owning trace from
//! an explicit argument or the ambient cell, tags it with the service name,
//! and maintains the per-trace "current span" cursor that makes nesting
//! work. Age-based eviction bounds the registry's memory.

use super::ids::{IdGenerator, RandomIdGenerator};
use super::span::{Span, SpanStatus};
use super::trace_context::TraceContext;
use super::{SpanId, TraceId};
use crate::common::{KeyValue, Value};
use crate::internal_logging::{internal_debug, internal_warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Creates and finishes spans, owns the trace registry, and evicts stale
/// traces.
///
/// One explicitly constructed `Tracer` per service process; clones are cheap
/// handles to the same registry, so inject a clone wherever spans are
/// started instead of reaching for a global.
///
/// # Examples
///
/// ```
/// use tracekit::{SpanStatus, Tracer};
///
/// let tracer = Tracer::new("inventory");
///
/// let reserve = tracer.start_span("reserve_stock");
/// let query = tracer.start_span("query_warehouse"); // not nested: no active trace
/// tracer.finish_span(&query, SpanStatus::Ok);
/// tracer.finish_span(&reserve, SpanStatus::Ok);
/// ```
///
/// Nesting happens through the ambient trace; see
/// [`Tracer::in_span`] and the [`context`](crate::context) module.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

struct TracerInner {
    service_name: Cow<'static, str>,
    traces: Mutex<HashMap<TraceId, TraceContext>>,
    id_generator: Box<dyn IdGenerator>,
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("service_name", &self.inner.service_name)
            .field("traces", &self.trace_count())
            .finish()
    }
}

impl Tracer {
    /// Creates a tracer for the given service with the default random id
    /// generator.
    pub fn new(service_name: impl Into<Cow<'static, str>>) -> Self {
        Tracer::builder(service_name).build()
    }

    /// Returns a builder for customizing the tracer.
    pub fn builder(service_name: impl Into<Cow<'static, str>>) -> TracerBuilder {
        TracerBuilder {
            service_name: service_name.into(),
            id_generator: None,
        }
    }

    /// The service name stamped on every span this tracer creates.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Begins a new trace and starts its root span for `operation_name`.
    ///
    /// A trace identifier is generated unless a caller-supplied one is given
    /// for correlation with an upstream request. Supplying an identifier
    /// already present in the registry **replaces** the previous trace's
    /// entry (the replaced trace's live handles keep working, it is just no
    /// longer registered); a warning is emitted when that happens.
    ///
    /// The new trace is returned but not activated — attach it with
    /// [`TraceContext::attach`] or use the scoped APIs.
    pub fn start_trace(
        &self,
        operation_name: impl Into<Cow<'static, str>>,
        trace_id: Option<TraceId>,
    ) -> TraceContext {
        self.begin_trace(operation_name.into(), trace_id).0
    }

    pub(crate) fn begin_trace(
        &self,
        operation_name: Cow<'static, str>,
        trace_id: Option<TraceId>,
    ) -> (TraceContext, Span) {
        let trace_id = trace_id.unwrap_or_else(|| self.inner.id_generator.new_trace_id());
        let cx = TraceContext::new(trace_id);
        if let Ok(mut traces) = self.inner.traces.lock() {
            if traces.insert(trace_id, cx.clone()).is_some() {
                internal_warn!(
                    name: "Tracer.TraceIdReused",
                    trace_id = trace_id.to_string()
                );
            }
        }
        let root = self.append_span(&cx, operation_name, None);
        (cx, root)
    }

    /// Starts a span for `operation_name`.
    ///
    /// The owning trace is the ambient one; when no trace is active, a fresh
    /// trace is begun transparently and its root span returned. The new
    /// span's parent is the trace's current span, it is tagged
    /// `service.name`, and it becomes the new current span.
    ///
    /// Use [`Tracer::span_builder`] to supply an explicit trace or parent
    /// instead of the ambient resolution.
    pub fn start_span(&self, operation_name: impl Into<Cow<'static, str>>) -> Span {
        let operation_name = operation_name.into();
        match TraceContext::current() {
            Some(cx) => self.append_span(&cx, operation_name, None),
            None => self.begin_trace(operation_name, None).1,
        }
    }

    /// Returns a builder for a span with explicit placement.
    pub fn span_builder(&self, operation_name: impl Into<Cow<'static, str>>) -> SpanBuilder {
        SpanBuilder::from_name(operation_name)
    }

    fn build_span(&self, builder: SpanBuilder) -> Span {
        let SpanBuilder {
            operation_name,
            trace_context,
            parent_span_id,
            tags,
        } = builder;
        let span = match trace_context.or_else(TraceContext::current) {
            Some(cx) => self.append_span(&cx, operation_name, parent_span_id),
            None => {
                if parent_span_id.is_some() {
                    internal_warn!(
                        name: "Tracer.ParentWithoutTrace",
                        message = "parent span given but no trace to resolve it in; starting a new trace"
                    );
                }
                self.begin_trace(operation_name, None).1
            }
        };
        for tag in tags {
            span.set_tag(tag.key, tag.value);
        }
        span
    }

    fn append_span(
        &self,
        cx: &TraceContext,
        operation_name: Cow<'static, str>,
        parent_override: Option<SpanId>,
    ) -> Span {
        let parent = parent_override.or_else(|| cx.current_span().map(|span| span.span_id()));
        let span = Span::new(
            self.inner.id_generator.new_span_id(),
            cx.trace_id(),
            parent,
            operation_name,
        );
        span.set_tag("service.name", Value::from(self.inner.service_name.clone()));
        cx.push_span(span.clone());
        span
    }

    /// Finishes `span` with the given status and restores the owning
    /// trace's current span to the finished span's parent.
    ///
    /// The cursor is restored to the parent even when the finished span was
    /// not the current one (an out-of-order finish, e.g. an ancestor closed
    /// while a descendant is still open); that case is warned about, since
    /// it usually indicates the caller broke LIFO discipline. Finishing the
    /// same span twice overwrites its end time and status, with a warning.
    pub fn finish_span(&self, span: &Span, status: SpanStatus) {
        span.finish(status);
        if let Some(cx) = self.get_trace(span.trace_id()) {
            if !cx.restore_current(span) {
                internal_warn!(
                    name: "Tracer.OutOfOrderFinish",
                    operation = span.operation_name().to_string(),
                    span_id = span.span_id().to_string()
                );
            }
        }
    }

    /// Runs `f` with a new active span, finishing it when `f` returns.
    ///
    /// Shorthand for [`Tracer::scoped`]; the span finishes with `Ok` status,
    /// or `Error` if `f` panics (the panic keeps propagating).
    ///
    /// ```
    /// use tracekit::Tracer;
    ///
    /// let tracer = Tracer::new("inventory");
    /// tracer.in_span("restock", |span| {
    ///     span.set_tag("sku.count", 120);
    /// });
    /// ```
    pub fn in_span<T>(
        &self,
        operation_name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&Span) -> T,
    ) -> T {
        let scoped = self.scoped(operation_name);
        f(scoped.span())
    }

    /// Looks up a registered trace by id.
    pub fn get_trace(&self, trace_id: TraceId) -> Option<TraceContext> {
        self.inner
            .traces
            .lock()
            .ok()
            .and_then(|traces| traces.get(&trace_id).cloned())
    }

    /// Snapshot of every registered trace.
    pub fn get_all_traces(&self) -> Vec<TraceContext> {
        self.inner
            .traces
            .lock()
            .map(|traces| traces.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of registered traces.
    pub fn trace_count(&self) -> usize {
        self.inner.traces.lock().map(|traces| traces.len()).unwrap_or(0)
    }

    /// Evicts every trace whose spans all started more than `max_age` ago,
    /// finished or not, and returns how many were removed.
    ///
    /// Eviction bounds the registry's memory: an abandoned (never finished)
    /// span cannot pin its trace forever. Live handles to an evicted trace
    /// keep working; the trace is simply no longer registered or exported.
    pub fn clear_old_traces(&self, max_age: Duration) -> usize {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return 0;
        };
        let Ok(mut traces) = self.inner.traces.lock() else {
            return 0;
        };
        let before = traces.len();
        traces.retain(|_, cx| cx.any_span_started_at_or_after(cutoff));
        let evicted = before - traces.len();
        if evicted > 0 {
            internal_debug!(name: "Tracer.TracesEvicted", count = evicted);
        }
        evicted
    }
}

/// Builds a [`Tracer`] with non-default configuration.
#[derive(Debug)]
pub struct TracerBuilder {
    service_name: Cow<'static, str>,
    id_generator: Option<Box<dyn IdGenerator>>,
}

impl TracerBuilder {
    /// Overrides the id generator (e.g. with a deterministic one in tests).
    pub fn with_id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Box::new(generator));
        self
    }

    /// Builds the tracer.
    pub fn build(self) -> Tracer {
        Tracer {
            inner: Arc::new(TracerInner {
                service_name: self.service_name,
                traces: Mutex::new(HashMap::new()),
                id_generator: self
                    .id_generator
                    .unwrap_or_else(|| Box::new(RandomIdGenerator::default())),
            }),
        }
    }
}

/// Configures the placement and initial tags of a span before starting it.
///
/// Covers the explicit-placement cases the plain [`Tracer::start_span`]
/// resolution does not: pinning the owning trace regardless of what is
/// ambient, and overriding the parent span.
///
/// ```
/// use tracekit::Tracer;
///
/// let tracer = Tracer::new("mailer");
/// let cx = tracer.start_trace("send_digest", None);
///
/// let render = tracer
///     .span_builder("render_template")
///     .with_context(cx.clone())
///     .with_tag("template", "digest-v2")
///     .start(&tracer);
/// assert_eq!(render.trace_id(), cx.trace_id());
/// ```
#[derive(Debug)]
pub struct SpanBuilder {
    operation_name: Cow<'static, str>,
    trace_context: Option<TraceContext>,
    parent_span_id: Option<SpanId>,
    tags: Vec<KeyValue>,
}

impl SpanBuilder {
    /// Creates a builder for the named operation.
    pub fn from_name(operation_name: impl Into<Cow<'static, str>>) -> Self {
        SpanBuilder {
            operation_name: operation_name.into(),
            trace_context: None,
            parent_span_id: None,
            tags: Vec::new(),
        }
    }

    /// Places the span in this trace instead of the ambient one.
    pub fn with_context(mut self, cx: TraceContext) -> Self {
        self.trace_context = Some(cx);
        self
    }

    /// Overrides the parent instead of using the trace's current span.
    pub fn with_parent(mut self, parent: SpanId) -> Self {
        self.parent_span_id = Some(parent);
        self
    }

    /// Adds an initial tag.
    pub fn with_tag(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.tags.push(KeyValue::new(key, value));
        self
    }

    /// Starts the configured span.
    pub fn start(self, tracer: &Tracer) -> Span {
        tracer.build_span(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::IncrementIdGenerator;
    use std::thread;

    fn test_tracer() -> Tracer {
        Tracer::builder("test-service")
            .with_id_generator(IncrementIdGenerator::new())
            .build()
    }

    #[test]
    fn spans_inherit_trace_id() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("root", None);
        let _scope = cx.attach();
        let child = tracer.start_span("child");

        assert_eq!(child.trace_id(), cx.trace_id());
        for span in cx.spans() {
            assert_eq!(span.trace_id(), cx.trace_id());
        }
    }

    #[test]
    fn parents_exist_and_start_no_later() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("root", None);
        let _scope = cx.attach();
        tracer.start_span("child");
        tracer.start_span("grandchild");

        for span in cx.spans() {
            if let Some(parent_id) = span.parent_span_id() {
                let parent = cx.find_span(parent_id).expect("parent registered");
                assert!(parent.start_time() <= span.start_time());
            }
        }
    }

    #[test]
    fn spans_are_tagged_with_service_name() {
        let tracer = test_tracer();
        let span = tracer.start_span("lookup");
        assert_eq!(
            span.tag("service.name"),
            Some(Value::from("test-service"))
        );
    }

    #[test]
    fn start_span_without_active_trace_begins_one() {
        let tracer = test_tracer();
        let root = tracer.start_span("implicit-root");

        assert_eq!(root.parent_span_id(), None);
        let cx = tracer.get_trace(root.trace_id()).expect("registered");
        assert_eq!(cx.span_count(), 1);
    }

    #[test]
    fn current_span_restored_after_finish() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("a", None);
        let _scope = cx.attach();

        let b = tracer.start_span("b");
        tracer.finish_span(&b, SpanStatus::Ok);
        let c = tracer.start_span("c");

        // B finished before C started, so C is A's child, not B's.
        let a = cx.spans()[0].clone();
        assert_eq!(b.parent_span_id(), Some(a.span_id()));
        assert_eq!(c.parent_span_id(), Some(a.span_id()));
    }

    #[test]
    fn out_of_order_finish_restores_to_finished_spans_parent() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("root", None);
        let _scope = cx.attach();

        let parent = tracer.start_span("parent");
        let child = tracer.start_span("child");

        // Finishing the ancestor while the descendant is open moves the
        // cursor to the ancestor's own parent (the root).
        tracer.finish_span(&parent, SpanStatus::Ok);
        let next = tracer.start_span("next");

        let root_id = cx.spans()[0].span_id();
        assert_eq!(next.parent_span_id(), Some(root_id));
        assert!(!child.is_finished());
    }

    #[test]
    fn caller_supplied_trace_id_is_used() {
        let tracer = test_tracer();
        let supplied = TraceId::from(0xfeed_beefu128);
        let cx = tracer.start_trace("correlated", Some(supplied));

        assert_eq!(cx.trace_id(), supplied);
        assert!(tracer.get_trace(supplied).is_some());
    }

    #[test]
    fn reused_trace_id_overwrites_registry_entry() {
        let tracer = test_tracer();
        let supplied = TraceId::from(0xfeedu128);
        let first = tracer.start_trace("first", Some(supplied));
        let second = tracer.start_trace("second", Some(supplied));

        assert_eq!(tracer.trace_count(), 1);
        let registered = tracer.get_trace(supplied).unwrap();
        assert_eq!(
            registered.spans()[0].operation_name(),
            second.spans()[0].operation_name()
        );
        // The replaced trace's handles keep working.
        assert_eq!(first.span_count(), 1);
    }

    #[test]
    fn span_builder_pins_context_and_parent() {
        let tracer = test_tracer();
        let ambient = tracer.start_trace("ambient", None);
        let _scope = ambient.attach();
        let pinned = tracer.start_trace("pinned", None);
        let pinned_root = pinned.spans()[0].clone();

        let span = tracer
            .span_builder("explicit")
            .with_context(pinned.clone())
            .with_parent(pinned_root.span_id())
            .with_tag("queue", "high")
            .start(&tracer);

        assert_eq!(span.trace_id(), pinned.trace_id());
        assert_eq!(span.parent_span_id(), Some(pinned_root.span_id()));
        assert_eq!(span.tag("queue"), Some(Value::from("high")));
    }

    #[test]
    fn eviction_removes_only_stale_traces() {
        let tracer = test_tracer();
        let old = tracer.start_trace("old", None);
        std::thread::sleep(Duration::from_millis(50));
        let fresh = tracer.start_trace("fresh", None);

        // Nothing is older than an hour yet.
        assert_eq!(tracer.clear_old_traces(Duration::from_secs(3600)), 0);
        assert_eq!(tracer.trace_count(), 2);

        // One pass evicts the stale trace — its sole span is unfinished,
        // which does not protect it — and keeps the fresh one.
        assert_eq!(tracer.clear_old_traces(Duration::from_millis(25)), 1);
        assert!(tracer.get_trace(old.trace_id()).is_none());
        assert!(tracer.get_trace(fresh.trace_id()).is_some());
    }

    #[test]
    fn evicted_trace_handles_keep_working() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("evictable", None);
        let span = cx.spans()[0].clone();

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tracer.clear_old_traces(Duration::ZERO), 1);

        span.set_tag("after.eviction", true);
        tracer.finish_span(&span, SpanStatus::Ok);
        assert!(span.is_finished());
    }

    #[test]
    fn concurrent_tasks_do_not_share_ambient_state() {
        let tracer = test_tracer();
        let mut handles = Vec::new();
        for i in 0..4 {
            let tracer = tracer.clone();
            handles.push(thread::spawn(move || {
                let cx = tracer.start_trace(format!("task-{i}"), None);
                let _scope = cx.attach();
                let child = tracer.start_span("work");
                // The ambient current span belongs to this thread's trace.
                let current = TraceContext::current().unwrap();
                assert_eq!(current.trace_id(), cx.trace_id());
                assert_eq!(child.trace_id(), cx.trace_id());
                tracer.finish_span(&child, SpanStatus::Ok);
                cx.trace_id()
            }));
        }

        let ids: Vec<TraceId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // All traces are distinct and all ended up in the shared registry.
        for (i, id) in ids.iter().enumerate() {
            assert!(ids.iter().skip(i + 1).all(|other| other != id));
        }
        assert_eq!(tracer.trace_count(), 4);
    }

    #[test]
    fn checkout_scenario_produces_expected_tree() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("checkout", None);
        let _scope = cx.attach();

        let validate = tracer.start_span("validate");
        tracer.finish_span(&validate, SpanStatus::Ok);
        let charge = tracer.start_span("charge");
        tracer.finish_span(&charge, SpanStatus::Error);

        let spans = cx.spans();
        assert_eq!(spans.len(), 3);

        let root = &spans[0];
        assert_eq!(root.operation_name(), "checkout");
        assert!(!root.is_finished());
        assert_eq!(validate.status(), SpanStatus::Ok);
        assert_eq!(charge.status(), SpanStatus::Error);
        assert_eq!(validate.parent_span_id(), Some(root.span_id()));
        assert_eq!(charge.parent_span_id(), Some(root.span_id()));
    }
}

use super::{Span, SpanId, TraceId};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// A container binding one trace identifier to its ordered spans and the
/// innermost still-open ("current") span.
///
/// `TraceContext` is a passive data holder: the [`Tracer`] appends spans and
/// moves the cursor on its behalf. Cloning produces another handle to the
/// same trace. Every span in the trace carries this context's `trace_id`,
/// and the current span, when set, is a member of the span list.
///
/// [`Tracer`]: crate::trace::Tracer
#[derive(Clone, Debug)]
pub struct TraceContext {
    trace_id: TraceId,
    inner: Arc<Mutex<ContextInner>>,
}

#[derive(Debug, Default)]
struct ContextInner {
    /// Append-only; insertion order is creation order.
    spans: Vec<Span>,
    current: Option<Span>,
}

impl TraceContext {
    pub(crate) fn new(trace_id: TraceId) -> Self {
        TraceContext {
            trace_id,
            inner: Arc::new(Mutex::new(ContextInner::default())),
        }
    }

    /// The identifier shared by every span of this trace.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The innermost span that is still open, if any.
    pub fn current_span(&self) -> Option<Span> {
        self.inner.lock().ok().and_then(|inner| inner.current.clone())
    }

    /// Snapshot of all spans in creation order.
    pub fn spans(&self) -> Vec<Span> {
        self.inner
            .lock()
            .map(|inner| inner.spans.clone())
            .unwrap_or_default()
    }

    /// Number of spans recorded so far.
    pub fn span_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.spans.len()).unwrap_or(0)
    }

    /// Finds a member span by id.
    pub fn find_span(&self, span_id: SpanId) -> Option<Span> {
        self.inner.lock().ok().and_then(|inner| {
            inner
                .spans
                .iter()
                .find(|span| span.span_id() == span_id)
                .cloned()
        })
    }

    /// Appends a span and makes it current.
    pub(crate) fn push_span(&self, span: Span) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.spans.push(span.clone());
            inner.current = Some(span);
        }
    }

    /// Moves the cursor to the finished span's parent.
    ///
    /// Returns whether the finished span actually was the current one; the
    /// cursor is restored either way (see `Tracer::finish_span` for the
    /// policy).
    pub(crate) fn restore_current(&self, finished: &Span) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return true;
        };
        let was_current = inner
            .current
            .as_ref()
            .map(|span| span.span_id() == finished.span_id())
            .unwrap_or(false);
        let parent = finished.parent_span_id().and_then(|parent_id| {
            inner
                .spans
                .iter()
                .find(|span| span.span_id() == parent_id)
                .cloned()
        });
        inner.current = parent;
        was_current
    }

    /// Whether any span started at or after `cutoff` — the liveness test
    /// used by age-based eviction.
    pub(crate) fn any_span_started_at_or_after(&self, cutoff: SystemTime) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.spans.iter().any(|span| span.start_time() >= cutoff))
            .unwrap_or(true)
    }
}

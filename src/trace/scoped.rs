use super::span::{LogLevel, Span, SpanStatus};
use super::trace_context::TraceContext;
use super::tracer::Tracer;
use crate::context::TraceScope;
use std::borrow::Cow;
use std::ops::Deref;
use std::thread;

impl Tracer {
    /// Starts a span whose lifetime is tied to the returned guard.
    ///
    /// When no trace is active, a fresh one is begun and stays attached for
    /// the guard's lifetime, so nested `start_span` calls parent correctly.
    /// Dropping the guard finishes the span: with the recorded status
    /// (default `Ok`) on a normal exit, or with `Error` — after logging the
    /// failure on the span — when the thread is panicking. The guard never
    /// swallows the panic.
    ///
    /// ```
    /// use tracekit::{SpanStatus, Tracer};
    ///
    /// let tracer = Tracer::new("search");
    /// {
    ///     let mut query = tracer.scoped("run_query");
    ///     query.set_tag("index", "products");
    ///     if query.tag("index").is_none() {
    ///         query.set_status(SpanStatus::Error);
    ///     }
    /// } // finished here
    /// ```
    pub fn scoped(&self, operation_name: impl Into<Cow<'static, str>>) -> ScopedSpan {
        let operation_name = operation_name.into();
        let (span, scope) = match TraceContext::current() {
            Some(_) => (self.start_span(operation_name), None),
            None => {
                let (cx, root) = self.begin_trace(operation_name, None);
                let scope = cx.attach();
                (root, Some(scope))
            }
        };
        ScopedSpan {
            tracer: self.clone(),
            span,
            status: SpanStatus::Ok,
            _scope: scope,
        }
    }
}

/// Finishes its span when dropped, propagating error status on panic.
///
/// Derefs to [`Span`], so tags and logs are recorded directly on the guard.
/// Created by [`Tracer::scoped`]; [`Tracer::in_span`] is the closure-shaped
/// convenience over it.
#[derive(Debug)]
pub struct ScopedSpan {
    tracer: Tracer,
    span: Span,
    status: SpanStatus,
    _scope: Option<TraceScope>,
}

impl ScopedSpan {
    /// The span this guard finishes on drop.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Sets the status the span will finish with on a normal exit.
    pub fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }
}

impl Deref for ScopedSpan {
    type Target = Span;

    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        let status = if thread::panicking() {
            self.span
                .log(LogLevel::Error, "operation panicked before the span finished");
            SpanStatus::Error
        } else {
            self.status
        };
        self.tracer.finish_span(&self.span, status);
    }
}

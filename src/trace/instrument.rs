//! Function-level instrumentation.
//!
//! Two explicit wrappers cover the two calling conventions: [`Tracer::instrument`]
//! for directly-returning functions and [`Tracer::instrument_future`] for
//! suspending ones. Both tag the span with the function's name and defining
//! module, finish it with `Error` (after logging the failure) when the callee
//! fails, and hand the callee's result back unchanged — tracing never masks
//! application errors.

use super::span::{LogLevel, Span, SpanStatus};
use super::trace_context::TraceContext;
use super::tracer::Tracer;
use crate::context::activate;
use pin_project_lite::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::Context as TaskContext;
use std::task::Poll;

impl Tracer {
    /// Runs `f` inside a span tagged `code.function` / `code.namespace`.
    ///
    /// On `Err`, the error's display form is logged onto the span at `error`
    /// level, the span finishes with `Error` status, and the error is
    /// returned unchanged.
    ///
    /// The [`traced!`](crate::traced) macro fills in the namespace from the
    /// call site:
    ///
    /// ```
    /// use tracekit::{traced, Tracer};
    ///
    /// fn load_profile(user: u64) -> Result<String, std::io::Error> {
    ///     Ok(format!("profile-{user}"))
    /// }
    ///
    /// let tracer = Tracer::new("profiles");
    /// let profile = traced!(tracer, "load_profile", |_span| load_profile(7));
    /// assert!(profile.is_ok());
    /// ```
    pub fn instrument<T, E, F>(
        &self,
        function: &'static str,
        namespace: &'static str,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&Span) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut scoped = self.scoped(function);
        scoped.set_tag("code.function", function);
        scoped.set_tag("code.namespace", namespace);
        match f(scoped.span()) {
            Ok(value) => Ok(value),
            Err(err) => {
                scoped.log(LogLevel::Error, err.to_string());
                scoped.set_status(SpanStatus::Error);
                Err(err)
            }
        }
    }

    /// Wraps a suspending callee so its span covers the full logical
    /// execution, suspensions included.
    ///
    /// The span opens immediately (parented from whatever trace is active at
    /// wrap time) and the owning trace is re-attached around every poll, so
    /// spans started after an `.await` still nest underneath it. Completion
    /// finishes the span like [`Tracer::instrument`] does; a future dropped
    /// before completing leaves its span pending, to be reclaimed by trace
    /// eviction.
    pub fn instrument_future<F, T, E>(
        &self,
        function: &'static str,
        namespace: &'static str,
        future: F,
    ) -> Instrumented<F>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let span = self.start_span(function);
        span.set_tag("code.function", function);
        span.set_tag("code.namespace", namespace);
        let trace = self.get_trace(span.trace_id());
        Instrumented {
            inner: future,
            tracer: self.clone(),
            trace,
            span: Some(span),
        }
    }
}

pin_project! {
    /// A future whose execution is timed by a span.
    ///
    /// Created by [`Tracer::instrument_future`].
    #[must_use = "futures do nothing unless polled"]
    #[derive(Debug)]
    pub struct Instrumented<F> {
        #[pin]
        inner: F,
        tracer: Tracer,
        trace: Option<TraceContext>,
        span: Option<Span>,
    }
}

impl<F, T, E> Future for Instrumented<F>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, task_cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = activate(this.trace.clone());
        match this.inner.poll(task_cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                if let Some(span) = this.span.take() {
                    match &result {
                        Ok(_) => this.tracer.finish_span(&span, SpanStatus::Ok),
                        Err(err) => {
                            span.log(LogLevel::Error, err.to_string());
                            this.tracer.finish_span(&span, SpanStatus::Error);
                        }
                    }
                }
                Poll::Ready(result)
            }
        }
    }
}

impl<F> Instrumented<F> {
    /// The span timing this future.
    ///
    /// `None` once the future has completed and the span is finished.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }
}

/// Instruments a directly-returning function call, using the call site's
/// module path as the `code.namespace` tag.
///
/// Expands to [`Tracer::instrument`].
#[macro_export]
macro_rules! traced {
    ($tracer:expr, $function:expr, $f:expr $(,)?) => {
        $tracer.instrument($function, module_path!(), $f)
    };
}

/// Instruments a suspending function call, using the call site's module path
/// as the `code.namespace` tag.
///
/// Expands to [`Tracer::instrument_future`].
#[macro_export]
macro_rules! traced_future {
    ($tracer:expr, $function:expr, $future:expr $(,)?) => {
        $tracer.instrument_future($function, module_path!(), $future)
    };
}

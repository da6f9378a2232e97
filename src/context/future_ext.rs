use crate::context::activate;
use crate::trace::TraceContext;
use futures_core::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::Context as TaskContext;
use std::task::Poll;

pin_project! {
    /// A future or stream that carries an associated trace.
    ///
    /// The captured value is attached as the active trace around every poll,
    /// so spans started inside the wrapped computation nest correctly even
    /// when the executor moves it between worker threads.
    #[derive(Clone, Debug)]
    pub struct WithTrace<T> {
        #[pin]
        inner: T,
        trace: Option<TraceContext>,
    }
}

impl<T: Future> Future for WithTrace<T> {
    type Output = T::Output;

    fn poll(self: Pin<&mut Self>, task_cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = activate(this.trace.clone());

        this.inner.poll(task_cx)
    }
}

impl<T: Stream> Stream for WithTrace<T> {
    type Item = T::Item;

    fn poll_next(self: Pin<&mut Self>, task_cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _scope = activate(this.trace.clone());

        T::poll_next(this.inner, task_cx)
    }
}

impl<F: Future> FutureTraceExt for F {}

/// Extension trait for carrying a trace across a future's polls.
pub trait FutureTraceExt: Sized {
    /// Attaches the given trace to this future, returning a [`WithTrace`]
    /// wrapper.
    ///
    /// Passing `None` shields the future from any ambient trace.
    fn with_trace(self, trace: Option<TraceContext>) -> WithTrace<Self> {
        WithTrace { inner: self, trace }
    }

    /// Attaches the currently active trace to this future.
    ///
    /// This captures a snapshot at call time — the idiomatic spot is right
    /// before handing the future to a spawn function, so the spawned task
    /// inherits its parent's trace.
    fn with_active_trace(self) -> WithTrace<Self> {
        self.with_trace(TraceContext::current())
    }
}

impl<S: Stream> StreamTraceExt for S {}

/// Extension trait for carrying a trace across a stream's polls.
pub trait StreamTraceExt: Sized {
    /// Attaches the given trace to this stream, returning a [`WithTrace`]
    /// wrapper.
    fn with_trace(self, trace: Option<TraceContext>) -> WithTrace<Self> {
        WithTrace { inner: self, trace }
    }

    /// Attaches the currently active trace to this stream.
    fn with_active_trace(self) -> WithTrace<Self> {
        self.with_trace(TraceContext::current())
    }
}

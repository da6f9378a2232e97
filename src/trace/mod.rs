//! The `trace` module tracks the progression of a single request through one
//! service process. A trace is a tree of [`Span`]s — timed, taggable units of
//! work — held together by a [`TraceContext`] and created through a
//! [`Tracer`].
//!
//! # Overview
//!
//! - A [`Tracer`] owns the registry of live traces, creates and finishes
//!   spans, and evicts traces past a maximum age.
//! - A [`TraceContext`] binds one trace identifier to its ordered spans and
//!   the innermost still-open one.
//! - [`ScopedSpan`] ties a span's lifetime to a lexical scope, and the
//!   [instrumentation wrappers](Tracer::instrument) build on it for whole
//!   functions, sync or suspending.
//!
//! # Managing Active Spans
//!
//! Spans started while a trace is active automatically become children of
//! that trace's innermost open span. The highest-level entry point is
//! [`Tracer::in_span`]:
//!
//! ```
//! use tracekit::Tracer;
//!
//! let tracer = Tracer::new("billing");
//!
//! tracer.in_span("invoice", |_span| {
//!     // spans created here will be children of `invoice`
//! });
//! ```
//!
//! Request-pipeline integrations drive the span explicitly — tag on entry,
//! status code and disposition on exit:
//!
//! ```
//! use tracekit::{SpanStatus, Tracer};
//!
//! let tracer = Tracer::new("api-gateway");
//!
//! let span = tracer.start_span("GET /orders/{id}");
//! span.set_tag("http.method", "GET");
//! span.set_tag("http.url", "/orders/4217");
//! // ... handler runs ...
//! span.set_tag("http.status_code", 200);
//! tracer.finish_span(&span, SpanStatus::Ok);
//! ```
//!
//! For suspending work, wrap the future so the span covers the full logical
//! execution including suspension:
//!
//! ```
//! use tracekit::{Tracer, traced_future};
//!
//! async fn charge() -> Result<u64, std::io::Error> { Ok(42) }
//!
//! # async fn run() {
//! let tracer = Tracer::new("billing");
//! let amount = traced_future!(tracer, "charge", charge()).await;
//! # let _ = amount;
//! # }
//! ```

use std::sync::PoisonError;
use thiserror::Error;

mod ids;
mod instrument;
mod scoped;
mod span;
mod trace_context;
mod tracer;

pub use self::{
    ids::{IdGenerator, RandomIdGenerator, SpanId, TraceId},
    instrument::Instrumented,
    scoped::ScopedSpan,
    span::{LogLevel, LogRecord, Span, SpanStatus},
    trace_context::TraceContext,
    tracer::{SpanBuilder, Tracer, TracerBuilder},
};

#[cfg(any(test, feature = "testing"))]
pub use self::ids::IncrementIdGenerator;

/// A specialized `Result` type for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors returned by the trace API.
///
/// Span creation and mutation are fail-open and never return errors; only
/// the export surface does.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Export failed with the error returned by the underlying sink.
    #[error("trace export failed: {0}")]
    ExportFailed(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Other errors not covered above.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        TraceError::ExportFailed(Box::new(err))
    }
}

impl From<serde_json::Error> for TraceError {
    fn from(err: serde_json::Error) -> Self {
        TraceError::ExportFailed(Box::new(err))
    }
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::Other(err.to_string().into())
    }
}

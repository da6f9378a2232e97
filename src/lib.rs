//! In-process distributed tracing for service monitoring.
//!
//! This crate is the tracing core of a service-monitoring stack: it creates
//! and nests [`Span`]s, threads an ambient "current trace" association
//! through nested calls (including suspending ones) without explicit
//! parameters, keeps completed traces in a bounded in-memory registry, and
//! serializes them out through pluggable [exporters].
//!
//! It is *not* a backend: storage and visualization of the exported traces
//! are left to external sinks (a JSON file, or trace collectors fed by your
//! own transport). Wire-level context propagation between processes is out of
//! scope; an externally supplied trace identifier can be passed to
//! [`Tracer::start_trace`] for correlation with an upstream caller.
//!
//! # Getting Started
//!
//! ```
//! use tracekit::{SpanStatus, Tracer};
//!
//! // One explicitly constructed tracer per service, cloned where needed.
//! let tracer = Tracer::new("checkout-service");
//!
//! // `in_span` opens a span, runs the closure with it active, and finishes
//! // it when the closure returns (with `error` status if it panics).
//! tracer.in_span("process_order", |span| {
//!     span.set_tag("order.id", 4217);
//!
//!     // Spans started while another span is active become its children.
//!     let charge = tracer.start_span("charge_card");
//!     tracer.finish_span(&charge, SpanStatus::Ok);
//! });
//!
//! // Completed traces stay in the registry until evicted by age.
//! assert_eq!(tracer.get_all_traces().len(), 1);
//! ```
//!
//! # Components
//!
//! - **[`trace`]**: the data model ([`Span`], [`TraceContext`]) and the
//!   [`Tracer`] that owns the registry of live traces, plus the scoped-span
//!   guard and the sync/async instrumentation wrappers.
//! - **[`context`]**: the ambient trace cell — thread-scoped storage of the
//!   active [`TraceContext`] with RAII scope guards, and combinators that
//!   carry a trace across task boundaries.
//! - **[`export`]**: write-only sinks for completed trace data (JSON file,
//!   in-memory, and best-effort collector stubs).
//!
//! [exporters]: crate::export

#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
mod internal_logging;

pub mod context;
pub mod export;
pub mod trace;

pub use common::{KeyValue, Value};
pub use context::{FutureTraceExt, StreamTraceExt, TraceScope, WithTrace};
pub use trace::{
    LogLevel, LogRecord, ScopedSpan, Span, SpanBuilder, SpanId, SpanStatus, TraceContext,
    TraceError, TraceId, TraceResult, Tracer,
};

//! Trace export.
//!
//! Exporters are write-only sinks: they receive serialized snapshots of the
//! registry ([`TraceRecord`]s) and ship them somewhere — a JSON file, memory,
//! or a trace collector. Exporting is non-destructive; evicting the registry
//! is the tracer's job, not the exporter's.
//!
//! ```no_run
//! use tracekit::{export, SpanStatus, Tracer};
//!
//! let tracer = Tracer::new("orders");
//! let span = tracer.start_span("handle_request");
//! tracer.finish_span(&span, SpanStatus::Ok);
//!
//! export::export_to_json(&tracer, "/var/log/orders-traces.json")?;
//! # Ok::<(), tracekit::TraceError>(())
//! ```

use crate::trace::{TraceResult, Tracer};
use std::fmt;
use std::path::Path;

mod in_memory;
mod json;
mod remote;

pub use in_memory::InMemoryExporter;
pub use json::{JsonFileExporter, LogEntryRecord, SpanRecord, TraceRecord};
pub use remote::{JaegerExporter, ZipkinExporter};

/// A sink for completed trace data.
///
/// Implementations receive every registered trace on each call; delivery is
/// best-effort and failures propagate to the exporter's caller without being
/// retried.
pub trait TraceExporter: fmt::Debug + Send {
    /// Exports a batch of trace records.
    fn export(&mut self, traces: &[TraceRecord]) -> TraceResult<()>;

    /// Releases any resources held by the exporter.
    fn shutdown(&mut self) -> TraceResult<()> {
        Ok(())
    }
}

/// Snapshots every registered trace and hands the records to `exporter`.
///
/// Records are ordered by trace id so repeated exports of the same registry
/// are comparable.
pub fn export_with(tracer: &Tracer, exporter: &mut dyn TraceExporter) -> TraceResult<()> {
    let mut records: Vec<TraceRecord> = tracer
        .get_all_traces()
        .iter()
        .map(TraceRecord::from)
        .collect();
    records.sort_by(|a, b| a.trace_id.cmp(&b.trace_id));
    exporter.export(&records)
}

/// Serializes every registered trace to `path` as a single JSON array.
pub fn export_to_json(tracer: &Tracer, path: impl AsRef<Path>) -> TraceResult<()> {
    export_with(tracer, &mut JsonFileExporter::new(path.as_ref()))
}

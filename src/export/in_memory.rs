use super::{TraceExporter, TraceRecord};
use crate::trace::{TraceError, TraceResult};
use std::sync::{Arc, Mutex};

/// An exporter that stores trace records in memory.
///
/// Useful for tests and debugging: export, then inspect the accumulated
/// records with [`InMemoryExporter::exported`]. Clones share storage.
///
/// ```
/// use tracekit::export::{self, InMemoryExporter};
/// use tracekit::{SpanStatus, Tracer};
///
/// let tracer = Tracer::new("orders");
/// let span = tracer.start_span("persist");
/// tracer.finish_span(&span, SpanStatus::Ok);
///
/// let mut exporter = InMemoryExporter::default();
/// export::export_with(&tracer, &mut exporter).unwrap();
/// assert_eq!(exporter.exported().unwrap().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryExporter {
    records: Arc<Mutex<Vec<TraceRecord>>>,
}

impl InMemoryExporter {
    /// Creates an empty in-memory exporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records received so far.
    pub fn exported(&self) -> TraceResult<Vec<TraceRecord>> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(TraceError::from)
    }

    /// Clears the stored records.
    pub fn reset(&self) {
        let _ = self.records.lock().map(|mut records| records.clear());
    }
}

impl TraceExporter for InMemoryExporter {
    fn export(&mut self, traces: &[TraceRecord]) -> TraceResult<()> {
        self.records
            .lock()
            .map(|mut records| records.extend_from_slice(traces))
            .map_err(TraceError::from)
    }

    fn shutdown(&mut self) -> TraceResult<()> {
        self.reset();
        Ok(())
    }
}

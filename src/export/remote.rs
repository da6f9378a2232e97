//! Collector exporter stubs.
//!
//! Best-effort, fire-and-forget: the transport to a real Jaeger or Zipkin
//! collector lives outside this core, so these accept batches, note them in
//! the internal diagnostics, and report success. No delivery guarantee, no
//! retry policy.

use super::{TraceExporter, TraceRecord};
use crate::internal_logging::internal_debug;
use crate::trace::TraceResult;

/// Fire-and-forget stub for a Jaeger collector endpoint.
#[derive(Debug)]
pub struct JaegerExporter {
    endpoint: String,
}

impl JaegerExporter {
    /// Creates a stub exporter for the given collector endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        JaegerExporter {
            endpoint: endpoint.into(),
        }
    }

    /// The configured collector endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TraceExporter for JaegerExporter {
    fn export(&mut self, traces: &[TraceRecord]) -> TraceResult<()> {
        internal_debug!(
            name: "JaegerExporter.Export",
            endpoint = self.endpoint.clone(),
            batch_size = traces.len()
        );
        Ok(())
    }
}

/// Fire-and-forget stub for a Zipkin collector endpoint.
#[derive(Debug)]
pub struct ZipkinExporter {
    endpoint: String,
}

impl ZipkinExporter {
    /// Creates a stub exporter for the given collector endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        ZipkinExporter {
            endpoint: endpoint.into(),
        }
    }

    /// The configured collector endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TraceExporter for ZipkinExporter {
    fn export(&mut self, traces: &[TraceRecord]) -> TraceResult<()> {
        internal_debug!(
            name: "ZipkinExporter.Export",
            endpoint = self.endpoint.clone(),
            batch_size = traces.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::export_with;
    use crate::trace::{SpanStatus, Tracer};

    #[test]
    fn stubs_accept_batches_without_failing() {
        let tracer = Tracer::new("test-service");
        let span = tracer.start_span("op");
        tracer.finish_span(&span, SpanStatus::Ok);

        let mut jaeger = JaegerExporter::new("http://localhost:14268/api/traces");
        let mut zipkin = ZipkinExporter::new("http://localhost:9411/api/v2/spans");
        export_with(&tracer, &mut jaeger).unwrap();
        export_with(&tracer, &mut zipkin).unwrap();
        assert_eq!(jaeger.endpoint(), "http://localhost:14268/api/traces");
        assert_eq!(zipkin.endpoint(), "http://localhost:9411/api/v2/spans");
    }
}

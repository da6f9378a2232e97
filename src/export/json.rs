use super::TraceExporter;
use crate::common::{KeyValue, Value};
use crate::trace::{LogLevel, Span, SpanStatus, TraceContext, TraceResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Serialized form of one trace: its id and spans in creation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Hex trace identifier.
    pub trace_id: String,
    /// Spans in creation order; nest for display via `parent_span_id`.
    pub spans: Vec<SpanRecord>,
}

/// Serialized form of one span.
///
/// Timestamps are numeric seconds (floating point) since the Unix epoch;
/// `end_time` and `duration` are absent while the span is pending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Hex span identifier.
    pub span_id: String,
    /// Hex identifier of the owning trace.
    pub trace_id: String,
    /// Hex identifier of the parent span; `null` for a root span.
    pub parent_span_id: Option<String>,
    /// Name of the traced operation.
    pub operation_name: String,
    /// Start time in Unix seconds.
    pub start_time: f64,
    /// End time in Unix seconds, if finished.
    pub end_time: Option<f64>,
    /// `end_time - start_time`, if finished.
    pub duration: Option<f64>,
    /// Span tags.
    pub tags: HashMap<String, Value>,
    /// Span log entries in append order.
    pub logs: Vec<LogEntryRecord>,
    /// Terminal status.
    pub status: SpanStatus,
}

/// Serialized form of one span log entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntryRecord {
    /// Entry time in Unix seconds.
    pub timestamp: f64,
    /// Entry severity.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Structured fields, in the order they were recorded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<KeyValue>,
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

impl From<&TraceContext> for TraceRecord {
    fn from(cx: &TraceContext) -> Self {
        TraceRecord {
            trace_id: cx.trace_id().to_string(),
            spans: cx.spans().iter().map(SpanRecord::from).collect(),
        }
    }
}

impl From<&Span> for SpanRecord {
    fn from(span: &Span) -> Self {
        let data = span.data_snapshot();
        SpanRecord {
            span_id: span.span_id().to_string(),
            trace_id: span.trace_id().to_string(),
            parent_span_id: span.parent_span_id().map(|id| id.to_string()),
            operation_name: span.operation_name().to_string(),
            start_time: unix_seconds(span.start_time()),
            end_time: data.end_time.map(unix_seconds),
            duration: data.end_time.map(|end| {
                end.duration_since(span.start_time())
                    .unwrap_or_default()
                    .as_secs_f64()
            }),
            tags: data
                .tags
                .into_iter()
                .map(|(key, value)| (key.into_owned(), value))
                .collect(),
            logs: data
                .logs
                .into_iter()
                .map(|record| LogEntryRecord {
                    timestamp: unix_seconds(record.timestamp),
                    level: record.level,
                    message: record.message.into_owned(),
                    fields: record.fields,
                })
                .collect(),
            status: data.status,
        }
    }
}

/// Writes every export batch to a file as a single JSON array.
///
/// Each export overwrites the target file with the current registry
/// snapshot. I/O and serialization failures propagate to the caller.
#[derive(Debug)]
pub struct JsonFileExporter {
    path: PathBuf,
}

impl JsonFileExporter {
    /// Creates an exporter writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileExporter { path: path.into() }
    }
}

impl TraceExporter for JsonFileExporter {
    fn export(&mut self, traces: &[TraceRecord]) -> TraceResult<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, traces)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::export_to_json;
    use crate::trace::{IncrementIdGenerator, LogLevel, SpanStatus, Tracer};

    fn test_tracer() -> Tracer {
        Tracer::builder("test-service")
            .with_id_generator(IncrementIdGenerator::new())
            .build()
    }

    #[test]
    fn json_file_round_trip_preserves_content() {
        let tracer = test_tracer();
        let cx = tracer.start_trace("checkout", None);
        let _scope = cx.attach();

        let validate = tracer.start_span("validate");
        validate.set_tag("cart.items", 3);
        validate.log_with(
            LogLevel::Warn,
            "slow price lookup",
            vec![KeyValue::new("elapsed_ms", 120)],
        );
        tracer.finish_span(&validate, SpanStatus::Ok);

        let charge = tracer.start_span("charge");
        tracer.finish_span(&charge, SpanStatus::Error);

        let file = tempfile::NamedTempFile::new().unwrap();
        export_to_json(&tracer, file.path()).unwrap();

        let reloaded: Vec<TraceRecord> =
            serde_json::from_reader(File::open(file.path()).unwrap()).unwrap();
        assert_eq!(reloaded.len(), 1);

        let trace = &reloaded[0];
        assert_eq!(trace.trace_id, cx.trace_id().to_string());
        assert_eq!(trace.spans.len(), 3);

        let root = &trace.spans[0];
        assert_eq!(root.operation_name, "checkout");
        assert_eq!(root.parent_span_id, None);
        assert_eq!(root.end_time, None);
        assert_eq!(root.duration, None);

        let reloaded_validate = &trace.spans[1];
        assert_eq!(reloaded_validate.span_id, validate.span_id().to_string());
        assert_eq!(reloaded_validate.trace_id, validate.trace_id().to_string());
        assert_eq!(
            reloaded_validate.parent_span_id,
            Some(root.span_id.clone())
        );
        assert_eq!(reloaded_validate.status, SpanStatus::Ok);
        assert_eq!(reloaded_validate.tags["cart.items"], Value::I64(3));
        assert_eq!(reloaded_validate.logs.len(), 1);
        assert_eq!(reloaded_validate.logs[0].message, "slow price lookup");
        assert_eq!(
            reloaded_validate.logs[0].fields,
            vec![KeyValue::new("elapsed_ms", 120)]
        );
        assert!(reloaded_validate.duration.unwrap() >= 0.0);
        assert!(reloaded_validate.start_time <= reloaded_validate.end_time.unwrap());

        assert_eq!(trace.spans[2].status, SpanStatus::Error);
    }

    #[test]
    fn export_is_non_destructive() {
        let tracer = test_tracer();
        let span = tracer.start_span("kept");
        tracer.finish_span(&span, SpanStatus::Ok);

        let file = tempfile::NamedTempFile::new().unwrap();
        export_to_json(&tracer, file.path()).unwrap();
        export_to_json(&tracer, file.path()).unwrap();

        assert_eq!(tracer.get_all_traces().len(), 1);
    }

    #[test]
    fn export_failure_propagates() {
        let tracer = test_tracer();
        let err = export_to_json(&tracer, "/nonexistent-dir/traces.json").unwrap_err();
        assert!(matches!(err, crate::TraceError::ExportFailed(_)));
    }
}

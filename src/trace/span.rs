//! # Span
//!
//! A `Span` represents a single timed operation within a trace. Spans nest
//! to form a trace tree: each trace has a root span and optionally child
//! spans for sub-operations.
//!
//! Identity (`span_id`, `trace_id`, `parent_span_id`, `operation_name`,
//! `start_time`) is fixed at creation; timing, tags, logs, and status live
//! behind a shared handle so the registry, exporters, and the owning caller
//! all observe the same state. Tag writes remain possible after the span has
//! finished — closing a span freezes its timing, not its metadata.

use crate::common::{KeyValue, Value};
use crate::internal_logging::internal_warn;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// The terminal disposition of a span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The operation completed normally.
    #[default]
    Ok,
    /// The operation failed.
    Error,
    /// The operation exceeded its deadline.
    Timeout,
}

/// Severity of a span log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine information.
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// A failure of the traced operation.
    Error,
}

/// One timestamped entry in a span's log.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Wall-clock time the entry was recorded.
    pub timestamp: SystemTime,
    /// Entry severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: Cow<'static, str>,
    /// Additional structured fields, in the order they were supplied.
    pub fields: Vec<KeyValue>,
}

/// Single timed operation within a trace.
///
/// Cloning a `Span` clones a handle: all clones share the same mutable
/// state. Spans are created by [`Tracer::start_span`] and finished by
/// [`Tracer::finish_span`]; in between, the owning caller annotates them:
///
/// ```
/// use tracekit::{LogLevel, SpanStatus, Tracer};
///
/// let tracer = Tracer::new("payments");
/// let span = tracer.start_span("charge_card");
/// span.set_tag("card.network", "visa");
/// span.log(LogLevel::Info, "authorization requested");
/// tracer.finish_span(&span, SpanStatus::Ok);
///
/// assert!(span.duration().is_some());
/// ```
///
/// [`Tracer::start_span`]: crate::trace::Tracer::start_span
/// [`Tracer::finish_span`]: crate::trace::Tracer::finish_span
#[derive(Clone, Debug)]
pub struct Span {
    span_id: super::SpanId,
    trace_id: super::TraceId,
    parent_span_id: Option<super::SpanId>,
    operation_name: Cow<'static, str>,
    start_time: SystemTime,
    data: Arc<Mutex<SpanData>>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SpanData {
    pub(crate) end_time: Option<SystemTime>,
    pub(crate) tags: HashMap<Cow<'static, str>, Value>,
    pub(crate) logs: Vec<LogRecord>,
    pub(crate) status: SpanStatus,
}

impl Span {
    pub(crate) fn new(
        span_id: super::SpanId,
        trace_id: super::TraceId,
        parent_span_id: Option<super::SpanId>,
        operation_name: Cow<'static, str>,
    ) -> Self {
        Span {
            span_id,
            trace_id,
            parent_span_id,
            operation_name,
            start_time: SystemTime::now(),
            data: Arc::new(Mutex::new(SpanData::default())),
        }
    }

    /// Operate on a mutable reference to span data.
    ///
    /// Lock failure degrades to a no-op: instrumentation must not panic into
    /// the code it observes.
    fn with_data<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanData) -> T,
    {
        self.data.lock().ok().map(|mut data| f(&mut data))
    }

    /// This span's globally unique identifier.
    pub fn span_id(&self) -> super::SpanId {
        self.span_id
    }

    /// The identifier of the trace this span belongs to.
    pub fn trace_id(&self) -> super::TraceId {
        self.trace_id
    }

    /// The identifier of this span's parent, or `None` for a root span.
    pub fn parent_span_id(&self) -> Option<super::SpanId> {
        self.parent_span_id
    }

    /// The name of the operation this span times.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Wall-clock time this span was started.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Inserts or overwrites a tag.
    ///
    /// Permitted at any time, including after the span has finished.
    pub fn set_tag(&self, key: impl Into<Cow<'static, str>>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        self.with_data(|data| data.tags.insert(key, value));
    }

    /// Appends a log entry stamped with the current wall-clock time.
    pub fn log(&self, level: LogLevel, message: impl Into<Cow<'static, str>>) {
        self.log_with(level, message, Vec::new());
    }

    /// Appends a log entry with additional structured fields.
    pub fn log_with(
        &self,
        level: LogLevel,
        message: impl Into<Cow<'static, str>>,
        fields: Vec<KeyValue>,
    ) {
        let record = LogRecord {
            timestamp: SystemTime::now(),
            level,
            message: message.into(),
            fields,
        };
        self.with_data(|data| data.logs.push(record));
    }

    /// Stamps the end time and status.
    ///
    /// Returns whether this was the first finish. A second finish overwrites
    /// both fields and warns; callers avoid it by convention.
    pub(crate) fn finish(&self, status: SpanStatus) -> bool {
        let end_time = SystemTime::now();
        let first = self
            .with_data(|data| {
                let first = data.end_time.is_none();
                data.end_time = Some(end_time);
                data.status = status;
                first
            })
            .unwrap_or(false);
        if !first {
            internal_warn!(
                name: "Span.FinishedTwice",
                operation = self.operation_name.to_string()
            );
        }
        first
    }

    /// Returns `true` once the span has an end time.
    pub fn is_finished(&self) -> bool {
        self.with_data(|data| data.end_time.is_some()).unwrap_or(false)
    }

    /// Wall-clock time the span finished, if it has.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.with_data(|data| data.end_time).flatten()
    }

    /// Elapsed time between start and finish; `None` while pending.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time()
            .map(|end| end.duration_since(self.start_time).unwrap_or_default())
    }

    /// The span's status (`Ok` until told otherwise).
    pub fn status(&self) -> SpanStatus {
        self.with_data(|data| data.status).unwrap_or_default()
    }

    /// Returns the tag stored under `key`, if any.
    pub fn tag(&self, key: &str) -> Option<Value> {
        self.with_data(|data| data.tags.get(key).cloned()).flatten()
    }

    /// Snapshot of all tags.
    pub fn tags(&self) -> HashMap<Cow<'static, str>, Value> {
        self.with_data(|data| data.tags.clone()).unwrap_or_default()
    }

    /// Snapshot of all log entries, in append order.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.with_data(|data| data.logs.clone()).unwrap_or_default()
    }

    /// Copies the full mutable state for export.
    pub(crate) fn data_snapshot(&self) -> SpanData {
        self.with_data(|data| data.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{SpanId, TraceId};

    fn test_span() -> Span {
        Span::new(
            SpanId::from(1),
            TraceId::from(1u128),
            None,
            Cow::Borrowed("op"),
        )
    }

    #[test]
    fn tag_overwrite_is_idempotent() {
        let span = test_span();
        span.set_tag("retries", 2);
        span.set_tag("retries", 2);
        assert_eq!(span.tag("retries"), Some(Value::I64(2)));
        assert_eq!(span.tags().len(), 1);

        span.set_tag("retries", 3);
        assert_eq!(span.tag("retries"), Some(Value::I64(3)));
    }

    #[test]
    fn tags_accepted_after_finish() {
        let span = test_span();
        span.finish(SpanStatus::Ok);
        span.set_tag("late", true);
        assert_eq!(span.tag("late"), Some(Value::Bool(true)));
    }

    #[test]
    fn logs_keep_append_order() {
        let span = test_span();
        span.log(LogLevel::Info, "first");
        span.log_with(
            LogLevel::Warn,
            "second",
            vec![KeyValue::new("attempt", 2)],
        );

        let logs = span.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "first");
        assert_eq!(logs[1].message, "second");
        assert_eq!(logs[1].fields, vec![KeyValue::new("attempt", 2)]);
        assert!(logs[0].timestamp <= logs[1].timestamp);
    }

    #[test]
    fn double_finish_overwrites() {
        let span = test_span();
        assert!(span.finish(SpanStatus::Ok));
        let first_end = span.end_time().unwrap();

        assert!(!span.finish(SpanStatus::Error));
        assert_eq!(span.status(), SpanStatus::Error);
        assert!(span.end_time().unwrap() >= first_end);
    }

    #[test]
    fn duration_absent_until_finished() {
        let span = test_span();
        assert!(span.duration().is_none());
        span.finish(SpanStatus::Ok);
        assert!(span.duration().is_some());
        assert!(span.start_time() <= span.end_time().unwrap());
    }

    #[test]
    fn clones_share_state() {
        let span = test_span();
        let other = span.clone();
        other.set_tag("shared", true);
        assert_eq!(span.tag("shared"), Some(Value::Bool(true)));
    }
}
